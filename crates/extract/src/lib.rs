pub mod schema;
pub mod normalizer;
pub mod llm;
pub mod prompt;

pub use schema::{Entity, Relation, ExtractionResult};
pub use normalizer::{
    clean_entity_id, clean_entity_type, InvalidRelationType, RelationType, DEFAULT_ENTITY_TYPE,
};
pub use llm::{OllamaClient, OllamaConfig};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

/// Turns one chunk of text into candidate entities and relationships.
///
/// An empty result is a valid answer. Errors are expected to be transient
/// and scoped to the chunk that produced them.
#[async_trait]
pub trait GraphExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<ExtractionResult>;
}

/// LLM-backed extractor that prompts for a JSON graph document.
pub struct LlmExtractor {
    llm_client: OllamaClient,
    max_json_retries: usize,
}

impl LlmExtractor {
    pub fn new(llm_client: OllamaClient) -> Self {
        Self {
            llm_client,
            max_json_retries: 3,
        }
    }

    pub fn with_max_json_retries(mut self, max_json_retries: usize) -> Self {
        self.max_json_retries = max_json_retries;
        self
    }
}

#[async_trait]
impl GraphExtractor for LlmExtractor {
    async fn extract(&self, text: &str) -> Result<ExtractionResult> {
        debug!(model = self.llm_client.model(), chars = text.len(), "Extracting graph from chunk");
        let prompt = prompt::build_extraction_prompt(text);

        let json_str = self.llm_client
            .generate_json_with_retry(&prompt, self.max_json_retries)
            .await
            .context("Failed to extract entities after retries")?;

        let result: ExtractionResult = serde_json::from_str(&json_str)
            .context("Failed to parse extraction result")?;

        Ok(result)
    }
}
