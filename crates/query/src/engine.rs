use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use index::GraphStore;

use crate::llm::Generator;
use crate::retrieval::{ContextAssembler, Retrieval, RetrievalConfig};

/// Returned instead of an answer when the document has no chunks or graph.
pub const NOT_FOUND_MESSAGE: &str = "No data found for this document in the database.";

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Graph store error: {0:#}")]
    Store(anyhow::Error),

    #[error("Answer generation failed: {0:#}")]
    Generation(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Answer {
    Generated {
        text: String,
        chunks_used: usize,
        triples_used: usize,
        context_chars: usize,
    },
    NotFound,
}

impl Answer {
    pub fn into_text(self) -> String {
        match self {
            Answer::Generated { text, .. } => text,
            Answer::NotFound => NOT_FOUND_MESSAGE.to_string(),
        }
    }
}

/// Answers one question about one document from its text and graph context.
pub struct QueryEngine {
    store: Arc<dyn GraphStore>,
    generator: Arc<dyn Generator>,
    assembler: ContextAssembler,
}

impl QueryEngine {
    pub fn new(
        store: Arc<dyn GraphStore>,
        generator: Arc<dyn Generator>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            generator,
            assembler: ContextAssembler::new(config),
        }
    }

    /// Always returns text: the answer, the not-found message, or an error line.
    pub async fn answer(&self, question: &str, doc_id: &str) -> String {
        match self.try_answer(question, doc_id).await {
            Ok(answer) => answer.into_text(),
            Err(err) => {
                error!(doc_id, error = %err, "Query failed");
                format!("Error: {}", err)
            }
        }
    }

    pub async fn try_answer(&self, question: &str, doc_id: &str) -> Result<Answer, QueryError> {
        info!(doc_id, question, "Querying document");

        let retrieval = {
            let session = self.store.open().await.map_err(QueryError::Store)?;
            self.assembler
                .assemble(session.as_ref(), doc_id)
                .await
                .map_err(QueryError::Store)?
        };

        let context = match retrieval {
            Retrieval::Found(context) => context,
            Retrieval::NoData => {
                info!(doc_id, "No chunks or graph for document");
                return Ok(Answer::NotFound);
            }
        };

        let rendered = context.render();
        let prompt = build_prompt(&rendered, question);
        info!(doc_id, context_chars = rendered.len(), "Generating answer");

        let text = self.generator
            .generate(&prompt)
            .await
            .map_err(QueryError::Generation)?;

        Ok(Answer::Generated {
            text,
            chunks_used: context.chunks.len(),
            triples_used: context.triples.len(),
            context_chars: rendered.len(),
        })
    }
}

pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        r#"You are a helpful assistant. Answer the question using the context below.
If the Knowledge Graph contains information that contradicts or expands on the Text Content,
prioritize the structured Knowledge Graph data.

Context:
{}

Question: {}

Answer:"#,
        context, question
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt("### TEXT CONTENT ###\nHello\n---\n", "Who?");

        assert!(prompt.contains("prioritize the structured Knowledge Graph data"));
        assert!(prompt.contains("Context:\n### TEXT CONTENT ###\nHello\n---\n\n"));
        assert!(prompt.ends_with("Question: Who?\n\nAnswer:"));
    }

    #[test]
    fn test_not_found_text() {
        assert_eq!(Answer::NotFound.into_text(), NOT_FOUND_MESSAGE);
    }
}
