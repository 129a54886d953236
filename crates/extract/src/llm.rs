use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::prompt;

/// Connection and sampling settings for an Ollama server.
#[derive(Debug, Clone, PartialEq)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub num_ctx: u32,
    pub num_predict: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1:latest".to_string(),
            temperature: 0.0,
            num_ctx: 8192,
            num_predict: 1024,
        }
    }
}

#[derive(Clone)]
pub struct OllamaClient {
    config: OllamaConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str, // "json" for structured output
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_ctx: u32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.config.base_url);

        let request = OllamaRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            format: "json", // Force JSON output
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_ctx: self.config.num_ctx,
                num_predict: self.config.num_predict,
            },
        };

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        if !response.status().is_success() {
            anyhow::bail!("Ollama request failed: {}", response.status());
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(ollama_response.response)
    }

    /// Generate with retry for invalid JSON
    pub async fn generate_json_with_retry(
        &self,
        prompt: &str,
        max_retries: usize,
    ) -> Result<String> {
        let mut response = self.generate(prompt).await?;

        for attempt in 0..max_retries {
            if serde_json::from_str::<serde_json::Value>(&response).is_ok() {
                return Ok(response);
            }

            warn!(attempt = attempt + 1, model = %self.config.model, "Invalid JSON from model, asking for a fix");
            response = self.generate(&prompt::build_retry_prompt(&response)).await?;
        }

        if serde_json::from_str::<serde_json::Value>(&response).is_ok() {
            return Ok(response);
        }

        anyhow::bail!("Failed to get valid JSON after {} retries", max_retries)
    }
}
