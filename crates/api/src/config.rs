use thiserror::Error;

use extract::OllamaConfig;
use index::{ReingestPolicy, StoreConfig};
use ingest::ChunkerConfig;
use query::RetrievalConfig;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Everything the service needs, built once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub store: StoreConfig,
    pub ollama: OllamaConfig,
    pub chunker: ChunkerConfig,
    pub retrieval: RetrievalConfig,
    pub reingest: ReingestPolicy,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Read the process environment, after loading `.env` if there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| value(key).ok_or(ConfigError::Missing(key));
        let number = |key: &'static str, default: usize| match value(key) {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| ConfigError::Invalid {
                key,
                value: raw.clone(),
            }),
            None => Ok(default),
        };

        let store = StoreConfig {
            uri: required("NEO4J_URI")?,
            username: required("NEO4J_USERNAME")?,
            password: required("NEO4J_PASSWORD")?,
        };

        let defaults = OllamaConfig::default();
        let ollama = OllamaConfig {
            base_url: value("OLLAMA_URL").unwrap_or(defaults.base_url.clone()),
            model: value("OLLAMA_MODEL").unwrap_or(defaults.model.clone()),
            ..defaults
        };

        let chunker_defaults = ChunkerConfig::default();
        let chunker = ChunkerConfig {
            chunk_size: number("GRAPHRAG_CHUNK_SIZE", chunker_defaults.chunk_size)?,
            chunk_overlap: number("GRAPHRAG_CHUNK_OVERLAP", chunker_defaults.chunk_overlap)?,
        };

        let retrieval_defaults = RetrievalConfig::default();
        let retrieval = RetrievalConfig {
            max_chunks: number("GRAPHRAG_MAX_CHUNKS", retrieval_defaults.max_chunks)?,
            max_triples: number("GRAPHRAG_MAX_TRIPLES", retrieval_defaults.max_triples)?,
        };

        let reingest = match value("GRAPHRAG_REINGEST").as_deref().map(str::trim) {
            None | Some("skip") => ReingestPolicy::Skip,
            Some("force") => ReingestPolicy::Force,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "GRAPHRAG_REINGEST",
                    value: other.to_string(),
                })
            }
        };

        let log_format = match value("GRAPHRAG_LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "GRAPHRAG_LOG_FORMAT",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            bind_addr: value("GRAPHRAG_BIND").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            store,
            ollama,
            chunker,
            retrieval,
            reingest,
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const CREDENTIALS: [(&str, &str); 3] = [
        ("NEO4J_URI", "bolt://localhost:7687"),
        ("NEO4J_USERNAME", "neo4j"),
        ("NEO4J_PASSWORD", "secret"),
    ];

    #[test]
    fn test_defaults_with_credentials_only() {
        let config = AppConfig::from_lookup(lookup(&CREDENTIALS)).unwrap();

        assert_eq!(config.store.uri, "bolt://localhost:7687");
        assert_eq!(config.chunker, ChunkerConfig::default());
        assert_eq!(config.retrieval, RetrievalConfig::default());
        assert_eq!(config.reingest, ReingestPolicy::Skip);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.ollama.model, "llama3.1:latest");
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
    }

    #[test]
    fn test_missing_credentials_are_fatal() {
        let err = AppConfig::from_lookup(lookup(&CREDENTIALS[..2])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("NEO4J_PASSWORD"));

        let blank = AppConfig::from_lookup(lookup(&[
            ("NEO4J_URI", "  "),
            ("NEO4J_USERNAME", "neo4j"),
            ("NEO4J_PASSWORD", "secret"),
        ]))
        .unwrap_err();
        assert_eq!(blank, ConfigError::Missing("NEO4J_URI"));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = CREDENTIALS.to_vec();
        pairs.extend([
            ("GRAPHRAG_CHUNK_SIZE", "500"),
            ("GRAPHRAG_MAX_TRIPLES", "20"),
            ("GRAPHRAG_REINGEST", "force"),
            ("GRAPHRAG_LOG_FORMAT", "json"),
            ("OLLAMA_MODEL", "mistral"),
        ]);
        let config = AppConfig::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.chunker.chunk_size, 500);
        assert_eq!(config.chunker.chunk_overlap, 200);
        assert_eq!(config.retrieval.max_triples, 20);
        assert_eq!(config.reingest, ReingestPolicy::Force);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.ollama.model, "mistral");
    }

    #[test]
    fn test_invalid_values() {
        let mut pairs = CREDENTIALS.to_vec();
        pairs.push(("GRAPHRAG_MAX_CHUNKS", "five"));
        let err = AppConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "GRAPHRAG_MAX_CHUNKS",
                value: "five".to_string()
            }
        );

        let mut pairs = CREDENTIALS.to_vec();
        pairs.push(("GRAPHRAG_REINGEST", "sometimes"));
        assert!(AppConfig::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_password_is_not_logged() {
        let config = AppConfig::from_lookup(lookup(&CREDENTIALS)).unwrap();
        assert!(!format!("{:?}", config).contains("secret"));
    }
}
