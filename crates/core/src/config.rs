use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";
pub const DEFAULT_INDEX_NAME: &str = "patent_chunks";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_TOP_K: usize = 20;
pub const DEFAULT_REFINEMENT_STEPS: usize = 3;

/// Connection and query defaults shared by every retrieval call in a process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SearchConfig {
    pub opensearch_url: String,
    pub index_name: String,
    pub ollama_url: String,
    pub embedding_model: String,
    pub top_k: usize,
    pub refinement_steps: usize,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            opensearch_url: DEFAULT_OPENSEARCH_URL.to_string(),
            index_name: DEFAULT_INDEX_NAME.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            top_k: DEFAULT_TOP_K,
            refinement_steps: DEFAULT_REFINEMENT_STEPS,
            timeout_secs: 30,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.opensearch_url).map_err(|source| ConfigError::Endpoint {
            field: "opensearch_url",
            source,
        })?;
        Url::parse(&self.ollama_url).map_err(|source| ConfigError::Endpoint {
            field: "ollama_url",
            source,
        })?;

        if self.index_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "index_name",
                details: "must not be empty".to_string(),
            });
        }
        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "embedding_model",
                details: "must not be empty".to_string(),
            });
        }
        if self.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "top_k",
                details: "must be at least 1".to_string(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeout_secs",
                details: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SearchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.index_name, "patent_chunks");
        assert_eq!(config.top_k, 20);
    }

    #[test]
    fn rejects_unparseable_endpoint() {
        let config = SearchConfig {
            opensearch_url: "localhost 9200".to_string(),
            ..SearchConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Endpoint {
                field: "opensearch_url",
                ..
            })
        ));
    }

    #[test]
    fn rejects_zero_top_k() {
        let config = SearchConfig {
            top_k: 0,
            ..SearchConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "top_k", .. })
        ));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() -> Result<(), serde_json::Error> {
        let config: SearchConfig = serde_json::from_str(r#"{"index_name": "other"}"#)?;
        assert_eq!(config.index_name, "other");
        assert_eq!(config.opensearch_url, DEFAULT_OPENSEARCH_URL);
        Ok(())
    }
}
