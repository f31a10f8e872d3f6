use crate::config::SearchConfig;
use crate::error::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Turns text into a fixed-length vector.
#[async_trait]
pub trait EmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError>;
}

/// Embedding client for a local Ollama server.
pub struct OllamaEmbedder {
    client: Client,
    endpoint: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    #[serde(default)]
    name: Option<String>,
}

impl OllamaEmbedder {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: trim_endpoint(endpoint.into()),
            model: model.into(),
        }
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            endpoint: trim_endpoint(config.ollama_url.clone()),
            model: config.embedding_model.clone(),
        })
    }

    /// Names of the models the server has pulled.
    pub async fn available_models(&self) -> Result<Vec<String>, SearchError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.endpoint))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "ollama".to_string(),
                details: response.status().to_string(),
            });
        }

        let tags: TagsResponse = response.json().await?;
        Ok(tags
            .models
            .into_iter()
            .filter_map(|entry| entry.name)
            .filter(|name| !name.is_empty())
            .collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let response = self
            .client
            .post(format!("{}/api/embeddings", self.endpoint))
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Embedding(format!(
                "Failed to get embedding: {status}, {body}"
            )));
        }

        let payload: EmbeddingResponse = response.json().await?;
        if payload.embedding.is_empty() {
            return Err(SearchError::Embedding(format!(
                "model {} returned an empty embedding",
                self.model
            )));
        }

        Ok(payload.embedding)
    }
}

fn trim_endpoint(endpoint: String) -> String {
    endpoint.trim_end_matches('/').to_string()
}
