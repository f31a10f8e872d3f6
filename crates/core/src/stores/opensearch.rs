use crate::config::SearchConfig;
use crate::store::{IndexQuery, EMBEDDING_FIELD, TEXT_FIELD};
use crate::traits::DocumentIndex;
use crate::{Chunk, Hit, SearchError};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

const BACKEND: &str = "opensearch";
/// Retries after the first `_search` attempt when the request times out or
/// cannot connect.
const SEARCH_RETRIES: u32 = 3;

/// Upper bounds for one `_bulk` request. A batch is flushed as soon as either
/// limit would be exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BulkLimits {
    max_chunks: usize,
    max_bytes: usize,
}

impl Default for BulkLimits {
    fn default() -> Self {
        Self {
            max_chunks: 500,
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

pub struct OpenSearchStore {
    client: Arc<Client>,
    endpoint: String,
    index_name: String,
    bulk_limits: BulkLimits,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterInfo {
    pub cluster_name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IndexStats {
    #[serde(rename = "index")]
    pub name: String,
    #[serde(rename = "docs.count", default)]
    pub docs_count: Option<String>,
}

impl OpenSearchStore {
    pub fn new(endpoint: impl Into<String>, index_name: impl Into<String>) -> Self {
        Self {
            client: Arc::new(Client::new()),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            index_name: index_name.into(),
            bulk_limits: BulkLimits::default(),
        }
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client: Arc::new(client),
            endpoint: config.opensearch_url.trim_end_matches('/').to_string(),
            index_name: config.index_name.clone(),
            bulk_limits: BulkLimits::default(),
        })
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.index_name)
    }

    pub async fn cluster_info(&self) -> Result<ClusterInfo, SearchError> {
        let response = self.client.get(&self.endpoint).send().await?;
        let body = expect_success(response).await?.json::<Value>().await?;

        let cluster_name = body
            .pointer("/cluster_name")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("cluster info has no cluster_name"))?
            .to_string();
        let version = body
            .pointer("/version/number")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        Ok(ClusterInfo {
            cluster_name,
            version,
        })
    }

    pub async fn list_indices(&self) -> Result<Vec<IndexStats>, SearchError> {
        let response = self
            .client
            .get(format!("{}/_cat/indices", self.endpoint))
            .query(&[("format", "json")])
            .send()
            .await?;

        Ok(expect_success(response).await?.json().await?)
    }

    async fn index_exists(&self) -> Result<bool, SearchError> {
        let response = self.client.head(self.index_url()).send().await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(SearchError::BackendResponse {
                backend: BACKEND.to_string(),
                details: status.to_string(),
            }),
        }
    }

    async fn send_bulk(&self, payload: String, count: usize) -> Result<(), SearchError> {
        let response = self
            .client
            .post(format!("{}/_bulk", self.endpoint))
            .query(&[("refresh", "true")])
            .header("Content-Type", "application/x-ndjson")
            .body(payload)
            .send()
            .await?;

        let body: Value = expect_success(response).await?.json().await?;
        if body.pointer("/errors").and_then(Value::as_bool) == Some(true) {
            return Err(SearchError::BackendResponse {
                backend: BACKEND.to_string(),
                details: first_bulk_error(&body)
                    .unwrap_or_else(|| "bulk request reported errors".to_string()),
            });
        }

        debug!(index = %self.index_name, count, "bulk batch accepted");
        Ok(())
    }
}

#[async_trait]
impl DocumentIndex for OpenSearchStore {
    async fn recreate(&self, dimension: usize) -> Result<(), SearchError> {
        if self.index_exists().await? {
            info!(index = %self.index_name, "index exists, deleting for a fresh start");
            let response = self.client.delete(self.index_url()).send().await?;
            expect_success(response).await?;
        }

        let response = self
            .client
            .put(self.index_url())
            .json(&index_definition(dimension))
            .send()
            .await?;
        expect_success(response).await?;

        info!(index = %self.index_name, dimension, "created index with vector mapping");
        Ok(())
    }

    async fn index_chunks(&self, chunks: &[Chunk]) -> Result<(), SearchError> {
        let mut payload = String::new();
        let mut batched = 0;
        let mut batches = 0;

        for chunk in chunks {
            let action = serde_json::to_string(&json!({
                "index": {
                    "_index": self.index_name,
                    "_id": format!("{}#{}", chunk.source_file, chunk.chunk_index),
                }
            }))?;
            let source = serde_json::to_string(chunk)?;
            let entry_len = action.len() + source.len() + 2;

            if batched > 0
                && (batched == self.bulk_limits.max_chunks
                    || payload.len() + entry_len > self.bulk_limits.max_bytes)
            {
                self.send_bulk(std::mem::take(&mut payload), batched).await?;
                batched = 0;
                batches += 1;
            }

            payload.push_str(&action);
            payload.push('\n');
            payload.push_str(&source);
            payload.push('\n');
            batched += 1;
        }

        if batched > 0 {
            self.send_bulk(payload, batched).await?;
            batches += 1;
        }

        debug!(index = %self.index_name, count = chunks.len(), batches, "bulk indexed chunks");
        Ok(())
    }

    async fn search(&self, query: &IndexQuery) -> Result<Vec<Hit>, SearchError> {
        let url = format!("{}/_search", self.index_url());
        let body = query.to_request_body();

        let mut attempt = 0;
        let response = loop {
            match self.client.post(&url).json(&body).send().await {
                Ok(response) => break response,
                Err(error) if attempt < SEARCH_RETRIES && (error.is_timeout() || error.is_connect()) => {
                    attempt += 1;
                    warn!(attempt, error = %error, "search request failed, retrying");
                }
                Err(error) => return Err(error.into()),
            }
        };

        let body: Value = expect_success(response).await?.json().await?;
        parse_hits(&body)
    }
}

fn index_definition(dimension: usize) -> Value {
    json!({
        "settings": {
            "index": {
                "knn": true,
                "knn.space_type": "cosinesimil"
            }
        },
        "mappings": {
            "properties": {
                "source_file": {"type": "keyword"},
                "chunk_index": {"type": "integer"},
                TEXT_FIELD: {"type": "text"},
                EMBEDDING_FIELD: {"type": "knn_vector", "dimension": dimension}
            }
        }
    })
}

pub(crate) fn parse_hits(body: &Value) -> Result<Vec<Hit>, SearchError> {
    let raw_hits = body
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("search response has no hits.hits array"))?;

    let hits = raw_hits
        .iter()
        .map(|raw| {
            let source = raw.get("_source").unwrap_or(&Value::Null);
            Hit {
                source_file: source
                    .get("source_file")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                chunk_index: source
                    .get("chunk_index")
                    .and_then(Value::as_u64)
                    .unwrap_or_default(),
                text: source
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                score: raw.get("_score").and_then(Value::as_f64).unwrap_or(0.0),
            }
        })
        .collect();

    Ok(hits)
}

fn first_bulk_error(body: &Value) -> Option<String> {
    body.pointer("/items")?
        .as_array()?
        .iter()
        .filter_map(|item| item.pointer("/index/error"))
        .map(|error| {
            error
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string())
        })
        .next()
}

async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response, SearchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(SearchError::BackendResponse {
        backend: BACKEND.to_string(),
        details: if body.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {body}")
        },
    })
}

fn malformed(details: &str) -> SearchError {
    SearchError::Malformed {
        backend: BACKEND.to_string(),
        details: details.to_string(),
    }
}
