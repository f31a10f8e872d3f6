use crate::embeddings::{EmbeddingProvider, OllamaEmbedder};
use crate::stores::opensearch::{ClusterInfo, IndexStats, OpenSearchStore};

const HEALTH_CHECK_TEXT: &str = "ping test";

/// Either the component's report or the error text explaining why it could
/// not be produced.
pub type ComponentStatus<T> = Result<T, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHealth {
    pub cluster: ClusterInfo,
    pub indices: Vec<IndexStats>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemStatus {
    pub opensearch: ComponentStatus<IndexHealth>,
    pub ollama_models: ComponentStatus<Vec<String>>,
    pub embedding_dimension: ComponentStatus<usize>,
}

impl SystemStatus {
    pub fn is_healthy(&self) -> bool {
        self.opensearch.is_ok() && self.ollama_models.is_ok() && self.embedding_dimension.is_ok()
    }
}

/// Checks every collaborator once. Failures are captured per component.
pub async fn check_system(store: &OpenSearchStore, embedder: &OllamaEmbedder) -> SystemStatus {
    let opensearch = async {
        let cluster = store.cluster_info().await?;
        let indices = store.list_indices().await?;
        Ok::<_, crate::SearchError>(IndexHealth { cluster, indices })
    }
    .await
    .map_err(|error| error.to_string());

    let ollama_models = embedder
        .available_models()
        .await
        .map_err(|error| error.to_string());

    let embedding_dimension = embedder
        .embed(HEALTH_CHECK_TEXT)
        .await
        .map(|vector| vector.len())
        .map_err(|error| error.to_string());

    SystemStatus {
        opensearch,
        ollama_models,
        embedding_dimension,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn reports_each_component_independently() {
        let opensearch = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cluster_name": "local",
                "version": {"number": "2.13.0"}
            })))
            .mount(&opensearch)
            .await;
        Mock::given(method("GET"))
            .and(path("/_cat/indices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"index": "patent_chunks", "docs.count": "7"}
            ])))
            .mount(&opensearch)
            .await;

        let ollama = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": [{"name": "llama3"}]})))
            .mount(&ollama)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&ollama)
            .await;

        let store = OpenSearchStore::new(opensearch.uri(), "patent_chunks");
        let embedder = OllamaEmbedder::new(ollama.uri(), "nomic-embed-text");
        let status = check_system(&store, &embedder).await;

        let health = status.opensearch.clone().expect("opensearch should be healthy");
        assert_eq!(health.cluster.cluster_name, "local");
        assert_eq!(health.indices[0].docs_count.as_deref(), Some("7"));
        assert_eq!(status.ollama_models, Ok(vec!["llama3".to_string()]));
        assert!(status
            .embedding_dimension
            .as_ref()
            .is_err_and(|error| error.contains("model not loaded")));
        assert!(!status.is_healthy());
    }
}
