use serde_json::{json, Value};

pub const TEXT_FIELD: &str = "text";
pub const EMBEDDING_FIELD: &str = "embedding";
pub const RETURNED_FIELDS: [&str; 3] = ["source_file", "text", "chunk_index"];

#[derive(Debug, Clone, PartialEq)]
pub enum QueryKind {
    Match { text: String },
    Knn { vector: Vec<f32> },
    Hybrid { text: String, vector: Vec<f32> },
}

/// One request against the document index, independent of the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    pub kind: QueryKind,
    pub top_k: usize,
}

impl IndexQuery {
    pub fn text_match(text: impl Into<String>, top_k: usize) -> Self {
        Self {
            kind: QueryKind::Match { text: text.into() },
            top_k,
        }
    }

    pub fn knn(vector: Vec<f32>, top_k: usize) -> Self {
        Self {
            kind: QueryKind::Knn { vector },
            top_k,
        }
    }

    pub fn hybrid(text: impl Into<String>, vector: Vec<f32>, top_k: usize) -> Self {
        Self {
            kind: QueryKind::Hybrid {
                text: text.into(),
                vector,
            },
            top_k,
        }
    }

    /// Query DSL body for `_search`.
    pub fn to_request_body(&self) -> Value {
        let query = match &self.kind {
            QueryKind::Match { text } => match_clause(text),
            QueryKind::Knn { vector } => knn_clause(vector, self.top_k),
            QueryKind::Hybrid { text, vector } => json!({
                "bool": {
                    "should": [
                        knn_clause(vector, self.top_k),
                        match_clause(text),
                    ]
                }
            }),
        };

        json!({
            "size": self.top_k,
            "query": query,
            "_source": RETURNED_FIELDS,
        })
    }
}

fn match_clause(text: &str) -> Value {
    json!({ "match": { TEXT_FIELD: text } })
}

fn knn_clause(vector: &[f32], k: usize) -> Value {
    json!({
        "knn": {
            EMBEDDING_FIELD: {
                "vector": vector,
                "k": k,
            }
        }
    })
}
