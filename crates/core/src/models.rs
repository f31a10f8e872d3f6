use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unit of indexed text together with its embedding.
///
/// All chunks written into one index generation share the same embedding
/// length; the ingestion pipeline enforces it before anything is sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub source_file: String,
    pub chunk_index: u64,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Chunk text produced by the splitter, before an embedding is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDraft {
    pub source_file: String,
    pub chunk_index: u64,
    pub text: String,
}

impl ChunkDraft {
    pub fn with_embedding(self, embedding: Vec<f32>) -> Chunk {
        Chunk {
            source_file: self.source_file,
            chunk_index: self.chunk_index,
            text: self.text,
            embedding,
        }
    }
}

/// A single retrieval result. The score is whatever the index assigned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hit {
    pub source_file: String,
    pub chunk_index: u64,
    pub text: String,
    pub score: f64,
}

/// Hashable form of every field of a [`Hit`]; two hits are duplicates iff
/// their identities are equal.
pub type HitIdentity = (String, u64, String, u64);

impl Hit {
    pub fn identity(&self) -> HitIdentity {
        (
            self.source_file.clone(),
            self.chunk_index,
            self.text.clone(),
            self.score.to_bits(),
        )
    }

    /// Text cut to at most `max_chars` characters, with an ellipsis when cut.
    pub fn preview(&self, max_chars: usize) -> String {
        match self.text.char_indices().nth(max_chars) {
            Some((byte_offset, _)) => format!("{}...", &self.text[..byte_offset]),
            None => self.text.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Keyword,
    Semantic,
    Hybrid,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Keyword => "keyword",
            SearchMode::Semantic => "semantic",
            SearchMode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keyword" | "1" => Ok(SearchMode::Keyword),
            "semantic" | "2" => Ok(SearchMode::Semantic),
            "hybrid" | "3" => Ok(SearchMode::Hybrid),
            other => Err(format!(
                "unknown search mode `{other}` (expected keyword, semantic or hybrid)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub source_file: String,
    pub path: String,
    pub checksum: String,
    pub ingested_at: DateTime<Utc>,
}

/// Splitter settings, measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}
