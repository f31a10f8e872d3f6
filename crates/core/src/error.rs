use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking options: {0}")]
    InvalidChunkOptions(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("embedding dimension {found} for {source_file}#{chunk_index} differs from {expected}")]
    DimensionMismatch {
        source_file: String,
        chunk_index: u64,
        expected: usize,
        found: usize,
    },

    #[error("search backend error during ingestion: {0}")]
    Search(#[from] SearchError),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("embedding provider failed: {0}")]
    Embedding(String),

    #[error("malformed response from {backend}: {details}")]
    Malformed { backend: String, details: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid endpoint for {field}: {source}")]
    Endpoint {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid value for {field}: {details}")]
    InvalidValue { field: &'static str, details: String },
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
