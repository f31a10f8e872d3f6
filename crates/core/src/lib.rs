pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod retrieval;
pub mod status;
pub mod store;
pub mod stores;
pub mod traits;

pub use chunking::{normalize_whitespace, RecursiveSplitter};
pub use config::SearchConfig;
pub use embeddings::{EmbeddingProvider, OllamaEmbedder};
pub use error::{ConfigError, IngestError, SearchError};
pub use extractor::{extract_page_texts, LopdfExtractor, PageText, PdfExtractor};
pub use ingest::{
    discover_pdf_files, embed_drafts, index_folder, index_report, load_folder, load_folder_with,
    IndexingSummary, IngestionReport, SkippedPdf,
};
pub use models::{Chunk, ChunkDraft, Hit, HitIdentity, IngestionOptions, SearchMode, SourceDocument};
pub use retrieval::{
    expansion_term, FaultStage, RefinementReport, RetrievalFault, RetrievalOutcome, Retriever,
    RoundTrace, Termination,
};
pub use status::{check_system, SystemStatus};
pub use store::{IndexQuery, QueryKind};
pub use stores::OpenSearchStore;
pub use traits::DocumentIndex;
