use crate::store::IndexQuery;
use crate::{Chunk, Hit, SearchError};
use async_trait::async_trait;

#[async_trait]
pub trait DocumentIndex {
    /// Drops any existing index and creates a fresh one whose vector field
    /// holds `dimension` floats.
    async fn recreate(&self, dimension: usize) -> Result<(), SearchError>;

    async fn index_chunks(&self, chunks: &[Chunk]) -> Result<(), SearchError>;

    async fn search(&self, query: &IndexQuery) -> Result<Vec<Hit>, SearchError>;
}
