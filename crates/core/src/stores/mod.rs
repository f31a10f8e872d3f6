pub mod opensearch;

pub use opensearch::{ClusterInfo, IndexStats, OpenSearchStore};
