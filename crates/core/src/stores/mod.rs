pub mod opensearch;
pub mod qdrant;

pub use opensearch::OpenSearchProfileStore;
pub use qdrant::QdrantStore;
