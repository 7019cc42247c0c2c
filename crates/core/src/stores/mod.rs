pub mod local;
pub mod qdrant;

pub use local::LocalVectorStore;
pub use qdrant::QdrantStore;
