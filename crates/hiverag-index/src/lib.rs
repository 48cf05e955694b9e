//! Exact vector index, batched ingestion and persistence of the index
//! artifact pair.

pub mod artifact;
pub mod builder;
pub mod flat;
pub mod manager;
pub mod store;

pub use builder::{IndexBuilder, DEFAULT_BATCH_SIZE};
pub use flat::VectorIndex;
pub use manager::{default_paths, ArtifactPaths, IndexManager};
pub use store::IndexedCorpus;
