//! familiar-vector
//!
//! The vector index: exhaustive cosine search in memory, builds from a corpus
//! directory, and generation-based persistence on LanceDB.

pub mod builder;
pub mod index;
pub mod schema;
pub mod store;

pub use builder::{BuildReport, IndexBuilder, DEFAULT_BATCH_SIZE};
pub use index::{IndexEntry, VectorIndex};
pub use store::{IndexStore, Manifest};
