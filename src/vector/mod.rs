//! Vector document store integration.

pub mod client;
mod payload;
pub mod types;

pub use client::{QdrantVectorStore, VectorStore};
pub use types::{DocumentUpsert, ScoredDocument, VectorStoreError};
