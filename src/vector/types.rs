//! Shared types used by the vector store adapter.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while interacting with the vector store.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid vector store URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Store responded with an unexpected status code.
    #[error("Unexpected vector store response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the store.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// A document prepared for upsert: caller-supplied identity, text, metadata, and vector.
#[derive(Debug, Clone)]
pub struct DocumentUpsert {
    /// Caller-supplied globally unique identifier.
    pub id: String,
    /// Full extracted text of the document.
    pub content: String,
    /// Open, schemaless metadata bag persisted alongside the content.
    pub metadata: Map<String, Value>,
    /// Embedding vector produced for the content.
    pub vector: Vec<f32>,
}

/// A stored document returned from a similarity query.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScoredDocument {
    /// Caller-supplied document identifier.
    pub id: String,
    /// Similarity score computed by the store.
    pub score: f32,
    /// Stored document text, if available.
    pub content: Option<String>,
    /// Stored metadata bag, if available.
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    pub(crate) result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
pub(crate) struct QueryPoint {
    pub(crate) id: Value,
    pub(crate) score: f32,
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
}
