//! Core data types and error definitions for the intake pipelines.

use thiserror::Error;

use crate::embedding::EmbeddingClientError;
use crate::ocr::OcrError;
use crate::store::StoreError;
use crate::vector::VectorStoreError;
use crate::webhook::XmlParseError;

/// Errors emitted by the indexing and retrieval pipelines.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// OCR step failed to extract text from the image.
    #[error("OCR failed: {0}")]
    Ocr(#[from] OcrError),
    /// Embedding provider failed to produce vectors for the input text.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector store interaction failed.
    #[error("Vector store request failed: {0}")]
    Vector(#[from] VectorStoreError),
    /// Audit database interaction failed.
    #[error("Audit store request failed: {0}")]
    Store(#[from] StoreError),
    /// Returned embedding dimension does not match configuration.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected embedding dimension configured on the server.
        expected: usize,
        /// Actual embedding dimension produced by the provider.
        actual: usize,
    },
    /// Embedding provider returned no vectors.
    #[error("Embedding provider returned no vectors")]
    EmptyEmbedding,
}

/// Errors emitted while ingesting an inbound webhook delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature header did not match the digest of the raw body. Hard rejection.
    #[error("Invalid signature")]
    Signature,
    /// Body failed to parse after signature verification.
    #[error("Failed to process webhook: {0}")]
    Parse(String),
    /// JSON envelope was missing required fields.
    #[error("Missing required fields")]
    MissingFields,
}

impl From<XmlParseError> for WebhookError {
    fn from(err: XmlParseError) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result of a successfully ingested CCC webhook delivery.
#[derive(Debug, Clone)]
pub struct CccWebhookOutcome {
    /// Event-type label derived from the top-level element of the payload.
    pub event: String,
    /// Invoice identifier taken from the payload, or synthesized when absent.
    pub invoice_id: String,
}
