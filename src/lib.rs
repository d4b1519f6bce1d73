#![deny(missing_docs)]

//! Core library for the invocr invoice intake service.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Indexing, retrieval, and webhook ingestion pipelines.
pub mod intake;
/// Structured logging and tracing setup.
pub mod logging;
/// Intake metrics helpers.
pub mod metrics;
/// OCR client abstraction and adapters.
pub mod ocr;
/// Outbound invoice submission to the CCC claims API.
pub mod poster;
/// Audit persistence over the REST data API.
pub mod store;
/// Qdrant vector store integration.
pub mod vector;
/// Webhook signature verification, XML parsing, and dispatch.
pub mod webhook;
