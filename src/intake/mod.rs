//! Intake pipelines: OCR indexing, semantic retrieval, and webhook ingestion.

mod service;
pub mod types;

pub use service::{IntakeApi, IntakeService};
pub use types::{CccWebhookOutcome, IntakeError, WebhookError};
