//! Record types persisted through the audit store.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Errors returned while interacting with the audit database.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP layer failed before receiving a response.
    #[error("Audit store request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Store responded with an unexpected status code.
    #[error("Unexpected audit store response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the store.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Normalized invoice row persisted for every accepted CCC webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// External document identifier when present, otherwise a generated UUID.
    pub id: String,
    /// Caller-supplied identity header. Untrusted.
    pub user_id: Option<String>,
    /// Mirrors the external event name.
    pub ccc_status: String,
    /// Verbatim inbound body, kept for audit and replay.
    pub raw_payload: String,
    /// Ingress timestamp, RFC3339.
    pub created_at: String,
}

/// Audit row written for every accepted webhook call, before dispatch runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEventRecord {
    /// Client-generated identifier, used to mark the row processed after dispatch.
    pub id: Uuid,
    /// Origin system name.
    pub source: String,
    /// Event-type label derived from the payload.
    pub event_type: String,
    /// Fully parsed body.
    pub payload: Value,
    /// Whether dispatch has completed for this event.
    pub processed: bool,
    /// Ingress timestamp, RFC3339.
    pub received_at: String,
}

/// Tenant-configured outbound webhook destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Row identifier generated by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// CCC account identifier. Unique per configuration.
    pub ccc_id: String,
    /// Marketplace the destination belongs to.
    pub marketplace_id: String,
    /// Destination URL notified on outbound events.
    pub endpoint: String,
    /// Shared secret used to sign outbound deliveries.
    pub secret: String,
    /// Whether the destination currently receives events.
    pub enabled: bool,
    /// Free-form configuration metadata.
    pub metadata: Value,
}

/// Caller-supplied fields for creating or updating a webhook configuration.
#[derive(Debug, Clone)]
pub struct WebhookConfigUpsert {
    /// CCC account identifier the configuration is keyed by.
    pub ccc_id: String,
    /// Marketplace the destination belongs to.
    pub marketplace_id: String,
    /// Destination URL notified on outbound events.
    pub endpoint: String,
    /// Shared secret used to sign outbound deliveries.
    pub secret: String,
}
