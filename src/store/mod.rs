//! Audit persistence for webhook events, invoices, and webhook configurations.

pub mod rest;
pub mod types;

pub use rest::{AuditStore, RestAuditStore};
pub use types::{
    InvoiceRecord, StoreError, WebhookConfig, WebhookConfigUpsert, WebhookEventRecord,
};
