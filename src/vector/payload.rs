//! Helpers for constructing point identifiers and payloads.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Derive a deterministic point UUID from a caller-supplied document id.
///
/// Qdrant point ids must be UUIDs or integers, while document ids are free-form
/// strings such as `INV-42::https://cdn/invoice.png`. Hashing the string keeps the
/// mapping stable, so re-upserting the same document id replaces the existing point
/// instead of accumulating duplicates.
pub(crate) fn point_id_for(doc_id: &str) -> String {
    let digest = Sha256::digest(doc_id.as_bytes());
    let mut bytes = [0_u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}

/// Build the payload object stored alongside each document vector.
pub(crate) fn build_payload(
    doc_id: &str,
    content: &str,
    metadata: &Map<String, Value>,
    timestamp_rfc3339: &str,
) -> Value {
    let mut payload = Map::new();
    payload.insert("doc_id".into(), Value::String(doc_id.to_string()));
    payload.insert("content".into(), Value::String(content.to_string()));
    payload.insert("metadata".into(), Value::Object(metadata.clone()));
    payload.insert(
        "indexed_at".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    Value::Object(payload)
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
