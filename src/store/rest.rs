//! REST adapter for the managed audit database.
//!
//! Speaks the PostgREST conventions exposed by the hosted database: table rows are
//! created with `POST /rest/v1/{table}`, updated with `PATCH` plus an `id=eq.{id}`
//! filter, and upserted with `on_conflict` against a business key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::get_config;
use crate::store::types::{
    InvoiceRecord, StoreError, WebhookConfig, WebhookConfigUpsert, WebhookEventRecord,
};

/// Persistence interface for audit rows and webhook configurations.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist a normalized invoice row.
    async fn insert_invoice(&self, record: &InvoiceRecord) -> Result<(), StoreError>;

    /// Persist a webhook audit event.
    async fn insert_event(&self, record: &WebhookEventRecord) -> Result<(), StoreError>;

    /// Mark a previously inserted event as processed.
    async fn mark_event_processed(&self, event_id: Uuid) -> Result<(), StoreError>;

    /// Create or update a webhook configuration keyed by `ccc_id`.
    async fn upsert_webhook_config(
        &self,
        config: &WebhookConfigUpsert,
    ) -> Result<WebhookConfig, StoreError>;

    /// List all webhook configurations.
    async fn list_webhook_configs(&self) -> Result<Vec<WebhookConfig>, StoreError>;
}

/// HTTP adapter for a PostgREST-compatible audit database.
pub struct RestAuditStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestAuditStore {
    /// Construct an adapter using configuration derived from the environment.
    pub fn new() -> Result<Self, StoreError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("invocr/0.3")
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.audit_db_url.trim_end_matches('/').to_string(),
            api_key: config.audit_db_key.clone(),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn expect_success(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(StoreError::UnexpectedStatus { status, body })
        }
    }
}

#[async_trait]
impl AuditStore for RestAuditStore {
    async fn insert_invoice(&self, record: &InvoiceRecord) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.post(self.table_url("invoices")))
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await?;
        self.expect_success(response).await?;
        tracing::debug!(invoice_id = %record.id, status = %record.ccc_status, "Invoice row persisted");
        Ok(())
    }

    async fn insert_event(&self, record: &WebhookEventRecord) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.post(self.table_url("webhook_events")))
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await?;
        self.expect_success(response).await?;
        tracing::debug!(event_id = %record.id, event = %record.event_type, "Webhook event persisted");
        Ok(())
    }

    async fn mark_event_processed(&self, event_id: Uuid) -> Result<(), StoreError> {
        let processed_at = OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string());
        let response = self
            .authed(self.client.patch(self.table_url("webhook_events")))
            .query(&[("id", format!("eq.{event_id}"))])
            .header("Prefer", "return=minimal")
            .json(&json!({ "processed": true, "processed_at": processed_at }))
            .send()
            .await?;
        self.expect_success(response).await?;
        Ok(())
    }

    async fn upsert_webhook_config(
        &self,
        config: &WebhookConfigUpsert,
    ) -> Result<WebhookConfig, StoreError> {
        let now = OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string());
        let row = json!({
            "ccc_id": config.ccc_id,
            "marketplace_id": config.marketplace_id,
            "endpoint": config.endpoint,
            "secret": config.secret,
            "enabled": true,
            "metadata": { "last_updated": now },
        });

        // `on_conflict=ccc_id` makes the business key authoritative: posting the same
        // ccc_id twice updates the existing row instead of creating a duplicate.
        let response = self
            .authed(self.client.post(self.table_url("webhook_configs")))
            .query(&[("on_conflict", "ccc_id")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&json!([row]))
            .send()
            .await?;
        let response = self.expect_success(response).await?;
        let mut rows: Vec<WebhookConfig> = response.json().await?;
        rows.pop().ok_or(StoreError::UnexpectedStatus {
            status: StatusCode::OK,
            body: "upsert returned no representation".to_string(),
        })
    }

    async fn list_webhook_configs(&self) -> Result<Vec<WebhookConfig>, StoreError> {
        let response = self
            .authed(self.client.get(self.table_url("webhook_configs")))
            .query(&[("select", "*")])
            .send()
            .await?;
        let response = self.expect_success(response).await?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, Method::PATCH, Method::POST, MockServer};
    use serde_json::json;

    fn store(server: &MockServer) -> RestAuditStore {
        RestAuditStore::with_base_url(server.base_url(), "service-key".to_string())
    }

    #[tokio::test]
    async fn insert_invoice_targets_invoices_table() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/rest/v1/invoices")
                    .header("apikey", "service-key")
                    .json_body_partial(r#"{ "id": "EST-1", "ccc_status": "VehicleDamageEstimateAddInvoiceRq" }"#);
                then.status(201);
            })
            .await;

        let record = InvoiceRecord {
            id: "EST-1".into(),
            user_id: None,
            ccc_status: "VehicleDamageEstimateAddInvoiceRq".into(),
            raw_payload: "<Rq/>".into(),
            created_at: "2025-01-01T00:00:00Z".into(),
        };
        store(&server).insert_invoice(&record).await.expect("insert");
        mock.assert();
    }

    #[tokio::test]
    async fn mark_event_processed_filters_by_id() {
        let server = MockServer::start_async().await;
        let event_id = Uuid::new_v4();
        let mock = server
            .mock_async(|when, then| {
                when.method(PATCH)
                    .path("/rest/v1/webhook_events")
                    .query_param("id", format!("eq.{event_id}"))
                    .json_body_partial(r#"{ "processed": true }"#);
                then.status(204);
            })
            .await;

        store(&server)
            .mark_event_processed(event_id)
            .await
            .expect("patch");
        mock.assert();
    }

    #[tokio::test]
    async fn config_upsert_conflicts_on_business_key() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/rest/v1/webhook_configs")
                    .query_param("on_conflict", "ccc_id")
                    .header("Prefer", "resolution=merge-duplicates,return=representation");
                then.status(201).json_body(json!([{
                    "id": 7,
                    "ccc_id": "ccc-1",
                    "marketplace_id": "mp-1",
                    "endpoint": "https://partner.example/hook",
                    "secret": "s",
                    "enabled": true,
                    "metadata": {}
                }]));
            })
            .await;

        let upsert = WebhookConfigUpsert {
            ccc_id: "ccc-1".into(),
            marketplace_id: "mp-1".into(),
            endpoint: "https://partner.example/hook".into(),
            secret: "s".into(),
        };
        let row = store(&server)
            .upsert_webhook_config(&upsert)
            .await
            .expect("upsert");

        mock.assert();
        assert_eq!(row.id, Some(7));
        assert_eq!(row.ccc_id, "ccc-1");
        assert!(row.enabled);
    }

    #[tokio::test]
    async fn list_configs_fetches_all_rows() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/webhook_configs")
                    .query_param("select", "*");
                then.status(200).json_body(json!([]));
            })
            .await;

        let rows = store(&server).list_webhook_configs().await.expect("list");
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn store_error_carries_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/rest/v1/invoices");
                then.status(409).body("duplicate key");
            })
            .await;

        let record = InvoiceRecord {
            id: "EST-1".into(),
            user_id: None,
            ccc_status: "Rq".into(),
            raw_payload: "<Rq/>".into(),
            created_at: "2025-01-01T00:00:00Z".into(),
        };
        let err = store(&server)
            .insert_invoice(&record)
            .await
            .expect_err("conflict");
        assert!(err.to_string().contains("409"));
        assert!(err.to_string().contains("duplicate key"));
    }
}
