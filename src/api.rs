//! HTTP surface for the invoice intake service.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `POST /index` – OCR an invoice image, embed the text, and persist a searchable document.
//! - `POST /query` – Answer a free-text query with the top-K most similar stored documents.
//! - `POST /invoices/post` – Submit a generated XML invoice to the CCC claims API.
//! - `POST /webhooks/ccc` – Signed XML webhook ingress from CCC.
//! - `PUT /webhooks` – Signed JSON webhook ingress from CCC/SecureShare.
//! - `GET /webhooks` / `POST /webhooks` – List and create outbound webhook configurations.
//! - `GET /metrics` – Observe intake counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! Webhook bodies are read as raw bytes before any parsing, because signature
//! verification runs over the exact bytes received rather than a re-serialized form.

use crate::intake::{IntakeApi, WebhookError};
use crate::poster::PostError;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const SIGNATURE_HEADER: &str = "x-ccc-signature";
const USER_ID_HEADER: &str = "x-user-id";

/// Build the HTTP router exposing the intake API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: IntakeApi + 'static,
{
    Router::new()
        .route("/index", post(index_image::<S>))
        .route("/query", post(query_documents::<S>))
        .route("/invoices/post", post(post_invoice::<S>))
        .route("/webhooks/ccc", post(ccc_webhook::<S>))
        .route(
            "/webhooks",
            get(list_webhooks::<S>)
                .post(create_webhook::<S>)
                .put(json_webhook::<S>),
        )
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Signed XML webhook ingress from the CCC claims system.
async fn ccc_webhook<S>(
    State(service): State<Arc<S>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: IntakeApi,
{
    let signature = header_str(&headers, SIGNATURE_HEADER).unwrap_or_default();
    let user_id = header_str(&headers, USER_ID_HEADER);

    match service.ingest_ccc_webhook(&body, signature, user_id).await {
        Ok(outcome) => {
            Json(json!({ "status": "ok", "event": outcome.event })).into_response()
        }
        Err(err) => webhook_error_response(err),
    }
}

/// Signed JSON webhook ingress from CCC or SecureShare.
async fn json_webhook<S>(
    State(service): State<Arc<S>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: IntakeApi,
{
    let signature = header_str(&headers, SIGNATURE_HEADER).unwrap_or_default();

    match service.ingest_json_webhook(&body, signature).await {
        Ok(()) => Json(json!({
            "success": true,
            "message": "Webhook received and processed"
        }))
        .into_response(),
        Err(err) => webhook_error_response(err),
    }
}

fn webhook_error_response(err: WebhookError) -> Response {
    match err {
        WebhookError::Signature => {
            (StatusCode::UNAUTHORIZED, "Invalid signature").into_response()
        }
        WebhookError::MissingFields => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "Missing required fields" })),
        )
            .into_response(),
        WebhookError::Parse(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": "Failed to process webhook" })),
        )
            .into_response(),
    }
}

/// Request body for the `POST /index` endpoint.
#[derive(Deserialize)]
struct IndexRequest {
    /// Invoice the image belongs to.
    #[serde(rename = "invoiceId")]
    invoice_id: String,
    /// Location of the invoice image to OCR.
    #[serde(rename = "imageUrl")]
    image_url: String,
}

/// OCR, embed, and index one invoice image.
async fn index_image<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<IndexRequest>,
) -> Response
where
    S: IntakeApi,
{
    match service
        .index_invoice_image(&request.invoice_id, &request.image_url)
        .await
    {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(err) => {
            tracing::error!(invoice_id = %request.invoice_id, error = %err, "Index request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": "Failed to index image" })),
            )
                .into_response()
        }
    }
}

/// Request body for the `POST /query` endpoint.
#[derive(Deserialize)]
struct QueryRequest {
    /// Free-text query to embed and match against stored documents.
    query: String,
    /// Optional result-count limit (defaults to `QUERY_DEFAULT_TOP_K`).
    #[serde(default, rename = "topK")]
    top_k: Option<usize>,
}

/// Answer a semantic query with the most similar stored documents.
async fn query_documents<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<QueryRequest>,
) -> Response
where
    S: IntakeApi,
{
    match service.query_documents(&request.query, request.top_k).await {
        Ok(docs) => Json(json!({ "docs": docs })).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Query request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to query documents" })),
            )
                .into_response()
        }
    }
}

/// Request body for the `POST /invoices/post` endpoint.
#[derive(Deserialize)]
struct PostInvoiceRequest {
    /// External estimate identifier the invoice attaches to.
    #[serde(rename = "estimateId")]
    estimate_id: String,
    /// Pre-built XML invoice payload.
    xml: String,
}

/// Submit a generated XML invoice to the CCC claims API.
async fn post_invoice<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<PostInvoiceRequest>,
) -> Response
where
    S: IntakeApi,
{
    match service
        .post_invoice(&request.estimate_id, request.xml)
        .await
    {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(err @ PostError::Api { status, .. }) => {
            // Surface the remote status code to the caller; no retry is attempted.
            (
                status,
                Json(json!({ "success": false, "error": err.to_string() })),
            )
                .into_response()
        }
        Err(err) => {
            tracing::error!(estimate_id = %request.estimate_id, error = %err, "Invoice post failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": "Failed to post invoice" })),
            )
                .into_response()
        }
    }
}

/// List configured outbound webhook destinations.
async fn list_webhooks<S>(State(service): State<Arc<S>>) -> Response
where
    S: IntakeApi,
{
    match service.list_webhook_configs().await {
        Ok(webhooks) => Json(json!({ "success": true, "webhooks": webhooks })).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Failed to fetch webhook configurations");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": "Failed to fetch webhook configurations"
                })),
            )
                .into_response()
        }
    }
}

/// Request body for creating or updating a webhook configuration.
#[derive(Deserialize)]
struct CreateWebhookRequest {
    #[serde(default)]
    config: Option<EndpointConfig>,
    #[serde(default)]
    marketplace: Option<String>,
    #[serde(default)]
    ccc_id: Option<String>,
}

#[derive(Deserialize)]
struct EndpointConfig {
    endpoint: String,
    secret: String,
}

/// Create or update a webhook configuration keyed by `ccc_id`.
async fn create_webhook<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<CreateWebhookRequest>,
) -> Response
where
    S: IntakeApi,
{
    let (Some(config), Some(marketplace), Some(ccc_id)) =
        (request.config, request.marketplace, request.ccc_id)
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "Missing required fields" })),
        )
            .into_response();
    };
    if config.endpoint.trim().is_empty() || config.secret.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "Invalid webhook configuration" })),
        )
            .into_response();
    }

    let upsert = crate::store::WebhookConfigUpsert {
        ccc_id,
        marketplace_id: marketplace,
        endpoint: config.endpoint,
        secret: config.secret,
    };
    match service.upsert_webhook_config(upsert).await {
        Ok(webhook) => Json(json!({ "success": true, "webhook": webhook })).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Failed to save webhook configuration");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": "Failed to save webhook configuration"
                })),
            )
                .into_response()
        }
    }
}

/// Return a concise metrics snapshot with intake counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Response
where
    S: IntakeApi,
{
    Json(service.metrics_snapshot()).into_response()
}

/// Descriptor for a single command in the discovery catalog.
#[derive(serde::Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(serde::Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "index",
                method: "POST",
                path: "/index",
                description: "OCR an invoice image, generate an embedding, and persist a searchable document. Response returns { \"success\": true }.",
                request_example: Some(json!({
                    "invoiceId": "INV-42",
                    "imageUrl": "https://cdn.example.org/invoice.png"
                })),
            },
            CommandDescriptor {
                name: "query",
                method: "POST",
                path: "/query",
                description: "Return the topK stored documents most similar to a free-text query.",
                request_example: Some(json!({
                    "query": "total due for estimate EST-1",
                    "topK": 5
                })),
            },
            CommandDescriptor {
                name: "post_invoice",
                method: "POST",
                path: "/invoices/post",
                description: "Submit a generated XML invoice to the CCC claims API using the environment-selected credentials.",
                request_example: Some(json!({
                    "estimateId": "EST-1",
                    "xml": "<VehicleDamageEstimateAddInvoiceRq/>"
                })),
            },
            CommandDescriptor {
                name: "list_webhooks",
                method: "GET",
                path: "/webhooks",
                description: "Return the configured outbound webhook destinations.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return intake counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}
