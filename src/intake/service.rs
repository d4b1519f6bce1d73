//! Intake service coordinating OCR, embedding, vector storage, and webhook ingestion.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    config::get_config,
    embedding::{EmbeddingClient, RemoteEmbeddingClient},
    intake::types::{CccWebhookOutcome, IntakeError, WebhookError},
    metrics::{IntakeMetrics, MetricsSnapshot},
    ocr::{OcrClient, RemoteOcrClient},
    poster::{InvoicePoster, PostError},
    store::{
        AuditStore, InvoiceRecord, RestAuditStore, WebhookConfig, WebhookConfigUpsert,
        WebhookEventRecord,
    },
    vector::{DocumentUpsert, QdrantVectorStore, ScoredDocument, VectorStore},
    webhook::{DispatchOutcome, Dispatcher, parse_document, verify_signature},
};

/// Coordinates the intake pipelines: OCR indexing, semantic retrieval, webhook
/// ingestion, and outbound invoice posting.
///
/// The service owns long-lived handles to every external collaborator so the HTTP
/// surface shares one client instance per process. Construct it once near process
/// start and share it through an `Arc`.
pub struct IntakeService {
    ocr: Box<dyn OcrClient>,
    embedding: Box<dyn EmbeddingClient>,
    vector: Box<dyn VectorStore>,
    store: Box<dyn AuditStore>,
    poster: InvoicePoster,
    dispatcher: Dispatcher,
    metrics: Arc<IntakeMetrics>,
}

/// Abstraction over the intake pipelines used by the HTTP surface.
#[async_trait]
pub trait IntakeApi: Send + Sync {
    /// OCR an invoice image, embed the text, and upsert the resulting document.
    async fn index_invoice_image(
        &self,
        invoice_id: &str,
        image_url: &str,
    ) -> Result<(), IntakeError>;

    /// Answer a free-text query with the top-K most similar stored documents.
    async fn query_documents(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<ScoredDocument>, IntakeError>;

    /// Verify, parse, persist, and dispatch a signed CCC webhook delivery.
    async fn ingest_ccc_webhook(
        &self,
        body: &[u8],
        signature: &str,
        user_id: Option<&str>,
    ) -> Result<CccWebhookOutcome, WebhookError>;

    /// Verify, parse, persist, and dispatch a signed JSON webhook delivery.
    async fn ingest_json_webhook(&self, body: &[u8], signature: &str)
    -> Result<(), WebhookError>;

    /// Submit a generated XML invoice to the CCC claims API.
    async fn post_invoice(&self, estimate_id: &str, xml: String) -> Result<(), PostError>;

    /// List tenant-configured outbound webhook destinations.
    async fn list_webhook_configs(&self) -> Result<Vec<WebhookConfig>, IntakeError>;

    /// Create or update an outbound webhook destination keyed by `ccc_id`.
    async fn upsert_webhook_config(
        &self,
        config: WebhookConfigUpsert,
    ) -> Result<WebhookConfig, IntakeError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl IntakeService {
    /// Build a new intake service, initializing backing clients as needed.
    pub async fn new() -> Self {
        let config = get_config();
        let ocr = RemoteOcrClient::new().expect("Failed to build OCR client");
        let embedding = RemoteEmbeddingClient::new().expect("Failed to build embedding client");
        let vector = QdrantVectorStore::new().expect("Failed to connect to vector store");
        let store = RestAuditStore::new().expect("Failed to build audit store client");
        let poster = InvoicePoster::new().expect("Failed to build CCC poster");

        let vector_size = config.embedding_dimension as u64;
        vector
            .ensure_collection(&config.qdrant_collection_name, vector_size)
            .await
            .expect("Failed to ensure vector collection exists");
        tracing::debug!(collection = %config.qdrant_collection_name, "Document collection ready");

        Self::with_components(
            Box::new(ocr),
            Box::new(embedding),
            Box::new(vector),
            Box::new(store),
            poster,
            Dispatcher::with_default_handlers(),
        )
    }

    /// Assemble a service from explicit components. Useful for embedding the pipelines
    /// in other hosts and for tests.
    pub fn with_components(
        ocr: Box<dyn OcrClient>,
        embedding: Box<dyn EmbeddingClient>,
        vector: Box<dyn VectorStore>,
        store: Box<dyn AuditStore>,
        poster: InvoicePoster,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            ocr,
            embedding,
            vector,
            store,
            poster,
            dispatcher,
            metrics: Arc::new(IntakeMetrics::new()),
        }
    }

    async fn embed_single(&self, text: String) -> Result<Vec<f32>, IntakeError> {
        let config = get_config();
        let mut vectors = self.embedding.generate_embeddings(vec![text]).await?;
        let vector = vectors.pop().ok_or(IntakeError::EmptyEmbedding)?;

        let expected = config.embedding_dimension;
        let actual = vector.len();
        if actual != expected {
            return Err(IntakeError::DimensionMismatch { expected, actual });
        }
        Ok(vector)
    }

    /// Persist the audit rows for an accepted delivery and route it to its handler.
    ///
    /// Audit persistence is best-effort: a failure is logged and never aborts the
    /// request, because the signed delivery has already been accepted. The event row
    /// is written before dispatch runs; successful dispatch marks it processed.
    async fn record_and_dispatch(&self, record: WebhookEventRecord) {
        let event_id = record.id;
        let event_persisted = match self.store.insert_event(&record).await {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(event = %record.event_type, error = %err, "Failed to persist webhook event");
                false
            }
        };

        let outcome = self
            .dispatcher
            .dispatch(&record.event_type, &record.payload)
            .await;

        if event_persisted
            && outcome == DispatchOutcome::Handled
            && let Err(err) = self.store.mark_event_processed(event_id).await
        {
            tracing::warn!(event_id = %event_id, error = %err, "Failed to mark webhook event processed");
        }
    }
}

#[async_trait]
impl IntakeApi for IntakeService {
    async fn index_invoice_image(
        &self,
        invoice_id: &str,
        image_url: &str,
    ) -> Result<(), IntakeError> {
        let config = get_config();
        tracing::info!(invoice_id, image_url, "Indexing invoice image");

        // OCR failure is fatal to the whole operation: no partial indexing.
        let text = self.ocr.recognize(image_url).await?;
        let vector = self.embed_single(text.clone()).await?;

        let mut metadata = Map::new();
        metadata.insert("invoiceId".into(), Value::String(invoice_id.to_string()));
        metadata.insert("imageUrl".into(), Value::String(image_url.to_string()));
        metadata.insert("indexed_at".into(), Value::String(now_rfc3339()));

        self.vector
            .upsert_document(
                &config.qdrant_collection_name,
                DocumentUpsert {
                    id: format!("{invoice_id}::{image_url}"),
                    content: text,
                    metadata,
                    vector,
                },
            )
            .await?;

        self.metrics.record_document();
        tracing::info!(invoice_id, image_url, "Invoice image indexed");
        Ok(())
    }

    async fn query_documents(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<ScoredDocument>, IntakeError> {
        let config = get_config();
        let limit = top_k
            .unwrap_or(config.query_default_top_k)
            .clamp(1, config.query_max_top_k);

        let vector = self.embed_single(query.to_string()).await?;
        // Ranking is delegated to the store; results pass through unmodified.
        let docs = self
            .vector
            .search(&config.qdrant_collection_name, vector, limit)
            .await?;

        self.metrics.record_query();
        tracing::info!(limit, results = docs.len(), "Semantic query served");
        Ok(docs)
    }

    async fn ingest_ccc_webhook(
        &self,
        body: &[u8],
        signature: &str,
        user_id: Option<&str>,
    ) -> Result<CccWebhookOutcome, WebhookError> {
        let config = get_config();
        if !verify_signature(&config.ccc_webhook_secret, body, signature) {
            self.metrics.record_webhook_rejected();
            tracing::warn!("CCC webhook rejected: signature mismatch");
            return Err(WebhookError::Signature);
        }

        let document = parse_document(body).inspect_err(|err| {
            self.metrics.record_webhook_rejected();
            tracing::warn!(error = %err, "CCC webhook rejected: unparseable body");
        })?;

        let event = document.root.clone();
        let invoice_id = document
            .document_id()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = now_rfc3339();

        let invoice = InvoiceRecord {
            id: invoice_id.clone(),
            user_id: user_id.map(ToString::to_string),
            ccc_status: event.clone(),
            raw_payload: String::from_utf8_lossy(body).into_owned(),
            created_at: now.clone(),
        };
        if let Err(err) = self.store.insert_invoice(&invoice).await {
            tracing::error!(invoice_id = %invoice.id, error = %err, "Failed to persist invoice row");
        }

        let record = WebhookEventRecord {
            id: Uuid::new_v4(),
            source: "ccc".to_string(),
            event_type: event.clone(),
            payload: json!({ (event.clone()): document.value.to_json() }),
            processed: false,
            received_at: now,
        };
        self.record_and_dispatch(record).await;

        self.metrics.record_webhook_accepted();
        tracing::info!(event = %event, invoice_id = %invoice_id, "CCC webhook ingested");
        Ok(CccWebhookOutcome { event, invoice_id })
    }

    async fn ingest_json_webhook(
        &self,
        body: &[u8],
        signature: &str,
    ) -> Result<(), WebhookError> {
        let config = get_config();
        if !verify_signature(&config.ccc_webhook_secret, body, signature) {
            self.metrics.record_webhook_rejected();
            tracing::warn!("JSON webhook rejected: signature mismatch");
            return Err(WebhookError::Signature);
        }

        let envelope: JsonEnvelope = serde_json::from_slice(body).map_err(|err| {
            self.metrics.record_webhook_rejected();
            tracing::warn!(error = %err, "JSON webhook rejected: unparseable body");
            WebhookError::Parse(err.to_string())
        })?;
        let (Some(event), Some(data), Some(source)) =
            (envelope.event, envelope.data, envelope.source)
        else {
            self.metrics.record_webhook_rejected();
            return Err(WebhookError::MissingFields);
        };

        let record = WebhookEventRecord {
            id: Uuid::new_v4(),
            source,
            event_type: event,
            payload: data,
            processed: false,
            received_at: now_rfc3339(),
        };
        self.record_and_dispatch(record).await;

        self.metrics.record_webhook_accepted();
        Ok(())
    }

    async fn post_invoice(&self, estimate_id: &str, xml: String) -> Result<(), PostError> {
        self.poster.post_invoice(estimate_id, xml).await?;
        self.metrics.record_invoice_posted();
        Ok(())
    }

    async fn list_webhook_configs(&self) -> Result<Vec<WebhookConfig>, IntakeError> {
        Ok(self.store.list_webhook_configs().await?)
    }

    async fn upsert_webhook_config(
        &self,
        config: WebhookConfigUpsert,
    ) -> Result<WebhookConfig, IntakeError> {
        let row = self.store.upsert_webhook_config(&config).await?;
        tracing::info!(ccc_id = %row.ccc_id, "Webhook configuration saved");
        Ok(row)
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[derive(serde::Deserialize)]
struct JsonEnvelope {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    source: Option<String>,
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
