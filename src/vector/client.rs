//! HTTP client wrapper for the Qdrant document store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Map, Value, json};

use crate::config::get_config;
use crate::vector::payload::{build_payload, current_timestamp_rfc3339, point_id_for};
use crate::vector::types::{
    DocumentUpsert, QueryResponse, QueryResponseResult, ScoredDocument, VectorStoreError,
};

/// Capability expected from the backing document store: upsert-by-id and
/// similarity-ranked retrieval delegated to the store's own ranking function.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection when it is missing.
    async fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> Result<(), VectorStoreError>;

    /// Insert or replace a document keyed by its caller-supplied id.
    async fn upsert_document(
        &self,
        collection: &str,
        document: DocumentUpsert,
    ) -> Result<(), VectorStoreError>;

    /// Return the top-`limit` documents ranked by similarity to `vector`.
    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredDocument>, VectorStoreError>;
}

/// Lightweight HTTP adapter for Qdrant operations.
pub struct QdrantVectorStore {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl QdrantVectorStore {
    /// Construct a new adapter using configuration derived from the environment.
    pub fn new() -> Result<Self, VectorStoreError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("invocr/0.3")
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let base_url =
            normalize_base_url(&config.qdrant_url).map_err(VectorStoreError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = %config
                .qdrant_api_key
                .as_deref()
                .map(|value| !value.is_empty())
                .unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.qdrant_api_key.clone(),
        })
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, VectorStoreError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = VectorStoreError::UnexpectedStatus { status, body };
                tracing::error!(collection, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    async fn create_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> Result<(), VectorStoreError> {
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection}"))
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection, vector_size, "Collection created");
        })
        .await
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), VectorStoreError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = VectorStoreError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Vector store request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> Result<(), VectorStoreError> {
        if self.collection_exists(collection).await? {
            return Ok(());
        }
        tracing::debug!(collection, vector_size, "Creating collection");
        self.create_collection(collection, vector_size).await
    }

    async fn upsert_document(
        &self,
        collection: &str,
        document: DocumentUpsert,
    ) -> Result<(), VectorStoreError> {
        let DocumentUpsert {
            id,
            content,
            metadata,
            vector,
        } = document;
        let now = current_timestamp_rfc3339();
        let point = json!({
            "id": point_id_for(&id),
            "vector": vector,
            "payload": build_payload(&id, &content, &metadata, &now),
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection}/points"))
            .query(&[("wait", true)])
            .json(&json!({ "points": [point] }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection, doc_id = %id, "Document upserted");
        })
        .await
    }

    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredDocument>, VectorStoreError> {
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
        });

        let response = self
            .request(Method::POST, &format!("collections/{collection}/points/query"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = VectorStoreError::UnexpectedStatus { status, body };
            tracing::error!(collection, error = %error, "Vector store search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };
        let results = points
            .into_iter()
            .map(|point| {
                let mut payload = point.payload;
                let doc_id = payload
                    .as_ref()
                    .and_then(|map| map.get("doc_id"))
                    .and_then(Value::as_str)
                    .map(ToString::to_string)
                    .unwrap_or_else(|| stringify_point_id(point.id));
                let content = payload
                    .as_mut()
                    .and_then(|map| map.remove("content"))
                    .and_then(|value| match value {
                        Value::String(text) => Some(text),
                        _ => None,
                    });
                let metadata = payload
                    .as_mut()
                    .and_then(|map| map.remove("metadata"))
                    .and_then(|value| match value {
                        Value::Object(map) => Some(map),
                        _ => None,
                    });
                ScoredDocument {
                    id: doc_id,
                    score: point.score,
                    content,
                    metadata,
                }
            })
            .collect();

        Ok(results)
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::payload::point_id_for;
    use httpmock::{Method::POST, Method::PUT, MockServer};
    use serde_json::Map;

    fn test_store(base_url: String) -> QdrantVectorStore {
        QdrantVectorStore {
            client: Client::builder()
                .user_agent("invocr-test")
                .build()
                .expect("client"),
            base_url,
            api_key: None,
        }
    }

    #[tokio::test]
    async fn upsert_sends_deterministic_point_id() {
        let server = MockServer::start_async().await;
        let expected_point = point_id_for("INV-42::https://cdn/invoice.png");
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/invoices/points")
                    .query_param("wait", "true")
                    .body_contains(&expected_point);
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": { "operation_id": 1, "status": "completed" }
                }));
            })
            .await;

        let store = test_store(server.base_url());
        let mut metadata = Map::new();
        metadata.insert("invoiceId".into(), Value::String("INV-42".into()));
        store
            .upsert_document(
                "invoices",
                DocumentUpsert {
                    id: "INV-42::https://cdn/invoice.png".into(),
                    content: "Total: $10".into(),
                    metadata,
                    vector: vec![0.1, 0.2],
                },
            )
            .await
            .expect("upsert");

        mock.assert();
    }

    #[tokio::test]
    async fn search_passes_limit_through_and_maps_payload() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/invoices/points/query")
                    .json_body_partial(r#"{ "limit": 3 }"#);
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": [
                        {
                            "id": "6a1f0000-0000-0000-0000-000000000001",
                            "score": 0.91,
                            "payload": {
                                "doc_id": "INV-42::https://cdn/invoice.png",
                                "content": "Total: $10",
                                "metadata": { "invoiceId": "INV-42" },
                                "indexed_at": "2025-01-01T00:00:00Z"
                            }
                        }
                    ]
                }));
            })
            .await;

        let store = test_store(server.base_url());
        let results = store
            .search("invoices", vec![0.1, 0.2], 3)
            .await
            .expect("search");

        mock.assert();
        assert_eq!(results.len(), 1);
        let hit = &results[0];
        assert_eq!(hit.id, "INV-42::https://cdn/invoice.png");
        assert!((hit.score - 0.91).abs() < f32::EPSILON);
        assert_eq!(hit.content.as_deref(), Some("Total: $10"));
        let metadata = hit.metadata.as_ref().expect("metadata");
        assert_eq!(metadata["invoiceId"], Value::String("INV-42".into()));
    }

    #[tokio::test]
    async fn search_error_status_surfaces() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/invoices/points/query");
                then.status(500).body("store exploded");
            })
            .await;

        let store = test_store(server.base_url());
        let err = store
            .search("invoices", vec![0.1], 5)
            .await
            .expect_err("search failure");
        assert!(matches!(err, VectorStoreError::UnexpectedStatus { .. }));
    }
}
