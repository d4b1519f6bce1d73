//! Embedding client abstraction and the OpenAI-compatible HTTP adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::get_config;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// HTTP layer failed before receiving a response.
    #[error("Embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied text.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// HTTP adapter for an OpenAI-compatible `POST {base}/embeddings` API.
pub struct RemoteEmbeddingClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl RemoteEmbeddingClient {
    /// Construct a client using configuration derived from the environment.
    pub fn new() -> Result<Self, EmbeddingClientError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("invocr/0.3")
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.embedding_endpoint.trim_end_matches('/').to_string(),
            api_key: config.embedding_api_key.clone(),
            model: config.embedding_model.clone(),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(base_url: String, model: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            model,
        }
    }
}

#[async_trait]
impl EmbeddingClient for RemoteEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }

        let expected = texts.len();
        tracing::debug!(model = %self.model, inputs = expected, "Generating embeddings");

        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&EmbeddingsRequest {
                model: &self.model,
                input: texts,
            });
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "provider returned {status}: {body}"
            )));
        }

        let payload: EmbeddingsResponse = response.json().await?;
        if payload.data.len() != expected {
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "provider returned {} vectors for {} inputs",
                payload.data.len(),
                expected
            )));
        }

        let mut data = payload.data;
        data.sort_by_key(|datum| datum.index);
        Ok(data.into_iter().map(|datum| datum.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    #[tokio::test]
    async fn embeds_texts_in_input_order() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embeddings")
                    .json_body_partial(r#"{ "model": "text-embedding-3-small" }"#);
                then.status(200).json_body(json!({
                    "data": [
                        { "index": 1, "embedding": [0.3, 0.4] },
                        { "index": 0, "embedding": [0.1, 0.2] }
                    ]
                }));
            })
            .await;

        let client = RemoteEmbeddingClient::with_base_url(
            server.base_url(),
            "text-embedding-3-small".to_string(),
        );
        let vectors = client
            .generate_embeddings(vec!["first".to_string(), "second".to_string()])
            .await
            .expect("vectors");

        mock.assert();
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn empty_input_is_rejected_locally() {
        let client =
            RemoteEmbeddingClient::with_base_url("http://127.0.0.1:9".to_string(), "m".to_string());
        let err = client
            .generate_embeddings(Vec::new())
            .await
            .expect_err("empty input");
        assert!(matches!(err, EmbeddingClientError::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn provider_error_status_surfaces() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(429).body("rate limited");
            })
            .await;

        let client = RemoteEmbeddingClient::with_base_url(server.base_url(), "m".to_string());
        let err = client
            .generate_embeddings(vec!["text".to_string()])
            .await
            .expect_err("provider error");
        assert!(err.to_string().contains("429"));
    }
}
