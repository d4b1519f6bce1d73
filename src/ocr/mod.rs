//! OCR client abstraction and the remote HTTP adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::get_config;

/// Errors raised while extracting text from an invoice image.
#[derive(Debug, Error)]
pub enum OcrError {
    /// HTTP layer failed before receiving a response.
    #[error("OCR request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// OCR service responded with an unexpected status code.
    #[error("Unexpected OCR response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the OCR service.
        status: reqwest::StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Interface implemented by OCR backends.
#[async_trait]
pub trait OcrClient: Send + Sync {
    /// Extract plain text from the image at the given location.
    async fn recognize(&self, image_url: &str) -> Result<String, OcrError>;
}

#[derive(Serialize)]
struct RecognizeRequest<'a> {
    #[serde(rename = "imageUrl")]
    image_url: &'a str,
    language: &'a str,
}

#[derive(Deserialize)]
struct RecognizeResponse {
    text: String,
}

/// HTTP adapter for a hosted OCR service.
pub struct RemoteOcrClient {
    client: Client,
    endpoint: String,
}

impl RemoteOcrClient {
    /// Construct a client using configuration derived from the environment.
    pub fn new() -> Result<Self, OcrError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("invocr/0.3")
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.ocr_endpoint.clone(),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_endpoint(endpoint: String) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl OcrClient for RemoteOcrClient {
    async fn recognize(&self, image_url: &str) -> Result<String, OcrError> {
        tracing::debug!(image_url, "Requesting OCR extraction");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&RecognizeRequest {
                image_url,
                language: "eng",
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = OcrError::UnexpectedStatus { status, body };
            tracing::error!(image_url, error = %error, "OCR extraction failed");
            return Err(error);
        }

        let payload: RecognizeResponse = response.json().await?;
        Ok(payload.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    #[tokio::test]
    async fn recognize_posts_image_url() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/")
                    .json_body(json!({ "imageUrl": "https://cdn/invoice.png", "language": "eng" }));
                then.status(200)
                    .json_body(json!({ "text": "INVOICE #42\nTotal: $100" }));
            })
            .await;

        let client = RemoteOcrClient::with_endpoint(server.base_url());
        let text = client
            .recognize("https://cdn/invoice.png")
            .await
            .expect("ocr text");

        mock.assert();
        assert!(text.starts_with("INVOICE #42"));
    }

    #[tokio::test]
    async fn non_success_status_is_fatal() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(502).body("bad gateway");
            })
            .await;

        let client = RemoteOcrClient::with_endpoint(server.base_url());
        let err = client
            .recognize("https://cdn/invoice.png")
            .await
            .expect_err("ocr failure");
        assert!(matches!(err, OcrError::UnexpectedStatus { .. }));
    }
}
