//! Outbound invoice submission to the CCC claims API.
//!
//! Delivery is fire-and-forget at-most-once: a non-2xx response is fatal for the call
//! and is surfaced with the remote status code; no retry or backoff is performed.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::config::get_config;

/// Errors raised while posting an invoice to the CCC API.
#[derive(Debug, Error)]
pub enum PostError {
    /// HTTP layer failed before receiving a response.
    #[error("CCC request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// CCC responded with a non-2xx status.
    #[error("API Error {}", status.as_u16())]
    Api {
        /// HTTP status returned by the CCC API.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Client for submitting generated invoice XML to the CCC claims API.
pub struct InvoicePoster {
    client: Client,
    base_url: String,
    token: String,
}

impl InvoicePoster {
    /// Construct a poster using the environment-selected CCC credentials.
    pub fn new() -> Result<Self, PostError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("invocr/0.3")
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let (base_url, token) = config.ccc_credentials();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Construct a poster against explicit credentials, bypassing global configuration.
    pub fn with_credentials(base_url: String, token: String) -> Result<Self, PostError> {
        Ok(Self {
            client: Client::builder().user_agent("invocr/0.3").build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Submit a pre-built XML invoice payload for the given estimate.
    pub async fn post_invoice(&self, estimate_id: &str, xml: String) -> Result<(), PostError> {
        let url = format!("{}/v7/estimate/{estimate_id}/invoice", self.base_url);
        tracing::info!(estimate_id, "Posting invoice to CCC");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .header("Content-Type", "application/xml")
            .body(xml)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = PostError::Api { status, body };
            tracing::error!(estimate_id, error = %error, "CCC rejected invoice");
            return Err(error);
        }

        tracing::info!(estimate_id, "Invoice accepted by CCC");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn posts_xml_with_bearer_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v7/estimate/EST-1/invoice")
                    .header("Authorization", "Bearer token-1")
                    .header("Content-Type", "application/xml")
                    .body("<Invoice/>");
                then.status(200);
            })
            .await;

        let poster =
            InvoicePoster::with_credentials(server.base_url(), "token-1".into()).expect("poster");
        poster
            .post_invoice("EST-1", "<Invoice/>".to_string())
            .await
            .expect("post");
        mock.assert();
    }

    #[tokio::test]
    async fn non_2xx_is_fatal_with_status() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v7/estimate/EST-1/invoice");
                then.status(503).body("maintenance");
            })
            .await;

        let poster =
            InvoicePoster::with_credentials(server.base_url(), "token-1".into()).expect("poster");
        let err = poster
            .post_invoice("EST-1", "<Invoice/>".to_string())
            .await
            .expect_err("api error");

        // Exactly one attempt: no retry on failure.
        mock.assert_hits(1);
        assert_eq!(err.to_string(), "API Error 503");
        match err {
            PostError::Api { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body, "maintenance");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }
}
