//! Per-event-type webhook dispatch.
//!
//! Handlers are registered against exact event-type strings. Unknown event types are
//! logged and otherwise ignored; a handler failure never surfaces to the webhook
//! caller, whose signed request has already been acknowledged for audit purposes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Error raised by a webhook handler while processing a payload.
#[derive(Debug, Error)]
#[error("Webhook handler failed: {0}")]
pub struct HandlerError(pub String);

/// Capability implemented by per-event-type webhook handlers.
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    /// Process the parsed payload of one webhook delivery.
    async fn handle(&self, event_type: &str, payload: &Value) -> Result<(), HandlerError>;
}

/// Result of routing one event through the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A registered handler ran to completion.
    Handled,
    /// A registered handler ran and failed.
    HandlerFailed,
    /// No handler is registered for the event type.
    Unhandled,
}

/// Registry mapping event-type strings to handler implementations.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Arc<dyn WebhookHandler>>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dispatcher with log-only handlers for the known JSON event types.
    pub fn with_default_handlers() -> Self {
        let mut dispatcher = Self::new();
        let log_only: Arc<dyn WebhookHandler> = Arc::new(LogOnlyHandler);
        for event in ["invoice.created", "invoice.updated", "marketplace.listing"] {
            dispatcher.register(event, Arc::clone(&log_only));
        }
        dispatcher
    }

    /// Register a handler for an exact event-type string, replacing any existing one.
    pub fn register(&mut self, event_type: &str, handler: Arc<dyn WebhookHandler>) {
        self.handlers.insert(event_type.to_string(), handler);
    }

    /// Whether a handler is registered for the event type.
    pub fn recognizes(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    /// Route one event to its handler, if any.
    pub async fn dispatch(&self, event_type: &str, payload: &Value) -> DispatchOutcome {
        let Some(handler) = self.handlers.get(event_type) else {
            tracing::info!(event = event_type, "Unhandled webhook event type");
            return DispatchOutcome::Unhandled;
        };
        match handler.handle(event_type, payload).await {
            Ok(()) => DispatchOutcome::Handled,
            Err(err) => {
                tracing::error!(event = event_type, error = %err, "Webhook handler failed");
                DispatchOutcome::HandlerFailed
            }
        }
    }
}

/// Handler that records the delivery and performs no further side effects.
pub struct LogOnlyHandler;

#[async_trait]
impl WebhookHandler for LogOnlyHandler {
    async fn handle(&self, event_type: &str, payload: &Value) -> Result<(), HandlerError> {
        tracing::info!(event = event_type, payload = %payload, "Processing webhook event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WebhookHandler for CountingHandler {
        async fn handle(&self, _event_type: &str, _payload: &Value) -> Result<(), HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl WebhookHandler for FailingHandler {
        async fn handle(&self, _event_type: &str, _payload: &Value) -> Result<(), HandlerError> {
            Err(HandlerError("downstream unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn routes_by_exact_event_type() {
        let handler = Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
        });
        let mut dispatcher = Dispatcher::new();
        dispatcher.register("invoice.created", handler.clone());

        let outcome = dispatcher.dispatch("invoice.created", &json!({})).await;
        assert_eq!(outcome, DispatchOutcome::Handled);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

        // Prefix or case variants do not match.
        let outcome = dispatcher.dispatch("invoice.Created", &json!({})).await;
        assert_eq!(outcome, DispatchOutcome::Unhandled);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handler_failure_is_contained() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register("invoice.updated", Arc::new(FailingHandler));
        let outcome = dispatcher.dispatch("invoice.updated", &json!({})).await;
        assert_eq!(outcome, DispatchOutcome::HandlerFailed);
    }

    #[tokio::test]
    async fn default_handlers_cover_known_events() {
        let dispatcher = Dispatcher::with_default_handlers();
        assert!(dispatcher.recognizes("invoice.created"));
        assert!(dispatcher.recognizes("invoice.updated"));
        assert!(dispatcher.recognizes("marketplace.listing"));
        assert!(!dispatcher.recognizes("estimate.created"));

        let outcome = dispatcher
            .dispatch("marketplace.listing", &json!({"listing": 1}))
            .await;
        assert_eq!(outcome, DispatchOutcome::Handled);
    }
}
