//! Inbound webhook verification, parsing, and dispatch.

pub mod dispatch;
pub mod signature;
pub mod xml;

pub use dispatch::{DispatchOutcome, Dispatcher, HandlerError, LogOnlyHandler, WebhookHandler};
pub use signature::{compute_signature, verify_signature};
pub use xml::{XmlDocument, XmlParseError, XmlValue, parse_document};
