//! Internal message envelope
//!
//! The envelope is what crosses the boundary between the adapter and the
//! downstream application: payload bytes plus loosely typed headers. One is
//! created per inbound broker frame and ownership transfers to the sink on
//! delivery; the adapter keeps no reference afterwards.

use bytes::Bytes;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Well-known header names stamped by the provided converters
pub mod headers {
    /// Source topic the frame arrived on
    pub const TOPIC: &str = "inflow.topic";
    /// QoS level the frame was received with
    pub const QOS: &str = "inflow.qos";
    /// Generated per-message identifier
    pub const MESSAGE_ID: &str = "inflow.message-id";
    /// RFC 3339 receive timestamp
    pub const RECEIVED_AT: &str = "inflow.received-at";
    /// Fault classification on messages routed to the error sink
    pub const FAULT_KIND: &str = "inflow.fault.kind";
    /// Human-readable fault description
    pub const FAULT_REASON: &str = "inflow.fault.reason";
}

/// Internal message representation: payload bytes plus headers
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    payload: Bytes,
    headers: HashMap<String, Value>,
}

impl Message {
    /// Create a message with an empty header map
    pub fn new<P: Into<Bytes>>(payload: P) -> Self {
        Self {
            payload: payload.into(),
            headers: HashMap::new(),
        }
    }

    /// Stamp a generated message id and the receive timestamp
    pub fn with_standard_headers(self) -> Self {
        self.with_header(headers::MESSAGE_ID, Uuid::new_v4().to_string())
            .with_header(headers::RECEIVED_AT, Utc::now().to_rfc3339())
    }

    /// Attach a header, replacing any existing value under the same name
    pub fn with_header<N, V>(mut self, name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<Value>,
    {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Payload bytes
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consume the message, keeping only the payload
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Look up a single header
    pub fn header(&self, name: &str) -> Option<&Value> {
        self.headers.get(name)
    }

    /// All headers; insertion order is not meaningful
    pub fn headers(&self) -> &HashMap<String, Value> {
        &self.headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_and_headers() {
        let message = Message::new("hello")
            .with_header(headers::TOPIC, "sensors/temp")
            .with_header("app.priority", 7u64);

        assert_eq!(message.payload().as_ref(), b"hello");
        assert_eq!(
            message.header(headers::TOPIC),
            Some(&Value::String("sensors/temp".to_string()))
        );
        assert_eq!(message.header("app.priority").and_then(Value::as_u64), Some(7));
        assert!(message.header("missing").is_none());
    }

    #[test]
    fn test_with_header_replaces_existing() {
        let message = Message::new("x")
            .with_header("k", "first")
            .with_header("k", "second");
        assert_eq!(message.header("k").and_then(Value::as_str), Some("second"));
        assert_eq!(message.headers().len(), 1);
    }

    #[test]
    fn test_standard_headers_are_stamped() {
        let message = Message::new("x").with_standard_headers();
        assert!(message.header(headers::MESSAGE_ID).is_some());
        assert!(message.header(headers::RECEIVED_AT).is_some());

        // ids are unique per message
        let other = Message::new("x").with_standard_headers();
        assert_ne!(
            message.header(headers::MESSAGE_ID),
            other.header(headers::MESSAGE_ID)
        );
    }

    #[test]
    fn test_into_payload_transfers_ownership() {
        let message = Message::new("payload").with_standard_headers();
        assert_eq!(message.into_payload().as_ref(), b"payload");
    }
}
