//! Conversion between broker frames and the internal envelope

use crate::broker::{InboundFrame, OutboundFrame};
use crate::error::{AdapterError, AdapterResult};
use crate::message::{headers, Message};
use crate::subscription::QosLevel;
use serde_json::Value;

/// Translates broker-native frames into internal messages and back.
///
/// `to_internal` runs on the container's delivery task for every inbound
/// frame; implementations must be cheap and signal malformed payloads with a
/// conversion error instead of panicking. `from_internal` is the outbound
/// mirror, used by outbound adapters.
pub trait MessageConverter: Send + Sync {
    /// Build the internal envelope for an inbound frame
    fn to_internal(&self, frame: &InboundFrame) -> AdapterResult<Message>;

    /// Build a publishable frame from an internal envelope
    fn from_internal(&self, message: &Message) -> AdapterResult<OutboundFrame>;
}

/// Passthrough converter: copies the payload and stamps the standard headers
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultMessageConverter;

impl MessageConverter for DefaultMessageConverter {
    fn to_internal(&self, frame: &InboundFrame) -> AdapterResult<Message> {
        Ok(Message::new(frame.payload.clone())
            .with_standard_headers()
            .with_header(headers::TOPIC, frame.topic.as_str())
            .with_header(headers::QOS, u64::from(frame.qos.value())))
    }

    fn from_internal(&self, message: &Message) -> AdapterResult<OutboundFrame> {
        let topic = message
            .header(headers::TOPIC)
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::conversion("message has no topic header"))?
            .to_string();

        let qos = match message.header(headers::QOS).and_then(Value::as_u64) {
            Some(value) => u8::try_from(value)
                .ok()
                .and_then(|v| QosLevel::from_value(v).ok())
                .ok_or_else(|| {
                    AdapterError::conversion(format!("qos header out of range: {value}"))
                })?,
            None => QosLevel::AtMostOnce,
        };

        Ok(OutboundFrame {
            topic,
            payload: message.payload().clone(),
            qos,
        })
    }
}

/// Converter that additionally requires payloads to be well-formed JSON
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonMessageConverter;

impl MessageConverter for JsonMessageConverter {
    fn to_internal(&self, frame: &InboundFrame) -> AdapterResult<Message> {
        serde_json::from_slice::<Value>(&frame.payload).map_err(|err| {
            AdapterError::conversion(format!(
                "malformed json payload on '{}': {err}",
                frame.topic
            ))
        })?;
        DefaultMessageConverter.to_internal(frame)
    }

    fn from_internal(&self, message: &Message) -> AdapterResult<OutboundFrame> {
        DefaultMessageConverter.from_internal(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn frame(topic: &str, payload: &str, qos: QosLevel) -> InboundFrame {
        InboundFrame {
            topic: topic.to_string(),
            payload: Bytes::copy_from_slice(payload.as_bytes()),
            qos,
        }
    }

    #[test]
    fn test_default_converter_stamps_headers() {
        let message = DefaultMessageConverter
            .to_internal(&frame("sensors/temp", "21.5", QosLevel::AtLeastOnce))
            .unwrap();

        assert_eq!(message.payload().as_ref(), b"21.5");
        assert_eq!(
            message.header(headers::TOPIC).and_then(Value::as_str),
            Some("sensors/temp")
        );
        assert_eq!(
            message.header(headers::QOS).and_then(Value::as_u64),
            Some(1)
        );
        assert!(message.header(headers::MESSAGE_ID).is_some());
        assert!(message.header(headers::RECEIVED_AT).is_some());
    }

    #[test]
    fn test_default_converter_outbound_mirror() {
        let converter = DefaultMessageConverter;
        let inbound = frame("events/a", "payload", QosLevel::ExactlyOnce);
        let message = converter.to_internal(&inbound).unwrap();

        let outbound = converter.from_internal(&message).unwrap();
        assert_eq!(outbound.topic, "events/a");
        assert_eq!(outbound.payload.as_ref(), b"payload");
        assert_eq!(outbound.qos, QosLevel::ExactlyOnce);
    }

    #[test]
    fn test_from_internal_requires_topic_header() {
        let message = Message::new("x");
        let result = DefaultMessageConverter.from_internal(&message);
        assert!(matches!(result, Err(AdapterError::Conversion { .. })));
    }

    #[test]
    fn test_json_converter_rejects_malformed_payload() {
        let result =
            JsonMessageConverter.to_internal(&frame("events/a", "not json", QosLevel::AtMostOnce));
        assert!(matches!(result, Err(AdapterError::Conversion { .. })));
    }

    #[test]
    fn test_json_converter_accepts_valid_payload() {
        let message = JsonMessageConverter
            .to_internal(&frame("events/a", r#"{"ok":true}"#, QosLevel::AtMostOnce))
            .unwrap();
        assert_eq!(message.payload().as_ref(), br#"{"ok":true}"#);
    }
}
