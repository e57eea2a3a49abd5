//! Error types for the inbound adapter core
//!
//! One taxonomy covers construction, configuration, connection, and
//! per-message delivery failures. Construction and configuration errors
//! surface synchronously to the caller; per-message errors are contained
//! inside the delivery callback and only ever reach the error sink or the
//! fault counter; connection errors are retried by the container supervisor
//! and are observable through logging and the `Recovering` state.

use thiserror::Error;

/// Main error type for adapter operations
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Bad topic name or QoS at subscription construction
    #[error("invalid subscription: {message}")]
    InvalidSubscription { message: String },

    /// Missing or contradictory adapter settings at build time
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Broker unreachable or session refused; retried by the supervisor
    #[error("connection error: {message}")]
    Connection { message: String },

    /// Malformed inbound payload; per-message, never fatal
    #[error("conversion failed: {message}")]
    Conversion { message: String },

    /// Sink delivery exceeded the configured send timeout
    #[error("delivery timed out after {timeout_ms}ms")]
    DeliveryTimeout { timeout_ms: u64 },

    /// Sink refused the message
    #[error("delivery rejected: {message}")]
    DeliveryRejected { message: String },

    /// Misuse of the builder or lifecycle API
    #[error("illegal state: {message}")]
    IllegalState { message: String },

    /// Configuration file loading or validation failure
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl AdapterError {
    /// Create an invalid subscription error
    pub fn invalid_subscription<S: Into<String>>(message: S) -> Self {
        Self::InvalidSubscription {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a conversion error
    pub fn conversion<S: Into<String>>(message: S) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }

    /// Create a delivery rejection error
    pub fn delivery_rejected<S: Into<String>>(message: S) -> Self {
        Self::DeliveryRejected {
            message: message.into(),
        }
    }

    /// Create an illegal state error
    pub fn illegal_state<S: Into<String>>(message: S) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }
}

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_map_to_variants() {
        assert!(matches!(
            AdapterError::invalid_subscription("x"),
            AdapterError::InvalidSubscription { .. }
        ));
        assert!(matches!(
            AdapterError::configuration("x"),
            AdapterError::Configuration { .. }
        ));
        assert!(matches!(
            AdapterError::connection("x"),
            AdapterError::Connection { .. }
        ));
        assert!(matches!(
            AdapterError::conversion("x"),
            AdapterError::Conversion { .. }
        ));
        assert!(matches!(
            AdapterError::illegal_state("x"),
            AdapterError::IllegalState { .. }
        ));
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            AdapterError::configuration("sink is required").to_string(),
            "configuration error: sink is required"
        );
        assert_eq!(
            AdapterError::DeliveryTimeout { timeout_ms: 123 }.to_string(),
            "delivery timed out after 123ms"
        );
        assert_eq!(
            AdapterError::delivery_rejected("queue full").to_string(),
            "delivery rejected: queue full"
        );
    }
}
