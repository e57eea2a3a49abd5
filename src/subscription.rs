//! Topic subscription value types
//!
//! A subscription pairs a topic name with its delivery quality-of-service
//! level. Both are validated at construction and immutable afterwards; the
//! ordered sequence attached to a listener container determines subscribe
//! order on the broker.

use crate::error::{AdapterError, AdapterResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Delivery quality-of-service level for a topic subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QosLevel {
    /// Level 0: fire and forget
    AtMostOnce,
    /// Level 1: acknowledged delivery
    AtLeastOnce,
    /// Level 2: assured delivery
    ExactlyOnce,
}

impl QosLevel {
    /// Parse a numeric QoS level; only 0, 1 and 2 are valid
    pub fn from_value(value: u8) -> AdapterResult<Self> {
        match value {
            0 => Ok(QosLevel::AtMostOnce),
            1 => Ok(QosLevel::AtLeastOnce),
            2 => Ok(QosLevel::ExactlyOnce),
            other => Err(AdapterError::invalid_subscription(format!(
                "qos must be 0, 1 or 2, got {other}"
            ))),
        }
    }

    /// Numeric form of this level
    pub fn value(self) -> u8 {
        match self {
            QosLevel::AtMostOnce => 0,
            QosLevel::AtLeastOnce => 1,
            QosLevel::ExactlyOnce => 2,
        }
    }
}

impl TryFrom<u8> for QosLevel {
    type Error = AdapterError;

    fn try_from(value: u8) -> AdapterResult<Self> {
        Self::from_value(value)
    }
}

impl From<QosLevel> for u8 {
    fn from(qos: QosLevel) -> u8 {
        qos.value()
    }
}

impl fmt::Display for QosLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Immutable descriptor of a topic name plus its delivery QoS
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicSubscription {
    name: String,
    qos: QosLevel,
}

impl TopicSubscription {
    /// Create a subscription; the topic name must be non-empty
    pub fn new<S: Into<String>>(name: S, qos: QosLevel) -> AdapterResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AdapterError::invalid_subscription(
                "topic name must not be empty",
            ));
        }
        Ok(Self { name, qos })
    }

    /// Create a subscription from a numeric QoS value
    pub fn with_qos_value<S: Into<String>>(name: S, qos: u8) -> AdapterResult<Self> {
        Self::new(name, QosLevel::from_value(qos)?)
    }

    /// Topic name on the broker
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delivery QoS for this topic
    pub fn qos(&self) -> QosLevel {
        self.qos
    }
}

impl fmt::Display for TopicSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, qos={}", self.name, self.qos.value())
    }
}
