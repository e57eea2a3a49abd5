//! Broker client contracts consumed by the adapter core
//!
//! No wire protocol lives in this crate. A broker integration supplies a
//! [`BrokerClientFactory`]; each successful connect hands back a
//! [`BrokerSession`] pairing a command handle with an event stream, the same
//! client/event-loop split the common broker client libraries expose. Retry
//! and backoff are the listener container's responsibility, never the
//! factory's.

use crate::error::{AdapterError, AdapterResult};
use crate::subscription::QosLevel;
use async_trait::async_trait;
use bytes::Bytes;
use once_cell::sync::Lazy;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

/// A broker message as received on the wire, before conversion
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    /// Topic the frame was published on
    pub topic: String,
    /// Raw payload bytes
    pub payload: Bytes,
    /// QoS the frame was delivered with
    pub qos: QosLevel,
}

/// A broker message ready to hand to an outbound client
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundFrame {
    /// Destination topic
    pub topic: String,
    /// Raw payload bytes
    pub payload: Bytes,
    /// QoS to publish with
    pub qos: QosLevel,
}

/// Events emitted by an open broker session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A message arrived on a subscribed topic
    Frame(InboundFrame),
    /// The connection was lost with the given reason; a closed event
    /// channel is treated the same way
    Closed(String),
}

/// Command side of an open broker connection.
///
/// Implementations are internally synchronized; all methods take `&self` so
/// the handle can be shared between the container supervisor and live
/// subscription updates.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Subscribe to a topic at the given QoS
    async fn subscribe(&self, topic: &str, qos: QosLevel) -> AdapterResult<()>;

    /// Remove a subscription
    async fn unsubscribe(&self, topic: &str) -> AdapterResult<()>;

    /// Close the connection; the session's event stream ends afterwards
    async fn disconnect(&self) -> AdapterResult<()>;
}

/// An open session: the command handle plus the inbound event stream
pub struct BrokerSession {
    /// Shared command handle
    pub client: Arc<dyn BrokerClient>,
    /// Inbound events, in broker receive order
    pub events: mpsc::Receiver<SessionEvent>,
}

/// Produces connections to a broker
#[async_trait]
pub trait BrokerClientFactory: Send + Sync {
    /// Open a connection. Client id collisions and unreachable brokers
    /// surface here as connection errors; the container retries them.
    async fn connect(&self, broker_url: &str, client_id: &str) -> AdapterResult<BrokerSession>;
}

static DEFAULT_FACTORY: Lazy<RwLock<Option<Arc<dyn BrokerClientFactory>>>> =
    Lazy::new(|| RwLock::new(None));

/// Install the process-wide default client factory.
///
/// Adapters built without an explicit factory share this instance. Install
/// once during application startup; installing again without
/// [`clear_default_factory`] in between is an error.
pub fn install_default_factory(factory: Arc<dyn BrokerClientFactory>) -> AdapterResult<()> {
    let mut slot = DEFAULT_FACTORY
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if slot.is_some() {
        return Err(AdapterError::illegal_state(
            "default client factory is already installed",
        ));
    }
    *slot = Some(factory);
    Ok(())
}

/// The process-wide default client factory, if one is installed
pub fn default_factory() -> Option<Arc<dyn BrokerClientFactory>> {
    DEFAULT_FACTORY
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Remove the process-wide default client factory
pub fn clear_default_factory() {
    *DEFAULT_FACTORY
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
}
