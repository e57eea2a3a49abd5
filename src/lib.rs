//! Broker-agnostic inbound channel adapter
//!
//! Subscribes to topics on a message broker, converts incoming broker
//! messages into an internal envelope, and forwards them to a downstream
//! sink, with supervised reconnection, per-message error routing, and
//! phase-ordered lifecycle across sibling adapters.
//!
//! # Overview
//!
//! This crate provides:
//! - Topic subscriptions with validated QoS levels
//! - A listener container owning one broker session, with unbounded
//!   fixed-interval recovery until explicitly stopped
//! - Message conversion between broker frames and the internal envelope
//! - An inbound channel adapter applying send timeouts and error-sink
//!   routing, built through a fluent builder
//! - Broker client contracts as the seam for real broker integrations
//!
//! No wire protocol lives here; a broker integration supplies a
//! [`broker::BrokerClientFactory`].
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use inflow::testing::mocks::{MockClientFactory, RecordingSink};
//! use inflow::{AdapterBuilder, QosLevel, TopicSubscription};
//!
//! # fn main() -> inflow::AdapterResult<()> {
//! let factory = Arc::new(MockClientFactory::new());
//! let sink = Arc::new(RecordingSink::new());
//!
//! let adapter = AdapterBuilder::new()
//!     .client_id("sensor-feed")
//!     .broker_url("tcp://localhost:1883")
//!     .topic(TopicSubscription::new("sensors/temperature", QosLevel::AtLeastOnce)?)
//!     .client_factory(factory)
//!     .sink(sink)
//!     .build()?;
//!
//! assert_eq!(adapter.topics().len(), 1);
//! assert_eq!(adapter.topics()[0].to_string(), "sensors/temperature, qos=1");
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod broker;
pub mod config;
pub mod container;
pub mod convert;
pub mod error;
pub mod message;
pub mod observability;
pub mod sink;
pub mod subscription;
pub mod testing;

pub use adapter::{AdapterBuilder, AdapterGroup, FaultKind, InboundChannelAdapter};
pub use config::{AdapterConfig, ConfigError};
pub use container::{ContainerConfig, ContainerState, FrameHandler, ListenerContainer};
pub use convert::{DefaultMessageConverter, JsonMessageConverter, MessageConverter};
pub use error::{AdapterError, AdapterResult};
pub use message::Message;
pub use sink::{ChannelSink, DownstreamSink, SinkError};
pub use subscription::{QosLevel, TopicSubscription};
