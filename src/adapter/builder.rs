//! Fluent construction of inbound channel adapters
//!
//! The builder accumulates optional settings over validated defaults and
//! assembles the container, converter, and sinks into an adapter. `build`
//! consumes the builder, so a builder cannot be reused; all wiring mistakes
//! surface as configuration errors rather than panics.

use crate::adapter::inbound::InboundChannelAdapter;
use crate::broker::{self, BrokerClientFactory};
use crate::config::AdapterConfig;
use crate::container::{ContainerConfig, ListenerContainer};
use crate::convert::{DefaultMessageConverter, MessageConverter};
use crate::error::{AdapterError, AdapterResult};
use crate::sink::DownstreamSink;
use crate::subscription::{QosLevel, TopicSubscription};
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`InboundChannelAdapter`]
pub struct AdapterBuilder {
    client_id: Option<String>,
    broker_url: Option<String>,
    topics: Vec<TopicSubscription>,
    converter: Option<Arc<dyn MessageConverter>>,
    sink: Option<Arc<dyn DownstreamSink>>,
    error_sink: Option<Arc<dyn DownstreamSink>>,
    send_timeout: Option<Duration>,
    recovery_interval: Duration,
    auto_startup: bool,
    phase: i32,
    factory: Option<Arc<dyn BrokerClientFactory>>,
    container: Option<Arc<ListenerContainer>>,
}

impl AdapterBuilder {
    /// A builder with the defaults: auto startup, phase 0, 5s recovery
    /// interval, no send timeout (block indefinitely).
    pub fn new() -> Self {
        Self {
            client_id: None,
            broker_url: None,
            topics: Vec::new(),
            converter: None,
            sink: None,
            error_sink: None,
            send_timeout: None,
            recovery_interval: Duration::from_millis(5000),
            auto_startup: true,
            phase: 0,
            factory: None,
            container: None,
        }
    }

    /// Seed the builder from a loaded [`AdapterConfig`]
    pub fn from_config(config: &AdapterConfig) -> Self {
        let mut builder = Self::new()
            .client_id(&config.client_id)
            .broker_url(&config.broker_url)
            .auto_startup(config.auto_startup)
            .phase(config.phase)
            .recovery_interval(config.recovery_interval());
        if let Some(timeout) = config.send_timeout() {
            builder = builder.send_timeout(timeout);
        }
        builder
    }

    /// Client identifier presented to the broker
    pub fn client_id<S: Into<String>>(mut self, client_id: S) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Broker URL with scheme, e.g. `tcp://localhost:1883`
    pub fn broker_url<S: Into<String>>(mut self, broker_url: S) -> Self {
        self.broker_url = Some(broker_url.into());
        self
    }

    /// Append one subscription; order of calls is subscribe order
    pub fn topic(mut self, subscription: TopicSubscription) -> Self {
        self.topics.push(subscription);
        self
    }

    /// Append subscriptions, keeping their order
    pub fn topics<I>(mut self, subscriptions: I) -> Self
    where
        I: IntoIterator<Item = TopicSubscription>,
    {
        self.topics.extend(subscriptions);
        self
    }

    /// Subscribe every named topic at the same QoS level
    pub fn topics_with_qos<I, S>(mut self, names: I, qos: QosLevel) -> AdapterResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.topics.push(TopicSubscription::new(name, qos)?);
        }
        Ok(self)
    }

    /// Converter between broker frames and the internal envelope;
    /// defaults to [`DefaultMessageConverter`]
    pub fn converter(mut self, converter: Arc<dyn MessageConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Downstream sink for converted messages (required)
    pub fn sink(mut self, sink: Arc<dyn DownstreamSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Sink for wrapped per-message faults; without one, faults are
    /// counted and logged
    pub fn error_sink(mut self, error_sink: Arc<dyn DownstreamSink>) -> Self {
        self.error_sink = Some(error_sink);
        self
    }

    /// Upper bound on blocking sink delivery; zero means no wait
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Delay between broker session recovery attempts
    pub fn recovery_interval(mut self, interval: Duration) -> Self {
        self.recovery_interval = interval;
        self
    }

    /// Whether a group start should start this adapter
    pub fn auto_startup(mut self, auto_startup: bool) -> Self {
        self.auto_startup = auto_startup;
        self
    }

    /// Relative start order; lower phases start first and stop last
    pub fn phase(mut self, phase: i32) -> Self {
        self.phase = phase;
        self
    }

    /// Broker client factory; without one the process-wide default
    /// factory is used
    pub fn client_factory(mut self, factory: Arc<dyn BrokerClientFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Use a pre-built shared container instead of building one. The
    /// adapter will not own it: stopping the adapter only deregisters its
    /// callback.
    pub fn container(mut self, container: Arc<ListenerContainer>) -> Self {
        self.container = Some(container);
        self
    }

    /// Assemble the adapter. Consumes the builder; a builder is single-use.
    pub fn build(self) -> AdapterResult<InboundChannelAdapter> {
        let sink = self
            .sink
            .ok_or_else(|| AdapterError::configuration("a downstream sink is required"))?;
        let converter = self
            .converter
            .unwrap_or_else(|| Arc::new(DefaultMessageConverter));

        let (container, owns_container, client_id) = match self.container {
            Some(container) => {
                if !self.topics.is_empty() {
                    return Err(AdapterError::configuration(
                        "topics belong to the container; a pre-built container brings its own",
                    ));
                }
                if !container.is_shared() {
                    return Err(AdapterError::configuration(
                        "a pre-built container must be marked shared",
                    ));
                }
                // adapters on a shared container need distinct ids for their
                // callback registrations
                let client_id = self
                    .client_id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| container.client_id().to_string());
                (container, false, client_id)
            }
            None => {
                let client_id = self
                    .client_id
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| {
                        AdapterError::configuration(
                            "client id is required when no container is supplied",
                        )
                    })?;
                let broker_url = self
                    .broker_url
                    .filter(|url| !url.is_empty())
                    .ok_or_else(|| {
                        AdapterError::configuration(
                            "broker url is required when no container is supplied",
                        )
                    })?;
                let factory = self
                    .factory
                    .or_else(broker::default_factory)
                    .ok_or_else(|| {
                        AdapterError::configuration(
                            "no client factory supplied and no default factory installed",
                        )
                    })?;

                let container_config = ContainerConfig::new(client_id.clone(), broker_url)
                    .with_recovery_interval(self.recovery_interval);
                let container =
                    ListenerContainer::new(container_config, self.topics, factory)?;
                (Arc::new(container), true, client_id)
            }
        };

        let config = AdapterConfig {
            client_id,
            broker_url: container.broker_url().to_string(),
            auto_startup: self.auto_startup,
            phase: self.phase,
            send_timeout_ms: self.send_timeout.map(|d| d.as_millis() as u64),
            recovery_interval_ms: container.recovery_interval().as_millis() as u64,
        };

        Ok(InboundChannelAdapter::new(
            config,
            container,
            owns_container,
            converter,
            sink,
            self.error_sink,
        ))
    }
}

impl Default for AdapterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
