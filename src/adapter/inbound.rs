//! Inbound channel adapter: container, converter, and sink wiring
//!
//! The adapter binds a listener container to a message converter and a
//! downstream sink. Its delivery callback converts each inbound frame,
//! hands the envelope to the sink under the configured send timeout, and
//! routes per-message failures to the error sink or the fault counter.
//! Nothing that happens to a single message ever stops the container.

use crate::broker::{BrokerClientFactory, InboundFrame};
use crate::config::AdapterConfig;
use crate::container::{FrameHandler, ListenerContainer};
use crate::convert::MessageConverter;
use crate::error::{AdapterError, AdapterResult};
use crate::message::{headers, Message};
use crate::sink::DownstreamSink;
use crate::subscription::TopicSubscription;
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Classification of a per-message failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The converter refused the payload
    Conversion,
    /// Sink delivery exceeded the send timeout
    DeliveryTimeout,
    /// The sink refused the message
    DeliveryRejected,
}

impl FaultKind {
    /// Stable string form used in fault message headers
    pub fn as_str(self) -> &'static str {
        match self {
            FaultKind::Conversion => "conversion",
            FaultKind::DeliveryTimeout => "delivery-timeout",
            FaultKind::DeliveryRejected => "delivery-rejected",
        }
    }

    fn for_error(error: &AdapterError) -> Self {
        match error {
            AdapterError::Conversion { .. } => FaultKind::Conversion,
            AdapterError::DeliveryTimeout { .. } => FaultKind::DeliveryTimeout,
            _ => FaultKind::DeliveryRejected,
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The adapter's delivery callback, registered on the container under the
/// adapter's client id.
struct Delivery {
    converter: Arc<dyn MessageConverter>,
    sink: Arc<dyn DownstreamSink>,
    error_sink: Option<Arc<dyn DownstreamSink>>,
    send_timeout: Option<Duration>,
    dropped: AtomicU64,
}

impl Delivery {
    /// Hand a message to a sink, bounded by the send timeout when one is
    /// configured. A zero timeout means no wait.
    async fn accept_bounded(
        &self,
        sink: &dyn DownstreamSink,
        message: Message,
    ) -> AdapterResult<()> {
        match self.send_timeout {
            None => sink
                .accept(message)
                .await
                .map_err(|err| AdapterError::delivery_rejected(err.to_string())),
            Some(limit) => match tokio::time::timeout(limit, sink.accept(message)).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => Err(AdapterError::delivery_rejected(err.to_string())),
                Err(_) => Err(AdapterError::DeliveryTimeout {
                    timeout_ms: limit.as_millis() as u64,
                }),
            },
        }
    }

    /// Route a failed message to the error sink, or count it as dropped.
    async fn route_fault(&self, frame: &InboundFrame, error: &AdapterError) {
        let kind = FaultKind::for_error(error);
        warn!(
            topic = %frame.topic,
            kind = %kind,
            reason = %error,
            "inbound message faulted"
        );

        let Some(error_sink) = &self.error_sink else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let fault = Message::new(frame.payload.clone())
            .with_standard_headers()
            .with_header(headers::TOPIC, frame.topic.as_str())
            .with_header(headers::QOS, u64::from(frame.qos.value()))
            .with_header(headers::FAULT_KIND, kind.as_str())
            .with_header(headers::FAULT_REASON, error.to_string());

        if let Err(fault_error) = self.accept_bounded(error_sink.as_ref(), fault).await {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            error!(
                topic = %frame.topic,
                error = %fault_error,
                "error sink refused fault message, message dropped"
            );
        }
    }
}

#[async_trait]
impl FrameHandler for Delivery {
    async fn on_frame(&self, frame: InboundFrame) {
        let message = match self.converter.to_internal(&frame) {
            Ok(message) => message,
            Err(err) => {
                self.route_fault(&frame, &err).await;
                return;
            }
        };

        if let Err(err) = self.accept_bounded(self.sink.as_ref(), message).await {
            self.route_fault(&frame, &err).await;
        }
    }
}

/// Forwards converted broker messages from one listener container to a
/// downstream sink.
///
/// Built through [`crate::adapter::AdapterBuilder`]. Whether the adapter
/// owns its container (and therefore stops it) is fixed at build time: a
/// container built internally is owned exclusively, a pre-built shared
/// container is not.
pub struct InboundChannelAdapter {
    config: AdapterConfig,
    container: Arc<ListenerContainer>,
    owns_container: bool,
    delivery: Arc<Delivery>,
    started: AtomicBool,
}

impl InboundChannelAdapter {
    pub(crate) fn new(
        config: AdapterConfig,
        container: Arc<ListenerContainer>,
        owns_container: bool,
        converter: Arc<dyn MessageConverter>,
        sink: Arc<dyn DownstreamSink>,
        error_sink: Option<Arc<dyn DownstreamSink>>,
    ) -> Self {
        let delivery = Arc::new(Delivery {
            converter,
            sink,
            error_sink,
            send_timeout: config.send_timeout(),
            dropped: AtomicU64::new(0),
        });
        Self {
            config,
            container,
            owns_container,
            delivery,
            started: AtomicBool::new(false),
        }
    }

    /// Register the delivery callback and start the container unless some
    /// other owner already did. Idempotent while started.
    pub async fn start(&self) -> AdapterResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(err) = self
            .container
            .register_handler(&self.config.client_id, self.delivery.clone())
            .await
        {
            self.started.store(false, Ordering::SeqCst);
            return Err(err);
        }
        match self.container.start().await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.started.store(false, Ordering::SeqCst);
                self.container
                    .deregister_handler(&self.config.client_id)
                    .await;
                Err(err)
            }
        }
    }

    /// Deregister the delivery callback; stops the container only when this
    /// adapter owns it exclusively. A non-owning stop leaves a shared
    /// container running for its other adapters.
    pub async fn stop(&self) -> AdapterResult<()> {
        if !self.started.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.container
            .deregister_handler(&self.config.client_id)
            .await;
        if self.owns_container {
            self.container.stop().await?;
        }
        Ok(())
    }

    /// Whether `start` has been called without a matching `stop`
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Subscriptions of the underlying container, in subscribe order
    pub fn topics(&self) -> Vec<TopicSubscription> {
        self.container.subscriptions()
    }

    /// Upper bound on blocking sink delivery, if any
    pub fn send_timeout(&self) -> Option<Duration> {
        self.config.send_timeout()
    }

    /// Whether a group start should start this adapter
    pub fn auto_startup(&self) -> bool {
        self.config.auto_startup
    }

    /// Relative start order; lower phases start first and stop last
    pub fn phase(&self) -> i32 {
        self.config.phase
    }

    /// Client identifier presented to the broker
    pub fn client_id(&self) -> &str {
        &self.config.client_id
    }

    /// Broker URL of the underlying container
    pub fn broker_url(&self) -> &str {
        self.container.broker_url()
    }

    /// The adapter settings fixed at build time
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// The underlying container
    pub fn container(&self) -> &Arc<ListenerContainer> {
        &self.container
    }

    /// Whether this adapter exclusively owns its container
    pub fn owns_container(&self) -> bool {
        self.owns_container
    }

    /// The factory the container connects through
    pub fn client_factory(&self) -> Arc<dyn BrokerClientFactory> {
        self.container.client_factory()
    }

    /// Messages dropped because no error sink was configured or the error
    /// sink refused them
    pub fn fault_count(&self) -> u64 {
        self.delivery.dropped.load(Ordering::Relaxed)
    }
}
