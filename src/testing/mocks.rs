//! Mock implementations for testing
//!
//! Provides scripted broker factories, recording sinks, and failing
//! converters so adapter and container behavior can be exercised without a
//! live broker. Everything is deterministic and in-process.

use crate::broker::{
    BrokerClient, BrokerClientFactory, BrokerSession, InboundFrame, OutboundFrame, SessionEvent,
};
use crate::convert::{DefaultMessageConverter, MessageConverter};
use crate::error::{AdapterError, AdapterResult};
use crate::message::Message;
use crate::sink::{DownstreamSink, SinkError};
use crate::subscription::QosLevel;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Handles to one session produced by [`MockClientFactory`]
#[derive(Clone)]
pub struct MockSession {
    /// The client the container received
    pub client: Arc<MockBrokerClient>,
    /// Sender feeding the session's event stream
    pub events: mpsc::Sender<SessionEvent>,
}

#[derive(Default)]
struct FactoryState {
    fail_connects: u32,
    fail_subscribes_next: u32,
    connect_log: Vec<String>,
    sessions: Vec<MockSession>,
}

/// Scripted broker client factory.
///
/// Connect calls can be told to fail up front; successful calls produce a
/// [`MockBrokerClient`] plus an event channel the test drives directly.
#[derive(Default)]
pub struct MockClientFactory {
    state: Mutex<FactoryState>,
    disconnect_log: Arc<Mutex<Vec<String>>>,
}

impl MockClientFactory {
    /// A factory whose connects always succeed
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `count` connect calls with a connection error
    pub fn with_connect_failures(count: u32) -> Self {
        let factory = Self::default();
        factory.lock().fail_connects = count;
        factory
    }

    /// Make the next created client fail its first `count` subscribe calls
    pub fn with_subscribe_failures(count: u32) -> Self {
        let factory = Self::default();
        factory.lock().fail_subscribes_next = count;
        factory
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FactoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of connect calls observed so far
    pub fn connect_count(&self) -> u32 {
        self.lock().connect_log.len() as u32
    }

    /// Client ids passed to connect, in call order
    pub fn connect_log(&self) -> Vec<String> {
        self.lock().connect_log.clone()
    }

    /// Client ids whose connections were disconnected, in call order
    pub fn disconnect_log(&self) -> Vec<String> {
        self.disconnect_log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Handles to the most recent session, if any connect succeeded
    pub fn last_session(&self) -> Option<MockSession> {
        self.lock().sessions.last().cloned()
    }

    /// Handles to every session created so far, in connect order
    pub fn sessions(&self) -> Vec<MockSession> {
        self.lock().sessions.clone()
    }

    /// Inject a frame into the most recent session
    pub async fn push_frame(
        &self,
        topic: &str,
        payload: impl Into<Bytes>,
        qos: QosLevel,
    ) -> AdapterResult<()> {
        let session = self
            .last_session()
            .ok_or_else(|| AdapterError::illegal_state("no session has been created"))?;
        session
            .events
            .send(SessionEvent::Frame(InboundFrame {
                topic: topic.to_string(),
                payload: payload.into(),
                qos,
            }))
            .await
            .map_err(|_| AdapterError::illegal_state("session event stream is closed"))
    }

    /// Signal connection loss on the most recent session
    pub async fn drop_connection(&self, reason: &str) -> AdapterResult<()> {
        let session = self
            .last_session()
            .ok_or_else(|| AdapterError::illegal_state("no session has been created"))?;
        session
            .events
            .send(SessionEvent::Closed(reason.to_string()))
            .await
            .map_err(|_| AdapterError::illegal_state("session event stream is closed"))
    }

    /// Poll until `count` connects have happened or the timeout elapses
    pub async fn wait_for_connects(&self, count: u32, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.connect_count() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.connect_count() >= count
    }
}

#[async_trait]
impl BrokerClientFactory for MockClientFactory {
    async fn connect(&self, _broker_url: &str, client_id: &str) -> AdapterResult<BrokerSession> {
        let (client, events) = {
            let mut state = self.lock();
            state.connect_log.push(client_id.to_string());
            if state.fail_connects > 0 {
                state.fail_connects -= 1;
                return Err(AdapterError::connection(format!(
                    "mock broker refused connection for '{client_id}'"
                )));
            }

            let (tx, rx) = mpsc::channel(64);
            let client = Arc::new(MockBrokerClient {
                client_id: client_id.to_string(),
                state: Mutex::new(ClientState {
                    fail_subscribes: state.fail_subscribes_next,
                    ..ClientState::default()
                }),
                disconnect_log: Arc::clone(&self.disconnect_log),
            });
            state.fail_subscribes_next = 0;
            state.sessions.push(MockSession {
                client: Arc::clone(&client),
                events: tx,
            });
            (client, rx)
        };

        Ok(BrokerSession {
            client,
            events,
        })
    }
}

#[derive(Default)]
struct ClientState {
    fail_subscribes: u32,
    subscribe_calls: Vec<(String, QosLevel)>,
    unsubscribe_calls: Vec<String>,
    disconnected: bool,
}

/// Broker client recording every command it receives
pub struct MockBrokerClient {
    client_id: String,
    state: Mutex<ClientState>,
    disconnect_log: Arc<Mutex<Vec<String>>>,
}

impl MockBrokerClient {
    fn lock(&self) -> std::sync::MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Subscribe calls in the order they were issued
    pub fn subscribe_calls(&self) -> Vec<(String, QosLevel)> {
        self.lock().subscribe_calls.clone()
    }

    /// Unsubscribe calls in the order they were issued
    pub fn unsubscribe_calls(&self) -> Vec<String> {
        self.lock().unsubscribe_calls.clone()
    }

    /// Whether disconnect was called
    pub fn is_disconnected(&self) -> bool {
        self.lock().disconnected
    }
}

#[async_trait]
impl BrokerClient for MockBrokerClient {
    async fn subscribe(&self, topic: &str, qos: QosLevel) -> AdapterResult<()> {
        let mut state = self.lock();
        if state.fail_subscribes > 0 {
            state.fail_subscribes -= 1;
            return Err(AdapterError::connection(format!(
                "mock broker refused subscription to '{topic}'"
            )));
        }
        state.subscribe_calls.push((topic.to_string(), qos));
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> AdapterResult<()> {
        self.lock().unsubscribe_calls.push(topic.to_string());
        Ok(())
    }

    async fn disconnect(&self) -> AdapterResult<()> {
        self.lock().disconnected = true;
        self.disconnect_log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(self.client_id.clone());
        Ok(())
    }
}

/// Sink that records every accepted message
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<Message>>,
}

impl RecordingSink {
    /// An empty recording sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the accepted messages, in delivery order
    pub fn messages(&self) -> Vec<Message> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of accepted messages
    pub fn count(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Poll until `count` messages arrived or the timeout elapses
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.count() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.count() >= count
    }
}

#[async_trait]
impl DownstreamSink for RecordingSink {
    async fn accept(&self, message: Message) -> Result<(), SinkError> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message);
        Ok(())
    }
}

/// Sink that rejects everything with a fixed reason
pub struct RejectingSink {
    reason: String,
}

impl RejectingSink {
    /// Reject every message with `reason`
    pub fn new<S: Into<String>>(reason: S) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl DownstreamSink for RejectingSink {
    async fn accept(&self, _message: Message) -> Result<(), SinkError> {
        Err(SinkError::Rejected(self.reason.clone()))
    }
}

/// Sink whose accept never completes; pair it with a send timeout
pub struct StallingSink;

#[async_trait]
impl DownstreamSink for StallingSink {
    async fn accept(&self, _message: Message) -> Result<(), SinkError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Converter that fails for payloads equal to the configured marker and
/// otherwise behaves like [`DefaultMessageConverter`]
pub struct FailingConverter {
    marker: Bytes,
}

impl FailingConverter {
    /// Fail conversion whenever the payload equals `marker`
    pub fn failing_on(marker: impl Into<Bytes>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl MessageConverter for FailingConverter {
    fn to_internal(&self, frame: &InboundFrame) -> AdapterResult<Message> {
        if frame.payload == self.marker {
            return Err(AdapterError::conversion(format!(
                "marker payload on '{}'",
                frame.topic
            )));
        }
        DefaultMessageConverter.to_internal(frame)
    }

    fn from_internal(&self, message: &Message) -> AdapterResult<OutboundFrame> {
        DefaultMessageConverter.from_internal(message)
    }
}
