//! Listener container: owns the broker session and subscription lifecycle
//!
//! One supervisor task per container drives the session: connect through the
//! client factory, subscribe each topic in listed order, dispatch inbound
//! frames to the registered handlers, and recover lost sessions on a fixed
//! interval until stopped. Dispatch and teardown are serialized on the
//! supervisor task, so once `stop` returns no handler runs again.

use crate::broker::{BrokerClient, BrokerClientFactory, BrokerSession, InboundFrame, SessionEvent};
use crate::container::state::{ContainerState, Recovery, RecoveryDecision};
use crate::error::{AdapterError, AdapterResult};
use crate::subscription::TopicSubscription;
use async_trait::async_trait;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

/// Callback invoked on the container's delivery task for each inbound frame
#[async_trait]
pub trait FrameHandler: Send + Sync {
    /// Handle one frame. Must not panic; per-message failures are the
    /// handler's to contain.
    async fn on_frame(&self, frame: InboundFrame);
}

/// Construction settings for a [`ListenerContainer`]
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Client identifier presented to the broker
    pub client_id: String,
    /// Broker URL with scheme, e.g. `tcp://localhost:1883`
    pub broker_url: String,
    /// Delay between session recovery attempts
    pub recovery_interval: Duration,
    /// Shared containers accept one handler per adapter and are never
    /// stopped by a non-owning adapter
    pub shared: bool,
}

impl ContainerConfig {
    /// Settings with the default recovery interval, exclusive ownership
    pub fn new<C: Into<String>, U: Into<String>>(client_id: C, broker_url: U) -> Self {
        Self {
            client_id: client_id.into(),
            broker_url: broker_url.into(),
            recovery_interval: Duration::from_millis(5000),
            shared: false,
        }
    }

    /// Override the recovery interval
    pub fn with_recovery_interval(mut self, interval: Duration) -> Self {
        self.recovery_interval = interval;
        self
    }

    /// Mark the container as shareable between adapters
    pub fn with_shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    pub(crate) fn validate(&self) -> AdapterResult<()> {
        if self.client_id.is_empty() {
            return Err(AdapterError::configuration("client id must not be empty"));
        }
        if self.broker_url.is_empty() {
            return Err(AdapterError::configuration("broker url must not be empty"));
        }
        if Url::parse(&self.broker_url).is_err() {
            return Err(AdapterError::configuration(format!(
                "broker url '{}' is not a valid url",
                self.broker_url
            )));
        }
        if self.recovery_interval.is_zero() {
            return Err(AdapterError::configuration(
                "recovery interval must be greater than zero",
            ));
        }
        Ok(())
    }
}

type HandlerRegistry = Arc<RwLock<Vec<(String, Arc<dyn FrameHandler>)>>>;
type SubscriptionList = Arc<StdMutex<Vec<TopicSubscription>>>;

/// Owns one broker session and its subscriptions.
///
/// State machine: `Created → Starting → Running → Stopping → Stopped`, with
/// `Recovering` entered from `Starting`/`Running` on session loss and
/// returning to `Starting`. Stopping is explicit and terminal; session loss
/// alone always recovers.
pub struct ListenerContainer {
    config: ContainerConfig,
    factory: Arc<dyn BrokerClientFactory>,
    subscriptions: SubscriptionList,
    handlers: HandlerRegistry,
    state_tx: watch::Sender<ContainerState>,
    shutdown_tx: watch::Sender<bool>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    live_client: Arc<Mutex<Option<Arc<dyn BrokerClient>>>>,
}

impl ListenerContainer {
    /// Validate the settings and create a container in the `Created` state.
    ///
    /// The subscription sequence keeps its order; it determines subscribe
    /// order on the broker. An empty sequence is valid; the container
    /// connects and idles.
    pub fn new(
        config: ContainerConfig,
        subscriptions: Vec<TopicSubscription>,
        factory: Arc<dyn BrokerClientFactory>,
    ) -> AdapterResult<Self> {
        config.validate()?;
        let (state_tx, _) = watch::channel(ContainerState::Created);
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            config,
            factory,
            subscriptions: Arc::new(StdMutex::new(subscriptions)),
            handlers: Arc::new(RwLock::new(Vec::new())),
            state_tx,
            shutdown_tx,
            supervisor: Mutex::new(None),
            live_client: Arc::new(Mutex::new(None)),
        })
    }

    /// Client identifier presented to the broker
    pub fn client_id(&self) -> &str {
        &self.config.client_id
    }

    /// Broker URL this container connects to
    pub fn broker_url(&self) -> &str {
        &self.config.broker_url
    }

    /// Delay between session recovery attempts
    pub fn recovery_interval(&self) -> Duration {
        self.config.recovery_interval
    }

    /// Whether this container may be shared between adapters
    pub fn is_shared(&self) -> bool {
        self.config.shared
    }

    /// The factory this container connects through
    pub fn client_factory(&self) -> Arc<dyn BrokerClientFactory> {
        Arc::clone(&self.factory)
    }

    /// Current lifecycle state
    pub fn state(&self) -> ContainerState {
        self.state_tx.borrow().clone()
    }

    /// Snapshot of the subscription sequence, in subscribe order
    pub fn subscriptions(&self) -> Vec<TopicSubscription> {
        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of registered handlers
    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }

    /// Register `handler` under `name`.
    ///
    /// Exclusive containers hold a single handler and allow replacing it
    /// only before `start`. Shared containers accept one handler per name;
    /// a name can only be re-registered before `start`.
    pub async fn register_handler(
        &self,
        name: &str,
        handler: Arc<dyn FrameHandler>,
    ) -> AdapterResult<()> {
        let started = !matches!(self.state(), ContainerState::Created);
        let mut handlers = self.handlers.write().await;

        if let Some(slot) = handlers.iter_mut().find(|entry| entry.0 == name) {
            if started {
                return Err(AdapterError::illegal_state(format!(
                    "handler '{name}' cannot be replaced after start"
                )));
            }
            slot.1 = handler;
            return Ok(());
        }

        if !self.config.shared && !handlers.is_empty() {
            if started {
                return Err(AdapterError::illegal_state(
                    "exclusive container already has a handler",
                ));
            }
            handlers.clear();
        }

        handlers.push((name.to_string(), handler));
        Ok(())
    }

    /// Remove the handler registered under `name`.
    ///
    /// Synchronizes with dispatch: an in-flight invocation of any handler
    /// completes before this returns.
    pub async fn deregister_handler(&self, name: &str) {
        let mut handlers = self.handlers.write().await;
        handlers.retain(|(n, _)| n.as_str() != name);
    }

    /// Start the container and block until it is `Running`.
    ///
    /// Idempotent while starting or running. Connect and subscribe failures
    /// are retried on the recovery interval, unbounded, until `stop` is
    /// called; a concurrent `stop` unblocks this call with an error.
    pub async fn start(&self) -> AdapterResult<()> {
        {
            let mut supervisor = self.supervisor.lock().await;
            match self.state() {
                ContainerState::Stopping | ContainerState::Stopped => {
                    return Err(AdapterError::illegal_state("container is stopped"));
                }
                ContainerState::Created => {
                    transition(&self.state_tx, ContainerState::Starting);
                    let worker = SessionWorker {
                        config: self.config.clone(),
                        factory: Arc::clone(&self.factory),
                        subscriptions: Arc::clone(&self.subscriptions),
                        handlers: Arc::clone(&self.handlers),
                        state: self.state_tx.clone(),
                        live_client: Arc::clone(&self.live_client),
                        shutdown: self.shutdown_tx.subscribe(),
                    };
                    *supervisor = Some(tokio::spawn(worker.run()));
                }
                // Starting | Running | Recovering: supervisor already up
                _ => {}
            }
        }
        self.await_running().await
    }

    async fn await_running(&self) -> AdapterResult<()> {
        let mut state_rx = self.state_tx.subscribe();
        loop {
            let state = state_rx.borrow_and_update().clone();
            match state {
                ContainerState::Running => return Ok(()),
                ContainerState::Stopped => {
                    return Err(AdapterError::illegal_state(
                        "container stopped before reaching running",
                    ));
                }
                _ => {}
            }
            if state_rx.changed().await.is_err() {
                return Err(AdapterError::illegal_state("container state channel closed"));
            }
        }
    }

    /// Stop the container: unsubscribe, close the session, and wait for the
    /// supervisor task. No handler runs after this returns. Terminal; safe
    /// to call from any task and idempotent once stopped.
    pub async fn stop(&self) -> AdapterResult<()> {
        let mut supervisor = self.supervisor.lock().await;
        if self.state().is_terminal() && supervisor.is_none() {
            return Ok(());
        }

        transition(&self.state_tx, ContainerState::Stopping);
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = supervisor.take() {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    error!(error = %err, "container supervisor ended abnormally");
                }
            }
        }
        transition(&self.state_tx, ContainerState::Stopped);
        Ok(())
    }

    /// Add a subscription.
    ///
    /// On a running container the topic is subscribed on the live session
    /// immediately; recovery re-subscribes it along with the rest.
    pub async fn add_subscription(&self, subscription: TopicSubscription) -> AdapterResult<()> {
        if self.state().is_terminal() {
            return Err(AdapterError::illegal_state("container is stopped"));
        }
        {
            let mut subscriptions = self
                .subscriptions
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if subscriptions
                .iter()
                .any(|existing| existing.name() == subscription.name())
            {
                return Err(AdapterError::invalid_subscription(format!(
                    "topic '{}' is already subscribed",
                    subscription.name()
                )));
            }
            subscriptions.push(subscription.clone());
        }

        let client = self.live_client.lock().await.clone();
        if let Some(client) = client {
            client
                .subscribe(subscription.name(), subscription.qos())
                .await?;
            debug!(subscription = %subscription, "subscribed on live session");
        }
        Ok(())
    }

    /// Remove a subscription by topic name, unsubscribing on the live
    /// session when there is one.
    pub async fn remove_subscription(&self, name: &str) -> AdapterResult<()> {
        let removed = {
            let mut subscriptions = self
                .subscriptions
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let before = subscriptions.len();
            subscriptions.retain(|existing| existing.name() != name);
            subscriptions.len() != before
        };
        if !removed {
            return Err(AdapterError::invalid_subscription(format!(
                "topic '{name}' is not subscribed"
            )));
        }

        let client = self.live_client.lock().await.clone();
        if let Some(client) = client {
            client.unsubscribe(name).await?;
            debug!(topic = name, "unsubscribed on live session");
        }
        Ok(())
    }
}

/// Moves a state channel forward, refusing transitions out of the terminal
/// state and out of `Stopping` except into `Stopped`. The guard and the
/// update are atomic so a concurrent stop cannot be overwritten.
fn transition(state_tx: &watch::Sender<ContainerState>, next: ContainerState) {
    state_tx.send_if_modified(|current| {
        if *current == next || current.is_terminal() {
            return false;
        }
        if *current == ContainerState::Stopping && next != ContainerState::Stopped {
            return false;
        }
        Recovery::log_transition(current, &next);
        *current = next;
        true
    });
}

/// The supervisor task body: everything it needs is cloned in so the task
/// owns its world and the container can be dropped independently.
struct SessionWorker {
    config: ContainerConfig,
    factory: Arc<dyn BrokerClientFactory>,
    subscriptions: SubscriptionList,
    handlers: HandlerRegistry,
    state: watch::Sender<ContainerState>,
    live_client: Arc<Mutex<Option<Arc<dyn BrokerClient>>>>,
    shutdown: watch::Receiver<bool>,
}

impl SessionWorker {
    async fn run(self) {
        info!(client_id = %self.config.client_id, "listener container supervisor started");
        let mut shutdown = self.shutdown.clone();
        let mut attempt = 0u32;

        loop {
            if *shutdown.borrow() {
                break;
            }
            transition(&self.state, ContainerState::Starting);

            let session = match self
                .factory
                .connect(&self.config.broker_url, &self.config.client_id)
                .await
            {
                Ok(session) => session,
                Err(err) => {
                    warn!(
                        error = %err,
                        broker_url = %self.config.broker_url,
                        "broker connection failed"
                    );
                    if !self.recover(&mut attempt, &mut shutdown).await {
                        break;
                    }
                    continue;
                }
            };
            let BrokerSession { client, mut events } = session;

            if let Err(err) = self.subscribe_in_order(client.as_ref()).await {
                warn!(error = %err, "subscribe failed, recycling session");
                let _ = client.disconnect().await;
                if !self.recover(&mut attempt, &mut shutdown).await {
                    break;
                }
                continue;
            }

            attempt = 0;
            *self.live_client.lock().await = Some(Arc::clone(&client));
            transition(&self.state, ContainerState::Running);

            let lost = self.dispatch_until_lost(&mut events, &mut shutdown).await;
            *self.live_client.lock().await = None;

            if !lost {
                self.teardown(client.as_ref()).await;
                break;
            }
            if !self.recover(&mut attempt, &mut shutdown).await {
                break;
            }
        }

        transition(&self.state, ContainerState::Stopped);
        info!(client_id = %self.config.client_id, "listener container supervisor stopped");
    }

    async fn subscribe_in_order(&self, client: &dyn BrokerClient) -> AdapterResult<()> {
        let subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for subscription in &subscriptions {
            client
                .subscribe(subscription.name(), subscription.qos())
                .await?;
            debug!(subscription = %subscription, "subscribed");
        }
        Ok(())
    }

    /// Dispatch frames until the session is lost (returns true) or shutdown
    /// is requested (returns false).
    async fn dispatch_until_lost(
        &self,
        events: &mut mpsc::Receiver<SessionEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return false;
                    }
                }
                event = events.recv() => match event {
                    Some(SessionEvent::Frame(frame)) => self.dispatch(frame).await,
                    Some(SessionEvent::Closed(reason)) => {
                        warn!(reason = %reason, "broker session closed");
                        return true;
                    }
                    None => {
                        warn!("broker event stream ended");
                        return true;
                    }
                }
            }
        }
    }

    async fn dispatch(&self, frame: InboundFrame) {
        let handlers = self.handlers.read().await;
        match handlers.as_slice() {
            [] => debug!(topic = %frame.topic, "frame received with no registered handler"),
            [(_, handler)] => handler.on_frame(frame).await,
            many => {
                for (_, handler) in many {
                    handler.on_frame(frame.clone()).await;
                }
            }
        }
    }

    /// Interruptible wait before the next connect attempt. Returns false
    /// when shutdown cuts the wait short.
    async fn recover(&self, attempt: &mut u32, shutdown: &mut watch::Receiver<bool>) -> bool {
        let is_shutdown = *shutdown.borrow();
        match Recovery::next_attempt(*attempt, self.config.recovery_interval, is_shutdown) {
            RecoveryDecision::Abort => false,
            RecoveryDecision::Retry {
                attempt: next,
                delay,
            } => {
                *attempt = next;
                transition(&self.state, ContainerState::Recovering(next));
                tokio::select! {
                    changed = shutdown.changed() => changed.is_ok() && !*shutdown.borrow(),
                    _ = tokio::time::sleep(delay) => true,
                }
            }
        }
    }

    async fn teardown(&self, client: &dyn BrokerClient) {
        transition(&self.state, ContainerState::Stopping);
        let subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for subscription in &subscriptions {
            if let Err(err) = client.unsubscribe(subscription.name()).await {
                warn!(
                    error = %err,
                    topic = subscription.name(),
                    "unsubscribe failed during shutdown"
                );
            }
        }
        if let Err(err) = client.disconnect().await {
            warn!(error = %err, "disconnect failed during shutdown");
        }
    }
}
