//! Live payment status channel with bounded reconnect and fallback.
//!
//! [`PaymentStatusChannel`] owns at most one connection per open session.
//! Opening schedules a connection after `connect_delay`; abnormal closes are
//! retried after `reconnect_backoff` until `max_reconnect_attempts` is
//! reached, at which point the session switches to a [`SimulatedChannel`]
//! and stays there until [`PaymentStatusChannel::reconnect`].
//!
//! # Lifecycle
//!
//! ```text
//! Idle -> Connecting -> Connected -> Disconnected(reason)
//!            ^                              |
//!            +------ backoff (abnormal) ----+--> Fallback (budget spent)
//! ```
//!
//! # Thread Safety
//!
//! All methods take `&self`. Handlers run on the session task while the
//! delivery gate is held; [`close`](PaymentStatusChannel::close) swaps the
//! gate epoch, so no handler starts after it returns. Handlers may call
//! `close` or `reconnect` on their own channel.
//!
//! [`SimulatedChannel`]: crate::transport::SimulatedChannel

mod session;

use crate::config::ChannelConfig;
use crate::gate::DeliveryGate;
use crate::metrics::StatusMetrics;
use crate::order::PaymentIdentifier;
use crate::status::RawStatusEvent;
use crate::transport::StatusConnector;
use crate::{Result, StatusError};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Callback receiving decoded status events.
pub type EventHandler = Arc<dyn Fn(RawStatusEvent) + Send + Sync>;

/// Callback receiving connection state changes.
pub type StateHandler = Arc<dyn Fn(ChannelConnectionState) + Send + Sync>;

/// The single downstream consumer of a channel session.
#[derive(Clone)]
pub struct ChannelHandlers {
    /// Receives each decoded event, in arrival order.
    pub on_event: EventHandler,
    /// Receives connection state after every transition.
    pub on_state: Option<StateHandler>,
}

impl ChannelHandlers {
    /// Handlers with only an event callback.
    pub fn new(on_event: impl Fn(RawStatusEvent) + Send + Sync + 'static) -> Self {
        Self {
            on_event: Arc::new(on_event),
            on_state: None,
        }
    }

    /// Add a connection state callback.
    pub fn with_state(
        mut self,
        on_state: impl Fn(ChannelConnectionState) + Send + Sync + 'static,
    ) -> Self {
        self.on_state = Some(Arc::new(on_state));
        self
    }
}

/// Connection state exposed to the UI.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChannelConnectionState {
    /// A live connection is currently open.
    pub is_connected: bool,
    /// Abnormal closes since the last healthy event or reconnect.
    pub connection_attempts: u32,
    /// The simulated fallback channel is active.
    pub using_fallback: bool,
}

/// Why a connection ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Closed with 1000 or 1001.
    Normal(u16),
    /// Closed with any other code.
    Abnormal(u16),
    /// The connect call failed or timed out.
    ConnectFailed,
}

/// Lifecycle phase of the channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChannelPhase {
    /// Not connected and not trying.
    #[default]
    Idle,
    /// A connect call is in flight.
    Connecting,
    /// A live connection is open.
    Connected,
    /// The last connection ended; a retry may follow.
    Disconnected(DisconnectReason),
    /// The simulated channel is active.
    Fallback,
}

#[derive(Clone, Copy, Debug, Default)]
struct StateCell {
    state: ChannelConnectionState,
    phase: ChannelPhase,
}

struct ChannelShared {
    config: ChannelConfig,
    connector: Arc<dyn StatusConnector>,
    runtime: Handle,
    metrics: Arc<StatusMetrics>,
    gate: Arc<DeliveryGate>,
    cell: Mutex<StateCell>,
}

impl ChannelShared {
    /// Apply `f` and notify `on_state` if `epoch` is still current.
    ///
    /// `f` returns whether observers should be notified. Returns false when
    /// the session has been closed.
    fn transition(
        &self,
        epoch: u64,
        handlers: &ChannelHandlers,
        f: impl FnOnce(&mut StateCell) -> bool,
    ) -> bool {
        self.gate.deliver(epoch, || {
            let (notify, state) = {
                let mut cell = self.cell.lock();
                let notify = f(&mut *cell);
                (notify, cell.state)
            };
            if notify {
                if let Some(on_state) = &handlers.on_state {
                    on_state(state);
                }
            }
        })
    }
}

struct Session {
    identifier: PaymentIdentifier,
    task: JoinHandle<()>,
}

/// Owns the status connection for one payment identifier at a time.
pub struct PaymentStatusChannel {
    shared: Arc<ChannelShared>,
    session: Mutex<Option<Session>>,
    last_open: Mutex<Option<(PaymentIdentifier, ChannelHandlers)>>,
}

impl PaymentStatusChannel {
    /// Create a channel driven by the current tokio runtime.
    ///
    /// Fails outside a runtime or when `config` is invalid.
    pub fn new(connector: Arc<dyn StatusConnector>, config: ChannelConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| StatusError::Runtime(e.to_string()))?;
        Ok(Self::with_runtime(
            runtime,
            connector,
            config,
            Arc::new(StatusMetrics::new()),
        ))
    }

    /// Create a channel driven by an explicit runtime.
    pub fn with_runtime(
        runtime: Handle,
        connector: Arc<dyn StatusConnector>,
        config: ChannelConfig,
        metrics: Arc<StatusMetrics>,
    ) -> Self {
        Self::with_gate(
            runtime,
            connector,
            config,
            metrics,
            Arc::new(DeliveryGate::new()),
        )
    }

    /// Channel whose handlers are serialized through `gate`.
    pub(crate) fn with_gate(
        runtime: Handle,
        connector: Arc<dyn StatusConnector>,
        config: ChannelConfig,
        metrics: Arc<StatusMetrics>,
        gate: Arc<DeliveryGate>,
    ) -> Self {
        Self {
            shared: Arc::new(ChannelShared {
                config,
                connector,
                runtime,
                metrics,
                gate,
                cell: Mutex::new(StateCell::default()),
            }),
            session: Mutex::new(None),
            last_open: Mutex::new(None),
        }
    }

    /// Start a session for `identifier`.
    ///
    /// A blank identifier is ignored. Opening while a session is active is a
    /// no-op; close first to switch identifiers.
    pub fn open(&self, identifier: &str, handlers: ChannelHandlers) {
        let Some(identifier) = PaymentIdentifier::parse(identifier) else {
            debug!("no payment identifier, not connecting");
            return;
        };

        // Held across the epoch swap so a handler on the session task never
        // observes a half-started session.
        self.shared.gate.exclusive(|| {
            let mut session = self.session.lock();
            if let Some(active) = session.as_ref().filter(|s| !s.task.is_finished()) {
                if active.identifier == identifier {
                    debug!(%identifier, "status channel already open");
                } else {
                    warn!(
                        active = %active.identifier,
                        requested = %identifier,
                        "status channel busy with another identifier, ignoring open"
                    );
                }
                return;
            }

            *self.last_open.lock() = Some((identifier.clone(), handlers.clone()));

            // A new session starts with a full attempt budget and no fallback.
            let epoch = self.shared.gate.open();
            *self.shared.cell.lock() = StateCell::default();

            debug!(
                %identifier,
                delay_ms = self.shared.config.connect_delay_ms,
                "status channel scheduled"
            );
            let task = self.shared.runtime.spawn(session::run(
                Arc::clone(&self.shared),
                identifier.clone(),
                handlers,
                epoch,
            ));
            *session = Some(Session { identifier, task });
        });
    }

    /// End the session. Safe to call at any time, any number of times.
    pub fn close(&self) {
        let session = self.session.lock().take();
        self.shared.gate.close();

        {
            let mut cell = self.shared.cell.lock();
            cell.state.is_connected = false;
            cell.phase = ChannelPhase::Idle;
        }

        if let Some(session) = session {
            session.task.abort();
            debug!(identifier = %session.identifier, "status channel closed");
        }
    }

    /// Reset the attempt budget, leave fallback mode and reopen.
    ///
    /// No-op if the channel was never opened.
    pub fn reconnect(&self) {
        let last = self.last_open.lock().clone();
        let Some((identifier, handlers)) = last else {
            debug!("reconnect requested before any open, ignoring");
            return;
        };

        info!(%identifier, "manual reconnect");
        self.shared.metrics.record_manual_reconnect();
        self.close();
        self.open(identifier.as_str(), handlers);
    }

    /// Snapshot of the connection state.
    pub fn connection_state(&self) -> ChannelConnectionState {
        self.shared.cell.lock().state
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ChannelPhase {
        self.shared.cell.lock().phase
    }

    /// Identifier of the active session, if any.
    pub fn identifier(&self) -> Option<PaymentIdentifier> {
        self.session
            .lock()
            .as_ref()
            .filter(|s| !s.task.is_finished())
            .map(|s| s.identifier.clone())
    }

    /// True while a session is active (including fallback).
    pub fn is_open(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|s| !s.task.is_finished())
    }

    /// Counters shared with this channel.
    pub fn metrics(&self) -> Arc<StatusMetrics> {
        Arc::clone(&self.shared.metrics)
    }

    /// Channel configuration.
    pub fn config(&self) -> &ChannelConfig {
        &self.shared.config
    }
}

impl Drop for PaymentStatusChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::codes;
    use crate::testing::{MockConnector, MockPlan};
    use crate::transport::{ChannelFrame, CloseCode};
    use std::sync::{OnceLock, Weak};
    use std::time::Duration;
    use tokio::time::sleep;

    type Events = Arc<Mutex<Vec<RawStatusEvent>>>;
    type States = Arc<Mutex<Vec<ChannelConnectionState>>>;

    fn channel(connector: &MockConnector) -> PaymentStatusChannel {
        PaymentStatusChannel::new(Arc::new(connector.clone()), ChannelConfig::default()).unwrap()
    }

    fn recording() -> (ChannelHandlers, Events, States) {
        let events: Events = Arc::default();
        let states: States = Arc::default();
        let event_sink = Arc::clone(&events);
        let state_sink = Arc::clone(&states);
        let handlers = ChannelHandlers::new(move |event| event_sink.lock().push(event))
            .with_state(move |state| state_sink.lock().push(state));
        (handlers, events, states)
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_identifier_never_connects() {
        let connector = MockConnector::new();
        let channel = channel(&connector);
        let (handlers, _, states) = recording();

        channel.open("  ", handlers);
        sleep(Duration::from_secs(10)).await;

        assert!(!channel.is_open());
        assert_eq!(connector.attempts(), 0);
        assert!(states.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_waits_for_delay() {
        let connector = MockConnector::new();
        let channel = channel(&connector);
        let (handlers, _, _) = recording();

        channel.open("abc123", handlers);
        sleep(Duration::from_millis(1999)).await;
        assert_eq!(connector.attempts(), 0);
        assert_eq!(channel.phase(), ChannelPhase::Idle);

        sleep(Duration::from_millis(2)).await;
        assert_eq!(connector.attempts(), 1);
        assert_eq!(
            connector.urls(),
            vec!["wss://payments.pre-bnvo.com/ws/merchant/abc123".to_string()]
        );
        assert_eq!(channel.phase(), ChannelPhase::Connected);
        assert!(channel.connection_state().is_connected);
        assert_eq!(channel.identifier().unwrap().as_str(), "abc123");
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_connects_exhaust_budget() {
        let connector = MockConnector::new();
        for _ in 0..3 {
            connector.push_plan(MockPlan::Refuse);
        }
        let channel = channel(&connector);
        let (handlers, _, states) = recording();

        channel.open("abc123", handlers);
        sleep(Duration::from_secs(30)).await;

        assert_eq!(connector.attempts(), 3);
        assert_eq!(
            channel.connection_state(),
            ChannelConnectionState {
                is_connected: false,
                connection_attempts: 3,
                using_fallback: true,
            }
        );
        assert_eq!(channel.phase(), ChannelPhase::Fallback);
        assert!(channel.is_open());
        assert!(states.lock().iter().all(|s| s.connection_attempts <= 3));
        assert_eq!(channel.metrics().snapshot().fallback_activations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout_counts_as_abnormal() {
        struct Hanging;

        #[async_trait::async_trait]
        impl StatusConnector for Hanging {
            async fn connect(
                &self,
                _url: &str,
            ) -> Result<Box<dyn crate::transport::StatusChannel>> {
                std::future::pending().await
            }
        }

        let config = ChannelConfig::default()
            .with_connect_timeout(Duration::from_secs(1))
            .with_max_reconnect_attempts(2);
        let channel = PaymentStatusChannel::new(Arc::new(Hanging), config).unwrap();
        channel.open("abc123", ChannelHandlers::new(|_| {}));

        sleep(Duration::from_millis(3500)).await;
        assert_eq!(
            channel.phase(),
            ChannelPhase::Disconnected(DisconnectReason::ConnectFailed)
        );
        assert_eq!(channel.connection_state().connection_attempts, 1);

        sleep(Duration::from_millis(3000)).await;
        assert_eq!(channel.phase(), ChannelPhase::Fallback);
        assert_eq!(channel.connection_state().connection_attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_healthy_event_resets_attempts() {
        let connector = MockConnector::new();
        connector.close_next(1, CloseCode::INTERNAL_ERROR);
        let channel = channel(&connector);
        let (handlers, events, _) = recording();

        channel.open("abc123", handlers);
        sleep(Duration::from_secs(5)).await;
        assert_eq!(connector.attempts(), 2);
        assert_eq!(channel.connection_state().connection_attempts, 1);

        connector
            .latest_server()
            .unwrap()
            .send_event(&RawStatusEvent::new(codes::PENDING));
        sleep(Duration::from_millis(10)).await;

        assert_eq!(channel.connection_state().connection_attempts, 0);
        assert_eq!(events.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_going_away_ends_session() {
        let connector = MockConnector::new();
        connector.push_plan(MockPlan::AcceptWith(vec![ChannelFrame::closed(
            CloseCode::GOING_AWAY,
        )]));
        let channel = channel(&connector);
        channel.open("abc123", ChannelHandlers::new(|_| {}));

        sleep(Duration::from_secs(30)).await;
        assert_eq!(connector.attempts(), 1);
        assert_eq!(
            channel.phase(),
            ChannelPhase::Disconnected(DisconnectReason::Normal(CloseCode::GOING_AWAY))
        );
        assert!(!channel.is_open());
        assert_eq!(channel.connection_state().connection_attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_with_other_identifier_is_ignored() {
        let connector = MockConnector::new();
        let channel = channel(&connector);

        channel.open("first", ChannelHandlers::new(|_| {}));
        channel.open("second", ChannelHandlers::new(|_| {}));
        sleep(Duration::from_secs(3)).await;

        assert_eq!(connector.attempts(), 1);
        assert!(connector.urls()[0].ends_with("/first"));
        assert_eq!(channel.identifier().unwrap().as_str(), "first");
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_can_close_own_channel() {
        let connector = MockConnector::new();
        let slot: Arc<OnceLock<Weak<PaymentStatusChannel>>> = Arc::default();
        let channel = Arc::new(channel(&connector));
        let _ = slot.set(Arc::downgrade(&channel));

        let events: Events = Arc::default();
        let sink = Arc::clone(&events);
        let owner = Arc::clone(&slot);
        channel.open(
            "abc123",
            ChannelHandlers::new(move |event| {
                sink.lock().push(event);
                if let Some(channel) = owner.get().and_then(Weak::upgrade) {
                    channel.close();
                }
            }),
        );
        sleep(Duration::from_secs(3)).await;

        let server = connector.latest_server().unwrap();
        server.send_event(&RawStatusEvent::new(codes::PENDING));
        server.send_event(&RawStatusEvent::new(codes::PENDING));
        sleep(Duration::from_millis(10)).await;

        assert_eq!(events.lock().len(), 1);
        assert!(!channel.is_open());
        assert_eq!(channel.phase(), ChannelPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_before_open_is_noop() {
        let connector = MockConnector::new();
        let channel = channel(&connector);
        channel.reconnect();
        sleep(Duration::from_secs(5)).await;
        assert_eq!(connector.attempts(), 0);
        assert_eq!(channel.metrics().snapshot().manual_reconnects, 0);
    }

    #[test]
    fn test_new_requires_runtime() {
        let result = PaymentStatusChannel::new(
            Arc::new(MockConnector::new()),
            ChannelConfig::default(),
        );
        assert!(matches!(result, Err(StatusError::Runtime(_))));
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let config = ChannelConfig::default().with_max_reconnect_attempts(0);
        let result = PaymentStatusChannel::new(Arc::new(MockConnector::new()), config);
        assert!(matches!(result, Err(StatusError::InvalidConfig { .. })));
    }
}
