//! Public subscribe API tying the channel to the publisher.
//!
//! A [`StatusMonitor`] holds the connector, configuration and metrics shared
//! by every subscription. Each [`PaymentStatusSubscription`] owns one channel
//! session and one publisher; dropping it tears both down.
//!
//! # Example
//!
//! ```rust,no_run
//! use paystatus_lib::testing::MockConnector;
//! use paystatus_lib::{MonitorConfig, StatusMonitor, SubscribeOptions};
//! use std::sync::Arc;
//!
//! # async fn run() -> paystatus_lib::Result<()> {
//! let monitor = StatusMonitor::new(Arc::new(MockConnector::new()), MonitorConfig::default())?;
//! let subscription = monitor.subscribe(SubscribeOptions::new("abc123", |status| {
//!     println!("payment is now {status}");
//! }));
//! assert!(!subscription.is_connected());
//! # Ok(())
//! # }
//! ```

use crate::channel::{ChannelConnectionState, ChannelHandlers, PaymentStatusChannel, StateHandler};
use crate::config::MonitorConfig;
use crate::gate::DeliveryGate;
use crate::metrics::StatusMetrics;
use crate::order::PaymentIdentifier;
use crate::reducer::{StatusCallback, StatusPublisher};
use crate::status::{PaymentStatus, RawStatusEvent};
use crate::transport::StatusConnector;
use crate::{Result, StatusError};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

/// Factory for payment status subscriptions.
pub struct StatusMonitor {
    connector: Arc<dyn StatusConnector>,
    config: MonitorConfig,
    runtime: Handle,
    metrics: Arc<StatusMetrics>,
}

impl StatusMonitor {
    /// Create a monitor on the current tokio runtime.
    pub fn new(connector: Arc<dyn StatusConnector>, config: MonitorConfig) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| StatusError::Runtime(format!("no tokio runtime: {}", e)))?;
        Self::with_runtime(runtime, connector, config)
    }

    /// Create a monitor that spawns onto `runtime`.
    ///
    /// For hosts that own their runtime and call in from foreign threads.
    pub fn with_runtime(
        runtime: Handle,
        connector: Arc<dyn StatusConnector>,
        config: MonitorConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            connector,
            config,
            runtime,
            metrics: Arc::new(StatusMetrics::new()),
        })
    }

    /// Start watching a payment.
    ///
    /// A blank identifier yields an inert subscription that stays pending
    /// and never connects.
    pub fn subscribe(&self, options: SubscribeOptions) -> PaymentStatusSubscription {
        // One gate for both halves: a status callback and a connection
        // callback never run at the same time, and either may close the
        // subscription.
        let gate = Arc::new(DeliveryGate::new());
        let publisher = StatusPublisher::with_gate(
            &self.config.reducer,
            self.runtime.clone(),
            Arc::clone(&self.metrics),
            options.on_status_change,
            Arc::clone(&gate),
        );
        let channel = PaymentStatusChannel::with_gate(
            self.runtime.clone(),
            Arc::clone(&self.connector),
            self.config.channel.clone(),
            Arc::clone(&self.metrics),
            gate,
        );

        let sink = publisher.clone();
        let handlers = ChannelHandlers {
            on_event: Arc::new(move |event: RawStatusEvent| {
                sink.submit(&event);
            }),
            on_state: options.on_connection_change,
        };

        let identifier = PaymentIdentifier::parse(&options.identifier);
        match &identifier {
            Some(id) => channel.open(id.as_str(), handlers),
            None => debug!("subscription without identifier stays inert"),
        }

        PaymentStatusSubscription {
            channel,
            publisher,
            identifier,
        }
    }

    /// Counters shared by all subscriptions of this monitor.
    pub fn metrics(&self) -> Arc<StatusMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }
}

/// Arguments to [`StatusMonitor::subscribe`].
#[derive(Clone)]
pub struct SubscribeOptions {
    /// Payment identifier; blank means "nothing to watch".
    pub identifier: String,
    /// Called once per elapsed settle window.
    pub on_status_change: StatusCallback,
    /// Called after every connection state transition.
    pub on_connection_change: Option<StateHandler>,
}

impl SubscribeOptions {
    pub fn new(
        identifier: impl Into<String>,
        on_status_change: impl Fn(PaymentStatus) + Send + Sync + 'static,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            on_status_change: Arc::new(on_status_change),
            on_connection_change: None,
        }
    }

    /// Also observe connection state changes.
    pub fn with_connection_change(
        mut self,
        on_change: impl Fn(ChannelConnectionState) + Send + Sync + 'static,
    ) -> Self {
        self.on_connection_change = Some(Arc::new(on_change));
        self
    }
}

/// A live watch on one payment. Closed on drop.
pub struct PaymentStatusSubscription {
    channel: PaymentStatusChannel,
    publisher: StatusPublisher,
    identifier: Option<PaymentIdentifier>,
}

impl PaymentStatusSubscription {
    /// Last published status.
    pub fn status(&self) -> PaymentStatus {
        self.publisher.status()
    }

    pub fn is_connected(&self) -> bool {
        self.channel.connection_state().is_connected
    }

    /// True while a settle window is open.
    pub fn is_updating(&self) -> bool {
        self.publisher.is_updating()
    }

    pub fn connection_attempts(&self) -> u32 {
        self.channel.connection_state().connection_attempts
    }

    pub fn using_fallback(&self) -> bool {
        self.channel.connection_state().using_fallback
    }

    pub fn connection_state(&self) -> ChannelConnectionState {
        self.channel.connection_state()
    }

    pub fn identifier(&self) -> Option<&PaymentIdentifier> {
        self.identifier.as_ref()
    }

    /// Reset the attempt budget and try the live endpoint again.
    pub fn reconnect(&self) {
        if self.publisher.is_cancelled() {
            return;
        }
        self.channel.reconnect();
    }

    /// Stop watching. No callback starts after this returns.
    pub fn close(&self) {
        self.channel.close();
        self.publisher.cancel();
    }
}

impl Drop for PaymentStatusSubscription {
    fn drop(&mut self) {
        self.close();
    }
}
