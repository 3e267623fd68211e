//! Shared fixtures for subscription integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use paystatus_lib::testing::MockConnector;
use paystatus_lib::{
    ChannelConnectionState, MonitorConfig, PaymentStatus, PaymentStatusSubscription,
    StatusMonitor, SubscribeOptions,
};
use std::sync::Arc;
use std::time::Duration;

/// Default connect delay plus a little slack.
pub const AFTER_CONNECT: Duration = Duration::from_millis(2010);

/// Monitor over a mock connector that records every callback.
pub struct Harness {
    pub connector: MockConnector,
    pub monitor: StatusMonitor,
    pub statuses: Arc<Mutex<Vec<PaymentStatus>>>,
    pub states: Arc<Mutex<Vec<ChannelConnectionState>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(MonitorConfig::default())
    }

    pub fn with_config(config: MonitorConfig) -> Self {
        let connector = MockConnector::new();
        let monitor = StatusMonitor::new(Arc::new(connector.clone()), config)
            .expect("monitor should build inside a runtime");
        Self {
            connector,
            monitor,
            statuses: Arc::default(),
            states: Arc::default(),
        }
    }

    /// Options recording into this harness.
    pub fn options(&self, identifier: &str) -> SubscribeOptions {
        let statuses = Arc::clone(&self.statuses);
        let states = Arc::clone(&self.states);
        SubscribeOptions::new(identifier, move |status| statuses.lock().push(status))
            .with_connection_change(move |state| states.lock().push(state))
    }

    pub fn subscribe(&self, identifier: &str) -> PaymentStatusSubscription {
        self.monitor.subscribe(self.options(identifier))
    }

    pub fn published(&self) -> Vec<PaymentStatus> {
        self.statuses.lock().clone()
    }
}

pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
}
