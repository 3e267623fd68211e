//! Payment Status Sync
//!
//! Keeps a checkout screen in sync with the merchant-status endpoint of a
//! crypto payment gateway. A [`PaymentStatusChannel`] holds one websocket per
//! payment identifier, retries abnormal closes a bounded number of times and
//! then falls back to a simulated channel. Each decoded event is reduced to a
//! [`PaymentStatus`] and published after a short settle window.
//!
//! # Modules
//!
//! - [`channel`]: connection lifecycle and reconnect policy
//! - [`reducer`]: raw event to status mapping and the settle-window publisher
//! - [`subscription`]: the [`StatusMonitor`] entry point used by UIs
//! - [`transport`]: connector/channel traits, websocket and simulated variants
//! - [`testing`]: scriptable in-memory connector
//!
//! The websocket transport is behind the `websocket` feature.

pub mod channel;
pub mod config;
pub mod errors;
mod gate;
pub mod metrics;
pub mod order;
pub mod reducer;
pub mod status;
pub mod subscription;
pub mod testing;
pub mod transport;

pub use channel::{
    ChannelConnectionState, ChannelHandlers, ChannelPhase, DisconnectReason, PaymentStatusChannel,
};
pub use config::{
    ChannelConfig, CompletionPolicy, FallbackConfig, MonitorConfig, ReducerConfig, ScriptedFrame,
    StatusCodeTable,
};
pub use errors::{StatusError, StatusErrorCode};
pub use metrics::{MetricsSnapshot, StatusMetrics};
pub use order::{PaymentIdentifier, PaymentOrder};
pub use reducer::{PaymentStatusReducer, StatusPublisher};
pub use status::{PaymentStatus, RawStatusEvent};
pub use subscription::{PaymentStatusSubscription, StatusMonitor, SubscribeOptions};
pub use transport::{ChannelFrame, ChannelKind, CloseCode, SimulatedChannel, StatusChannel, StatusConnector};
#[cfg(feature = "websocket")]
pub use transport::WebSocketConnector;

/// Convenience alias for results in this crate.
pub type Result<T> = std::result::Result<T, StatusError>;
