//! Transport seam for the status channel.
//!
//! A [`StatusConnector`] opens live [`StatusChannel`]s to a status URL. The
//! simulated fallback channel implements the same [`StatusChannel`] trait,
//! so the reconnect policy can swap one for the other without the consumer
//! noticing.

mod simulated;
#[cfg(feature = "websocket")]
mod websocket;

pub use simulated::SimulatedChannel;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketChannel, WebSocketConnector};

use crate::Result;
use async_trait::async_trait;

/// Well-known websocket close codes.
pub struct CloseCode;

impl CloseCode {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;
    /// Endpoint going away (server shutdown, page navigation).
    pub const GOING_AWAY: u16 = 1001;
    /// No status code was present in the close frame.
    pub const NO_STATUS: u16 = 1005;
    /// Connection dropped without a close frame.
    pub const ABNORMAL: u16 = 1006;
    /// Unexpected server-side condition.
    pub const INTERNAL_ERROR: u16 = 1011;

    /// Closes that must not trigger a reconnect.
    pub fn is_normal(code: u16) -> bool {
        code == Self::NORMAL || code == Self::GOING_AWAY
    }
}

/// One unit read from a status channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelFrame {
    /// A text frame, expected to hold a JSON status event.
    Text(String),
    /// The channel closed. No frames follow.
    Closed {
        /// Websocket close code.
        code: u16,
        /// Close reason, possibly empty.
        reason: String,
    },
}

impl ChannelFrame {
    /// A close with the given code and no reason.
    pub fn closed(code: u16) -> Self {
        Self::Closed {
            code,
            reason: String::new(),
        }
    }
}

/// Which variant is carrying the status stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelKind {
    /// A real network connection.
    Live,
    /// The locally simulated fallback.
    Fallback,
}

/// A connected source of status frames.
#[async_trait]
pub trait StatusChannel: Send {
    /// Which variant this is.
    fn kind(&self) -> ChannelKind;

    /// Wait for the next frame. After a `Closed` frame the channel is done.
    async fn next_frame(&mut self) -> ChannelFrame;

    /// Close the channel with a normal closure.
    async fn close(&mut self);
}

/// Opens live status channels.
#[async_trait]
pub trait StatusConnector: Send + Sync {
    /// Connect to `url`. An error counts as an abnormal close.
    async fn connect(&self, url: &str) -> Result<Box<dyn StatusChannel>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_close_codes() {
        assert!(CloseCode::is_normal(CloseCode::NORMAL));
        assert!(CloseCode::is_normal(CloseCode::GOING_AWAY));
        assert!(!CloseCode::is_normal(CloseCode::ABNORMAL));
        assert!(!CloseCode::is_normal(CloseCode::NO_STATUS));
        assert!(!CloseCode::is_normal(CloseCode::INTERNAL_ERROR));
        assert!(!CloseCode::is_normal(4004));
    }
}
