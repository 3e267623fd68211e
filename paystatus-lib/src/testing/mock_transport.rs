//! In-memory connector and channel for tests without network access.

use crate::status::RawStatusEvent;
use crate::transport::{ChannelFrame, ChannelKind, CloseCode, StatusChannel, StatusConnector};
use crate::{Result, StatusError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// What the next connection attempt does.
#[derive(Clone, Debug)]
pub enum MockPlan {
    /// Accept and wait for frames from the test.
    Accept,
    /// Accept and immediately queue these frames.
    AcceptWith(Vec<ChannelFrame>),
    /// Fail the connect call.
    Refuse,
}

#[derive(Default)]
struct ConnectorState {
    urls: Vec<String>,
    plans: VecDeque<MockPlan>,
    servers: Vec<MockServer>,
}

/// Scriptable [`StatusConnector`].
///
/// Attempts without a queued plan are accepted.
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MockConnector {
    /// Create a connector that accepts every attempt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the behaviour of the next unplanned attempt.
    pub fn push_plan(&self, plan: MockPlan) {
        self.state.lock().plans.push_back(plan);
    }

    /// Queue `count` attempts that accept and close right away with `code`.
    pub fn close_next(&self, count: usize, code: u16) {
        for _ in 0..count {
            self.push_plan(MockPlan::AcceptWith(vec![ChannelFrame::closed(code)]));
        }
    }

    /// Total connection attempts, refused ones included.
    pub fn attempts(&self) -> usize {
        self.state.lock().urls.len()
    }

    /// URLs of all attempts, in order.
    pub fn urls(&self) -> Vec<String> {
        self.state.lock().urls.clone()
    }

    /// Server side of the `index`-th accepted connection.
    pub fn server(&self, index: usize) -> Option<MockServer> {
        self.state.lock().servers.get(index).cloned()
    }

    /// Server side of the most recent accepted connection.
    pub fn latest_server(&self) -> Option<MockServer> {
        self.state.lock().servers.last().cloned()
    }

    /// Number of accepted connections.
    pub fn accepted(&self) -> usize {
        self.state.lock().servers.len()
    }
}

#[async_trait]
impl StatusConnector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn StatusChannel>> {
        let mut state = self.state.lock();
        state.urls.push(url.to_string());

        let initial = match state.plans.pop_front().unwrap_or(MockPlan::Accept) {
            MockPlan::Refuse => {
                return Err(StatusError::connection_failed(url, "connection refused"))
            }
            MockPlan::Accept => Vec::new(),
            MockPlan::AcceptWith(frames) => frames,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let server = MockServer {
            tx,
            closed_by_client: Arc::new(AtomicBool::new(false)),
        };
        for frame in initial {
            server.push(frame);
        }
        let channel = MockChannel {
            rx,
            closed_by_client: Arc::clone(&server.closed_by_client),
        };
        state.servers.push(server);
        Ok(Box::new(channel))
    }
}

/// Test-side handle of one mock connection.
#[derive(Clone, Debug)]
pub struct MockServer {
    tx: mpsc::UnboundedSender<ChannelFrame>,
    closed_by_client: Arc<AtomicBool>,
}

impl MockServer {
    /// Push a raw text frame.
    pub fn send_text(&self, text: impl Into<String>) {
        self.push(ChannelFrame::Text(text.into()));
    }

    /// Push an encoded status event.
    pub fn send_event(&self, event: &RawStatusEvent) {
        self.send_text(event.to_frame());
    }

    /// Close the connection from the server side.
    pub fn close(&self, code: u16) {
        self.push(ChannelFrame::closed(code));
    }

    /// Drop the connection without a close frame.
    pub fn drop_connection(&self) {
        self.close(CloseCode::ABNORMAL);
    }

    /// True if the client called `close()` on its end.
    pub fn closed_by_client(&self) -> bool {
        self.closed_by_client.load(Ordering::SeqCst)
    }

    /// True once the client side has been dropped or closed.
    pub fn is_disconnected(&self) -> bool {
        self.tx.is_closed() || self.closed_by_client()
    }

    fn push(&self, frame: ChannelFrame) {
        // The client may already be gone; frames to a dead channel are lost.
        let _ = self.tx.send(frame);
    }
}

/// Client side of a mock connection.
pub struct MockChannel {
    rx: mpsc::UnboundedReceiver<ChannelFrame>,
    closed_by_client: Arc<AtomicBool>,
}

#[async_trait]
impl StatusChannel for MockChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Live
    }

    async fn next_frame(&mut self) -> ChannelFrame {
        if self.closed_by_client.load(Ordering::SeqCst) {
            return ChannelFrame::closed(CloseCode::NORMAL);
        }
        self.rx
            .recv()
            .await
            .unwrap_or_else(|| ChannelFrame::closed(CloseCode::ABNORMAL))
    }

    async fn close(&mut self) {
        self.closed_by_client.store(true, Ordering::SeqCst);
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_plans_are_consumed_in_order() {
        let connector = MockConnector::new();
        connector.push_plan(MockPlan::Refuse);
        connector.close_next(1, CloseCode::ABNORMAL);

        assert!(connector.connect("wss://a/1").await.is_err());

        let mut channel = connector.connect("wss://a/1").await.unwrap();
        assert_eq!(channel.next_frame().await, ChannelFrame::closed(CloseCode::ABNORMAL));

        let mut channel = connector.connect("wss://a/1").await.unwrap();
        connector.latest_server().unwrap().send_text("hello");
        assert_eq!(channel.next_frame().await, ChannelFrame::Text("hello".into()));

        assert_eq!(connector.attempts(), 3);
        assert_eq!(connector.accepted(), 2);
    }

    #[tokio::test]
    async fn test_dropping_client_is_observable() {
        let connector = MockConnector::new();
        let channel = connector.connect("wss://a/1").await.unwrap();
        let server = connector.server(0).unwrap();
        assert!(!server.is_disconnected());
        drop(channel);
        assert!(server.is_disconnected());
        assert!(!server.closed_by_client());
    }

    #[tokio::test]
    async fn test_client_close() {
        let connector = MockConnector::new();
        let mut channel = connector.connect("wss://a/1").await.unwrap();
        channel.close().await;
        let server = connector.server(0).unwrap();
        assert!(server.closed_by_client());
        assert_eq!(channel.next_frame().await, ChannelFrame::closed(CloseCode::NORMAL));
    }
}
