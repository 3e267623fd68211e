use super::{ChannelFrame, ChannelKind, StatusChannel};
use crate::config::{FallbackConfig, ScriptedFrame};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

/// Locally simulated status channel used in fallback mode.
///
/// Replays its script and then stays open forever. It never reports an
/// error and never closes on its own.
pub struct SimulatedChannel {
    script: VecDeque<ScriptedFrame>,
}

impl SimulatedChannel {
    /// Channel replaying `config.script`.
    pub fn new(config: &FallbackConfig) -> Self {
        Self {
            script: config.script.iter().cloned().collect(),
        }
    }

    /// Channel that never emits anything.
    pub fn silent() -> Self {
        Self {
            script: VecDeque::new(),
        }
    }

    /// Frames still to be replayed.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

#[async_trait]
impl StatusChannel for SimulatedChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Fallback
    }

    async fn next_frame(&mut self) -> ChannelFrame {
        match self.script.pop_front() {
            Some(frame) => {
                tokio::time::sleep(Duration::from_millis(frame.after_ms)).await;
                ChannelFrame::Text(frame.payload.to_string())
            }
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.script.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_replays_script_in_order() {
        let config = FallbackConfig {
            script: vec![
                ScriptedFrame::new(Duration::from_secs(1), json!({"status": "PE"})),
                ScriptedFrame::new(
                    Duration::from_secs(5),
                    json!({"status": "CO", "confirmed_amount": 1.5}),
                ),
            ],
        };
        let mut channel = SimulatedChannel::new(&config);
        assert_eq!(channel.kind(), ChannelKind::Fallback);

        let start = tokio::time::Instant::now();
        assert_eq!(
            channel.next_frame().await,
            ChannelFrame::Text(r#"{"status":"PE"}"#.to_string())
        );
        let ChannelFrame::Text(second) = channel.next_frame().await else {
            panic!("expected a text frame");
        };
        assert!(second.contains("\"CO\""));
        assert_eq!(start.elapsed(), Duration::from_secs(6));
        assert_eq!(channel.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_channel_never_closes() {
        let mut channel = SimulatedChannel::silent();
        let next = tokio::time::timeout(Duration::from_secs(3600), channel.next_frame()).await;
        assert!(next.is_err());
    }
}
