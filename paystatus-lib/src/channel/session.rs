//! Session driver: connect, pump frames, apply the reconnect policy.

use super::{ChannelHandlers, ChannelPhase, ChannelShared, DisconnectReason};
use crate::order::PaymentIdentifier;
use crate::status::RawStatusEvent;
use crate::transport::{ChannelFrame, ChannelKind, CloseCode, SimulatedChannel, StatusChannel};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a connection ended.
enum Ended {
    Closed(u16),
    ConnectFailed,
    /// The session epoch is no longer current.
    Cancelled,
}

pub(super) async fn run(
    shared: Arc<ChannelShared>,
    identifier: PaymentIdentifier,
    handlers: ChannelHandlers,
    epoch: u64,
) {
    let url = identifier.status_url(&shared.config.endpoint);
    let max_attempts = shared.config.max_reconnect_attempts;

    if !shared.transition(epoch, &handlers, |_| true) {
        return;
    }
    tokio::time::sleep(shared.config.connect_delay()).await;

    loop {
        if !shared.transition(epoch, &handlers, |cell| {
            cell.phase = ChannelPhase::Connecting;
            false
        }) {
            return;
        }
        shared.metrics.record_connect_attempt();
        debug!(%identifier, url, "connecting status channel");

        let connect = shared.connector.connect(&url);
        let ended = match tokio::time::timeout(shared.config.connect_timeout(), connect).await {
            Ok(Ok(mut channel)) => {
                let connected = shared.transition(epoch, &handlers, |cell| {
                    cell.state.is_connected = true;
                    cell.phase = ChannelPhase::Connected;
                    true
                });
                if !connected {
                    channel.close().await;
                    return;
                }
                shared.metrics.record_connection_established();
                info!(%identifier, "status channel connected");
                pump(&shared, &handlers, epoch, channel.as_mut()).await
            }
            Ok(Err(e)) => {
                warn!(%identifier, error = %e, "status channel connect failed");
                Ended::ConnectFailed
            }
            Err(_) => {
                warn!(
                    %identifier,
                    timeout_ms = shared.config.connect_timeout_ms,
                    "status channel connect timed out"
                );
                Ended::ConnectFailed
            }
        };

        let reason = match ended {
            Ended::Cancelled => return,
            Ended::Closed(code) if CloseCode::is_normal(code) => {
                shared.metrics.record_normal_close();
                shared.transition(epoch, &handlers, |cell| {
                    cell.state.is_connected = false;
                    cell.phase = ChannelPhase::Disconnected(DisconnectReason::Normal(code));
                    true
                });
                info!(%identifier, code, "status channel closed normally");
                return;
            }
            Ended::Closed(code) => DisconnectReason::Abnormal(code),
            Ended::ConnectFailed => DisconnectReason::ConnectFailed,
        };

        shared.metrics.record_abnormal_close();
        let mut attempts = 0;
        let current = shared.transition(epoch, &handlers, |cell| {
            cell.state.is_connected = false;
            cell.state.connection_attempts = (cell.state.connection_attempts + 1).min(max_attempts);
            cell.phase = ChannelPhase::Disconnected(reason);
            attempts = cell.state.connection_attempts;
            true
        });
        if !current {
            return;
        }

        if attempts >= max_attempts {
            run_fallback(&shared, &identifier, &handlers, epoch, attempts).await;
            return;
        }

        warn!(
            %identifier,
            ?reason,
            attempts,
            max_attempts,
            backoff_ms = shared.config.reconnect_backoff_ms,
            "status channel lost, retrying"
        );
        tokio::time::sleep(shared.config.reconnect_backoff()).await;
    }
}

async fn run_fallback(
    shared: &ChannelShared,
    identifier: &PaymentIdentifier,
    handlers: &ChannelHandlers,
    epoch: u64,
    attempts: u32,
) {
    let activated = shared.transition(epoch, handlers, |cell| {
        cell.state.is_connected = false;
        cell.state.using_fallback = true;
        cell.phase = ChannelPhase::Fallback;
        true
    });
    if !activated {
        return;
    }
    shared.metrics.record_fallback_activation();
    warn!(
        %identifier,
        attempts,
        "reconnect budget spent, using simulated status channel"
    );

    let mut channel = SimulatedChannel::new(&shared.config.fallback);
    if let Ended::Closed(code) = pump(shared, handlers, epoch, &mut channel).await {
        debug!(%identifier, code, "simulated status channel ended");
    }
}

/// Forward decoded frames until the channel closes or the epoch goes stale.
async fn pump(
    shared: &ChannelShared,
    handlers: &ChannelHandlers,
    epoch: u64,
    channel: &mut dyn StatusChannel,
) -> Ended {
    let live = channel.kind() == ChannelKind::Live;

    loop {
        let text = match channel.next_frame().await {
            ChannelFrame::Text(text) => text,
            ChannelFrame::Closed { code, reason } => {
                debug!(code, %reason, "status channel closed by peer");
                return Ended::Closed(code);
            }
        };
        shared.metrics.record_frame_received();

        let event = match RawStatusEvent::decode(&text) {
            Ok(event) => event,
            Err(e) => {
                shared.metrics.record_decode_failure();
                warn!(error = %e, "dropping undecodable status frame");
                continue;
            }
        };

        // A healthy live connection earns back the reconnect budget.
        if live
            && !shared.transition(epoch, handlers, |cell| {
                let reset = cell.state.connection_attempts != 0;
                cell.state.connection_attempts = 0;
                reset
            })
        {
            return Ended::Cancelled;
        }

        debug!(status = event.code(), "status event received");
        if !shared.gate.deliver(epoch, || (handlers.on_event)(event)) {
            return Ended::Cancelled;
        }
        shared.metrics.record_event_delivered();
    }
}
