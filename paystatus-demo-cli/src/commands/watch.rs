//! Follow a payment over the live status channel

use anyhow::{Context, Result};
use paystatus_lib::{
    ChannelConnectionState, MonitorConfig, PaymentStatus, StatusMonitor, SubscribeOptions,
    WebSocketConnector,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::ui;

pub struct WatchOptions {
    pub identifier: String,
    pub config: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub lenient: bool,
    pub timeout_secs: Option<u64>,
}

/// How a watch ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchOutcome {
    Completed,
    Expired,
    Failed,
    TimedOut,
    Interrupted,
}

impl WatchOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Completed => 0,
            Self::Expired => 2,
            Self::Failed => 3,
            Self::TimedOut => 4,
            Self::Interrupted => 130,
        }
    }

    fn from_status(status: PaymentStatus) -> Option<Self> {
        match status {
            PaymentStatus::Completed => Some(Self::Completed),
            PaymentStatus::Expired => Some(Self::Expired),
            PaymentStatus::Failed => Some(Self::Failed),
            PaymentStatus::Pending => None,
        }
    }
}

enum Update {
    Status(PaymentStatus),
    Connection(ChannelConnectionState),
}

/// File config (or defaults), then `PAYSTATUS_*` variables, then flags.
pub fn load_config(options: &WatchOptions) -> Result<MonitorConfig> {
    let mut config = match &options.config {
        Some(path) => {
            let body = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            MonitorConfig::from_json(&body)
                .with_context(|| format!("invalid config in {}", path.display()))?
        }
        None => MonitorConfig::default(),
    };
    config.apply_env();

    if let Some(endpoint) = &options.endpoint {
        config.channel.endpoint = endpoint.clone();
    }
    if options.lenient {
        config.reducer.completion_policy = super::completion_policy(true);
    }
    config.validate()?;
    Ok(config)
}

pub async fn run(options: WatchOptions, verbose: bool) -> Result<WatchOutcome> {
    let config = load_config(&options)?;
    let monitor = StatusMonitor::new(Arc::new(WebSocketConnector::new()), config)?;

    ui::header(&format!("Watching payment {}", options.identifier.trim()));
    ui::key_value("Endpoint", &monitor.config().channel.endpoint);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let status_tx = tx.clone();
    let subscribe = SubscribeOptions::new(options.identifier.clone(), move |status| {
        let _ = status_tx.send(Update::Status(status));
    })
    .with_connection_change(move |state| {
        let _ = tx.send(Update::Connection(state));
    });
    let subscription = monitor.subscribe(subscribe);
    if subscription.identifier().is_none() {
        anyhow::bail!("payment identifier must not be empty");
    }

    let spinner = ui::spinner("Waiting for payment status...");
    let deadline = async {
        match options.timeout_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut last_connection = ChannelConnectionState::default();
    let outcome = loop {
        tokio::select! {
            update = rx.recv() => match update {
                Some(Update::Status(status)) => {
                    spinner.suspend(|| ui::key_value("Status", &ui::status_label(status)));
                    if let Some(outcome) = WatchOutcome::from_status(status) {
                        break outcome;
                    }
                }
                Some(Update::Connection(state)) => {
                    if state != last_connection {
                        spinner.suspend(|| report_connection(last_connection, state));
                        last_connection = state;
                    }
                }
                None => break WatchOutcome::Interrupted,
            },
            _ = &mut deadline => break WatchOutcome::TimedOut,
            _ = &mut ctrl_c => break WatchOutcome::Interrupted,
        }
    };

    subscription.close();
    spinner.finish_and_clear();

    match outcome {
        WatchOutcome::Completed => ui::success("Payment completed"),
        WatchOutcome::Expired => ui::error("Payment expired"),
        WatchOutcome::Failed => ui::error("Payment failed"),
        WatchOutcome::TimedOut => ui::warning("Timed out before a final status"),
        WatchOutcome::Interrupted => ui::warning("Interrupted"),
    }

    if verbose {
        ui::separator();
        ui::json(&serde_json::to_value(monitor.metrics().snapshot())?);
    }

    Ok(outcome)
}

fn report_connection(previous: ChannelConnectionState, state: ChannelConnectionState) {
    if state.using_fallback && !previous.using_fallback {
        ui::warning(&format!(
            "Live channel unavailable after {} attempts, using simulated channel",
            state.connection_attempts
        ));
    } else if state.is_connected && !previous.is_connected {
        ui::success("Connected");
    } else if !state.is_connected && previous.is_connected {
        ui::warning("Connection lost");
    } else if state.connection_attempts > previous.connection_attempts {
        ui::info(&format!("Connection attempt {} failed", state.connection_attempts));
    }
}
