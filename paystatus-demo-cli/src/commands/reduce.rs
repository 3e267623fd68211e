//! Offline decode + reduce of a single status payload

use anyhow::{Context, Result};
use paystatus_lib::{PaymentStatusReducer, RawStatusEvent, ReducerConfig};

use crate::ui;

pub fn run(payload: &str, lenient: bool, verbose: bool) -> Result<()> {
    let event = RawStatusEvent::decode(payload).context("payload is not a status event")?;
    let config = ReducerConfig::default().with_completion_policy(super::completion_policy(lenient));
    let reducer = PaymentStatusReducer::new(&config);
    let status = reducer.reduce(&event);

    ui::header("Status");
    ui::key_value("Code", event.code());
    ui::key_value(
        "Confirmed amount",
        &event
            .confirmed_amount
            .map(|amount| amount.to_string())
            .unwrap_or_else(|| "-".to_string()),
    );
    ui::key_value("Policy", &format!("{:?}", reducer.policy()));
    ui::key_value("Status", &ui::status_label(status));

    if verbose && !event.extra.is_empty() {
        ui::separator();
        ui::json(&serde_json::Value::Object(event.extra.clone()));
    }

    Ok(())
}
