//! Payment status values and raw status events.
//!
//! The merchant-status endpoint pushes JSON text frames of the form
//! `{"status": "<code>", "confirmed_amount": <number>}`. Frames are decoded
//! into [`RawStatusEvent`] and later reduced to a [`PaymentStatus`] by the
//! reducer.

use crate::{Result, StatusError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Two-letter status codes sent by the merchant-status endpoint.
pub mod codes {
    /// Order created, payer has not picked a currency yet.
    pub const NOT_READY: &str = "NR";
    /// Waiting for the payer.
    pub const PENDING: &str = "PE";
    /// Funds detected, waiting for confirmations.
    pub const AWAITING_COMPLETION: &str = "AC";
    /// Payer sent less than requested.
    pub const INSUFFICIENT_AMOUNT: &str = "IA";
    /// Payment arrived outside the allowed conditions.
    pub const OUT_OF_CONDITION: &str = "OC";
    /// Payment completed.
    pub const COMPLETED: &str = "CO";
    /// Order cancelled.
    pub const CANCELLED: &str = "CA";
    /// Order expired before payment.
    pub const EXPIRED: &str = "EX";
    /// Payment failed.
    pub const FAILED: &str = "FA";
}

/// Payment status as seen by the UI.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Waiting for settlement. Initial value.
    #[default]
    Pending,
    /// Settled with a confirmed amount.
    Completed,
    /// The order expired.
    Expired,
    /// The payment failed or was cancelled.
    Failed,
}

impl PaymentStatus {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Check if payment succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Lowercase name, as published to the UI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded status frame.
#[derive(Clone, Debug, PartialEq)]
pub struct RawStatusEvent {
    /// Status code as sent by the server.
    pub status: String,
    /// Confirmed amount, when present and numeric.
    pub confirmed_amount: Option<f64>,
    /// Remaining fields of the frame.
    pub extra: Map<String, Value>,
}

impl RawStatusEvent {
    /// Create an event carrying only a status code.
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            confirmed_amount: None,
            extra: Map::new(),
        }
    }

    /// Attach a confirmed amount.
    pub fn with_confirmed_amount(mut self, amount: f64) -> Self {
        self.confirmed_amount = Some(amount);
        self
    }

    /// Decode a text frame.
    ///
    /// `confirmed_amount` is accepted as a JSON number or a numeric string;
    /// any other shape is treated as absent rather than rejected.
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut fields) = value else {
            return Err(StatusError::Decode("expected a JSON object".into()));
        };

        let status = match fields.remove("status") {
            Some(Value::String(code)) => code,
            Some(other) => {
                return Err(StatusError::Decode(format!(
                    "status must be a string, got {}",
                    other
                )))
            }
            None => return Err(StatusError::Decode("missing status field".into())),
        };

        let confirmed_amount = fields
            .remove("confirmed_amount")
            .as_ref()
            .and_then(parse_amount);

        Ok(Self {
            status,
            confirmed_amount,
            extra: fields,
        })
    }

    /// Status code with surrounding whitespace removed.
    pub fn code(&self) -> &str {
        self.status.trim()
    }

    /// Encode back into a text frame.
    pub fn to_frame(&self) -> String {
        let mut fields = self.extra.clone();
        fields.insert("status".into(), Value::String(self.status.clone()));
        if let Some(amount) = self.confirmed_amount {
            fields.insert("confirmed_amount".into(), Value::from(amount));
        }
        Value::Object(fields).to_string()
    }
}

fn parse_amount(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    amount.is_finite().then_some(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_states() {
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Completed.is_terminal());
        assert!(PaymentStatus::Expired.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(PaymentStatus::Completed.is_success());
        assert!(!PaymentStatus::Expired.is_success());
    }

    #[test]
    fn test_status_serde_is_lowercase() {
        let json = serde_json::to_string(&PaymentStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
        let parsed: PaymentStatus = serde_json::from_str("\"expired\"").unwrap();
        assert_eq!(parsed, PaymentStatus::Expired);
        assert_eq!(PaymentStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_decode_completed_frame() {
        let event = RawStatusEvent::decode(r#"{"status":"CO","confirmed_amount":25.5}"#).unwrap();
        assert_eq!(event.code(), codes::COMPLETED);
        assert_eq!(event.confirmed_amount, Some(25.5));
        assert!(event.extra.is_empty());
    }

    #[test]
    fn test_decode_keeps_extra_fields() {
        let event =
            RawStatusEvent::decode(r#"{"status":"PE","identifier":"pay_123","crypto_amount":1}"#)
                .unwrap();
        assert_eq!(event.confirmed_amount, None);
        assert_eq!(event.extra.get("identifier").unwrap(), "pay_123");
    }

    #[test]
    fn test_decode_amount_as_string() {
        let event = RawStatusEvent::decode(r#"{"status":"CO","confirmed_amount":"0.0042"}"#).unwrap();
        assert_eq!(event.confirmed_amount, Some(0.0042));

        let event = RawStatusEvent::decode(r#"{"status":"CO","confirmed_amount":"abc"}"#).unwrap();
        assert_eq!(event.confirmed_amount, None);

        let event = RawStatusEvent::decode(r#"{"status":"CO","confirmed_amount":null}"#).unwrap();
        assert_eq!(event.confirmed_amount, None);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(RawStatusEvent::decode("not json").is_err());
        assert!(RawStatusEvent::decode("[1,2,3]").is_err());
        assert!(RawStatusEvent::decode(r#"{"confirmed_amount":1}"#).is_err());
        assert!(RawStatusEvent::decode(r#"{"status":7}"#).is_err());
        assert!(RawStatusEvent::decode("").is_err());
    }

    #[test]
    fn test_frame_roundtrip_keeps_amount() {
        let event = RawStatusEvent::new("CO").with_confirmed_amount(3.0);
        let decoded = RawStatusEvent::decode(&event.to_frame()).unwrap();
        assert_eq!(decoded, event);
    }
}
