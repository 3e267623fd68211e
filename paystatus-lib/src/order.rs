//! Payment identifiers and the order-creation response.
//!
//! Orders are created by an external REST call. This module only models what
//! comes back so the identifier can be handed to the status channel and the
//! web url can be rendered as a link or QR code.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, non-empty identifier naming a payment order.
///
/// # Example
///
/// ```
/// use paystatus_lib::PaymentIdentifier;
///
/// let id = PaymentIdentifier::parse(" pay_123 ").unwrap();
/// assert_eq!(id.as_str(), "pay_123");
/// assert!(PaymentIdentifier::parse("   ").is_none());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentIdentifier(String);

impl PaymentIdentifier {
    /// Parse an identifier, returning `None` for empty or blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Status channel URL for this identifier under `endpoint_base`.
    pub fn status_url(&self, endpoint_base: &str) -> String {
        if endpoint_base.ends_with('/') {
            format!("{}{}", endpoint_base, self.0)
        } else {
            format!("{}/{}", endpoint_base, self.0)
        }
    }
}

impl fmt::Display for PaymentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Response body of the order-creation endpoint.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PaymentOrder {
    /// Identifier used to open the status channel.
    pub identifier: String,
    /// Hosted payment page for the payer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    /// Deposit address, when the order is already bound to a currency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Destination tag or memo for currencies that need one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_memo: Option<String>,
    /// Amount the merchant asked for, in fiat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output_amount: Option<f64>,
    /// Fiat currency code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiat: Option<String>,
    /// Merchant reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Wallet URI (e.g. `bitcoin:...`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_uri: Option<String>,
}

impl PaymentOrder {
    /// Parse an order-creation response body.
    pub fn from_json(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }

    /// The identifier, if the server returned a usable one.
    pub fn payment_identifier(&self) -> Option<PaymentIdentifier> {
        PaymentIdentifier::parse(&self.identifier)
    }

    /// Web url normalised for QR encoding: always carries a scheme.
    pub fn payment_link(&self) -> Option<String> {
        let url = self.web_url.as_deref()?.trim();
        if url.is_empty() {
            return None;
        }
        if url.starts_with("http") {
            Some(url.to_string())
        } else {
            Some(format!("https://{}", url))
        }
    }

    /// Host and path of the web url, as shown to the merchant.
    pub fn display_link(&self) -> Option<String> {
        let url = self.web_url.as_deref()?.trim();
        if url.is_empty() {
            return None;
        }
        let Some((_, rest)) = url.split_once("://") else {
            return Some(url.to_string());
        };
        let rest = rest.split(['?', '#']).next().unwrap_or(rest);
        if rest.is_empty() {
            return Some(url.to_string());
        }
        if rest.contains('/') {
            Some(rest.to_string())
        } else {
            Some(format!("{}/", rest))
        }
    }
}
