//! Shareable payment link and QR code

use anyhow::{anyhow, Result};
use paystatus_lib::PaymentOrder;

use crate::ui;

pub fn run(web_url: &str, show_qr: bool, _verbose: bool) -> Result<()> {
    let order = PaymentOrder {
        web_url: Some(web_url.to_string()),
        ..Default::default()
    };
    let link = order
        .payment_link()
        .ok_or_else(|| anyhow!("web url must not be empty"))?;
    let display = order.display_link().unwrap_or_else(|| link.clone());

    ui::header("Payment Link");
    ui::key_value("Share", &display);
    ui::key_value("Link", &link);

    if show_qr {
        ui::qr_code(&link)?;
        ui::separator();
        ui::info("Scan to open the payment page");
    }

    Ok(())
}
