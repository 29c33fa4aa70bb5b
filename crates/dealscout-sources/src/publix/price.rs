//! Price text parsing for weekly-ad cards.

use std::sync::LazyLock;

use dealscout_core::round_cents;
use regex::Regex;

static MULTI_BUY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*for\s*\$?\s*(\d+(?:\.\d{1,2})?)").expect("valid multi-buy regex")
});

static CENTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})\s*¢").expect("valid cents regex"));

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$?\s*(\d{1,4}(?:,\d{3})*(?:\.\d{1,2})?)").expect("valid amount regex")
});

/// Parses a unit price out of card text.
///
/// Accepts `$3.99`, `3.99`, `$1.99 lb`, `99¢` and multi-buy forms such as
/// `2 for $5` (returned per unit, `2.50`). Returns `None` when no positive
/// price is present.
#[must_use]
pub fn parse_price_text(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let value = if let Some(caps) = MULTI_BUY_RE.captures(text) {
        let count: f64 = caps[1].parse().ok()?;
        let total: f64 = caps[2].parse().ok()?;
        if count <= 0.0 {
            return None;
        }
        total / count
    } else if let Some(caps) = CENTS_RE.captures(text) {
        caps[1].parse::<f64>().ok()? / 100.0
    } else {
        let caps = AMOUNT_RE.captures(text)?;
        caps[1].replace(',', "").parse().ok()?
    };

    let value = round_cents(value);
    (value > 0.0).then_some(value)
}
