//! In-page extraction scripts and the Rust side that turns their output into
//! [`ScrapedDeal`]s.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use regex::Regex;
use serde::Deserialize;

use super::price::parse_price_text;
use super::types::{ScrapedDeal, ScrapedDealType};
use super::PUBLIX_WEEKLY_AD_URL;
use crate::error::SourceError;

/// Any one of these marks the ad grid as rendered.
pub(crate) const CONTENT_SELECTORS: &[&str] = &[
    "[data-qa-automation='savings-card']",
    ".savings-content-wrapper",
    ".p-grid-item",
    "#weekly-ad-content",
];

/// Subresources not needed for extraction.
pub(crate) const BLOCKED_RESOURCE_PATTERNS: &[&str] = &[
    "*.css", "*.woff", "*.woff2", "*.ttf", "*.otf", "*.mp4", "*.webm", "*.mp3", "*.gif",
];

/// Cards flagged buy-one-get-one. Price text is the regular single-unit price.
pub(crate) const BOGO_SCRIPT: &str = r#"
(() => {
  const cards = document.querySelectorAll("[data-qa-automation='savings-card'], .p-grid-item");
  const out = [];
  for (const card of cards) {
    const text = (card.innerText || "").toLowerCase();
    if (!text.includes("buy 1 get 1") && !text.includes("bogo")) continue;
    const pick = (sel) => {
      const el = card.querySelector(sel);
      return el ? el.textContent.trim() : null;
    };
    const img = card.querySelector("img");
    out.push({
      title: pick(".p-savings-card__title, .title, h3"),
      description: pick(".p-savings-card__description, .description"),
      priceText: pick(".p-savings-card__regular-price, .regular-price, .price"),
      validText: pick(".p-savings-card__valid-dates, .valid-dates"),
      category: card.getAttribute("data-category"),
      itemId: card.getAttribute("data-item-id"),
      finePrint: pick(".p-savings-card__fine-print, .fine-print"),
      imageUrl: img ? img.src : null
    });
  }
  return out;
})()
"#;

/// Cards carrying both a was-price and a now-price.
pub(crate) const DISCOUNT_SCRIPT: &str = r#"
(() => {
  const cards = document.querySelectorAll("[data-qa-automation='savings-card'], .p-grid-item");
  const out = [];
  for (const card of cards) {
    const pick = (sel) => {
      const el = card.querySelector(sel);
      return el ? el.textContent.trim() : null;
    };
    const original = pick(".p-savings-card__original-price, .original-price, .was-price");
    const sale = pick(".p-savings-card__sale-price, .sale-price, .now-price");
    if (!original || !sale) continue;
    const img = card.querySelector("img");
    out.push({
      title: pick(".p-savings-card__title, .title, h3"),
      description: pick(".p-savings-card__description, .description"),
      originalText: original,
      saleText: sale,
      validText: pick(".p-savings-card__valid-dates, .valid-dates"),
      category: card.getAttribute("data-category"),
      itemId: card.getAttribute("data-item-id"),
      finePrint: pick(".p-savings-card__fine-print, .fine-print"),
      imageUrl: img ? img.src : null
    });
  }
  return out;
})()
"#;

static VALIDITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d{1,2})/(\d{1,2})(?:/(\d{2,4}))?\s*(?:-|to|through|thru)\s*(\d{1,2})/(\d{1,2})(?:/(\d{2,4}))?",
    )
    .expect("valid validity regex")
});

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawCard {
    title: Option<String>,
    description: Option<String>,
    price_text: Option<String>,
    original_text: Option<String>,
    sale_text: Option<String>,
    valid_text: Option<String>,
    category: Option<String>,
    item_id: Option<String>,
    fine_print: Option<String>,
    image_url: Option<String>,
}

impl RawCard {
    fn title(&self) -> Option<String> {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
    }

    fn into_deal(
        self,
        title: String,
        original_price: f64,
        sale_price: f64,
        deal_type: ScrapedDealType,
        now: DateTime<Utc>,
    ) -> ScrapedDeal {
        let window = self
            .valid_text
            .as_deref()
            .and_then(|t| parse_validity(t, now));
        ScrapedDeal {
            description: self.description.unwrap_or_default(),
            title,
            original_price,
            sale_price,
            deal_type,
            valid_from: window.map(|(from, _)| from),
            valid_until: window.map(|(_, until)| until),
            category: self.category.filter(|c| !c.trim().is_empty()),
            image_url: self.image_url.filter(|u| !u.trim().is_empty()),
            item_id: self.item_id.filter(|i| !i.trim().is_empty()),
            restrictions: self.fine_print.filter(|f| !f.trim().is_empty()),
            source_url: PUBLIX_WEEKLY_AD_URL.to_owned(),
        }
    }
}

fn decode_cards(value: serde_json::Value, pass: &str) -> Result<Vec<RawCard>, SourceError> {
    serde_json::from_value(value)
        .map_err(|e| SourceError::Extraction(format!("{pass} pass returned unexpected shape: {e}")))
}

/// BOGO cards become half-price deals against their regular price.
pub(crate) fn parse_bogo_cards(
    value: serde_json::Value,
    now: DateTime<Utc>,
) -> Result<Vec<ScrapedDeal>, SourceError> {
    let cards = decode_cards(value, "bogo")?;
    Ok(cards
        .into_iter()
        .filter_map(|card| {
            let title = card.title()?;
            let original = card.price_text.as_deref().and_then(parse_price_text)?;
            let sale = dealscout_core::round_cents(original / 2.0);
            Some(card.into_deal(title, original, sale, ScrapedDealType::Bogo, now))
        })
        .collect())
}

/// Discount cards need both prices; pairs where the sale is not below the
/// original are dropped.
pub(crate) fn parse_discount_cards(
    value: serde_json::Value,
    now: DateTime<Utc>,
) -> Result<Vec<ScrapedDeal>, SourceError> {
    let cards = decode_cards(value, "discount")?;
    Ok(cards
        .into_iter()
        .filter_map(|card| {
            let title = card.title()?;
            let original = card.original_text.as_deref().and_then(parse_price_text)?;
            let sale = card.sale_text.as_deref().and_then(parse_price_text)?;
            if sale >= original {
                tracing::debug!(%title, original, sale, "discarding card with no real discount");
                return None;
            }
            Some(card.into_deal(title, original, sale, ScrapedDealType::Discount, now))
        })
        .collect())
}

/// Reads `M/D - M/D` style windows. The end date is inclusive, so the window
/// closes at midnight UTC after it. Years default to `now`'s year, rolling
/// the end into the next year when it would precede the start.
pub(crate) fn parse_validity(
    text: &str,
    now: DateTime<Utc>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let caps = VALIDITY_RE.captures(text)?;
    let year_of = |idx: usize, fallback: i32| -> Option<i32> {
        match caps.get(idx) {
            Some(m) => {
                let y: i32 = m.as_str().parse().ok()?;
                Some(if y < 100 { 2000 + y } else { y })
            }
            None => Some(fallback),
        }
    };
    let num = |idx: usize| -> Option<u32> { caps.get(idx)?.as_str().parse().ok() };

    let start_year = year_of(3, now.year())?;
    let start = NaiveDate::from_ymd_opt(start_year, num(1)?, num(2)?)?;

    let explicit_end_year = caps.get(6).is_some();
    let mut end = NaiveDate::from_ymd_opt(year_of(6, start_year)?, num(4)?, num(5)?)?;
    if end < start && !explicit_end_year {
        end = NaiveDate::from_ymd_opt(start_year + 1, end.month(), end.day())?;
    }
    if end < start {
        return None;
    }

    let from = start.and_hms_opt(0, 0, 0)?.and_utc();
    let until = end.and_hms_opt(0, 0, 0)?.and_utc() + Duration::days(1);
    Some((from, until))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-10T15:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn bogo_cards_are_half_price() {
        let value = json!([
            { "title": "Publix Ice Cream", "priceText": "$5.98", "validText": "Valid 3/12 - 3/18" },
            { "title": "  ", "priceText": "$2.00" },
            { "title": "No price" }
        ]);
        let deals = parse_bogo_cards(value, now()).unwrap();
        assert_eq!(deals.len(), 1);
        let deal = &deals[0];
        assert_eq!(deal.deal_type, ScrapedDealType::Bogo);
        assert!((deal.original_price - 5.98).abs() < 1e-9);
        assert!((deal.sale_price - 2.99).abs() < 1e-9);
        assert_eq!(
            deal.valid_until.unwrap(),
            DateTime::parse_from_rfc3339("2026-03-19T00:00:00Z").unwrap()
        );
    }

    #[test]
    fn discount_cards_require_both_prices_and_a_real_discount() {
        let value = json!([
            { "title": "Chicken Breast", "originalText": "$6.49 lb", "saleText": "$3.99 lb" },
            { "title": "Only sale", "saleText": "$1.00" },
            { "title": "Same price", "originalText": "$2.00", "saleText": "$2.00" },
            { "title": "Multi", "originalText": "$3.29", "saleText": "2 for $5" }
        ]);
        let deals = parse_discount_cards(value, now()).unwrap();
        let titles: Vec<&str> = deals.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Chicken Breast", "Multi"]);
        assert!((deals[1].sale_price - 2.5).abs() < 1e-9);
        assert!(deals[0].valid_from.is_none());
    }

    #[test]
    fn non_array_output_is_an_extraction_error() {
        let err = parse_discount_cards(json!({"oops": true}), now()).unwrap_err();
        assert!(matches!(err, SourceError::Extraction(_)));
    }

    #[test]
    fn validity_rolls_over_year_end() {
        let dec = DateTime::parse_from_rfc3339("2026-12-28T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let (from, until) = parse_validity("12/30 - 1/5", dec).unwrap();
        assert_eq!(from.year(), 2026);
        assert_eq!(until.year(), 2027);
        assert_eq!(until.month(), 1);
        assert_eq!(until.day(), 6);
    }

    #[test]
    fn unreadable_validity_is_none() {
        assert!(parse_validity("this week only", now()).is_none());
        assert!(parse_validity("13/40 - 13/41", now()).is_none());
    }
}
