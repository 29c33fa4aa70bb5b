//! Converts source output into validated, normalized [`NewDeal`]s and decides
//! whether a re-sighted deal changed materially.

use chrono::{DateTime, Duration, Utc};
use dealscout_core::{
    discount_percentage, round_cents, Deal, DealType, DealUpdate, NewDeal, StoreChain,
    DEFAULT_CATEGORY,
};
use dealscout_sources::{RawDeal, ScrapedDeal, ScrapedDealType};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Scraped deals with no readable window are assumed to run one ad week.
pub const DEFAULT_SCRAPED_VALIDITY_DAYS: i64 = 7;

/// Price movements at or below this many dollars are ignored.
pub const PRICE_CHANGE_TOLERANCE: f64 = 0.01;

/// Every rule a deal broke.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid deal '{title}': {}", .reasons.join("; "))]
pub struct ValidationError {
    pub title: String,
    pub reasons: Vec<String>,
}

/// Brings either source shape into the canonical form.
#[must_use]
pub fn to_canonical(raw: RawDeal, source_url: &str, now: DateTime<Utc>) -> NewDeal {
    match raw {
        RawDeal::Canonical(mut deal) => {
            if deal.source_url.is_none() {
                deal.source_url = Some(source_url.to_owned());
            }
            deal
        }
        RawDeal::Scraped(scraped) => scraped_to_canonical(scraped, now),
    }
}

fn scraped_to_canonical(scraped: ScrapedDeal, now: DateTime<Utc>) -> NewDeal {
    let (valid_from, valid_until) = match (scraped.valid_from, scraped.valid_until) {
        (Some(from), Some(until)) => (from, until),
        _ => (now, now + Duration::days(DEFAULT_SCRAPED_VALIDITY_DAYS)),
    };
    let deal_type = match scraped.deal_type {
        ScrapedDealType::Bogo => DealType::Bogo,
        ScrapedDealType::Discount => DealType::Discount,
    };
    NewDeal {
        chain: StoreChain::Publix,
        discount_percentage: discount_percentage(scraped.original_price, scraped.sale_price),
        title: scraped.title,
        description: scraped.description,
        original_price: scraped.original_price,
        sale_price: scraped.sale_price,
        deal_type,
        valid_from,
        valid_until,
        category: scraped.category.unwrap_or_default(),
        item_ids: scraped.item_id.into_iter().collect(),
        restrictions: scraped.restrictions,
        image_url: scraped.image_url,
        source_url: Some(scraped.source_url),
        deal_key: String::new(),
    }
}

/// Checks the canonical invariants, collecting every violation. Run it on
/// the output of [`normalize`] so the checks see cent-rounded prices.
///
/// # Errors
///
/// Returns [`ValidationError`] listing each broken rule.
pub fn validate(deal: &NewDeal) -> Result<(), ValidationError> {
    let mut reasons = Vec::new();

    if deal.title.trim().is_empty() {
        reasons.push("title is required".to_owned());
    }
    if !deal.sale_price.is_finite() || deal.sale_price <= 0.0 {
        reasons.push("sale price must be greater than zero".to_owned());
    }
    if !deal.original_price.is_finite() || deal.original_price <= 0.0 {
        reasons.push("original price must be greater than zero".to_owned());
    }
    if deal.sale_price > deal.original_price {
        reasons.push("sale price cannot exceed original price".to_owned());
    }
    if deal.valid_from >= deal.valid_until {
        reasons.push("valid from must be before valid until".to_owned());
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(ValidationError {
            title: deal.title.trim().to_owned(),
            reasons,
        })
    }
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Trims text, rounds prices to cents, recomputes the discount, defaults the
/// category, drops blank item ids, and assigns the deal key.
#[must_use]
pub fn normalize(mut deal: NewDeal) -> NewDeal {
    deal.title = deal.title.trim().to_owned();
    deal.description = deal.description.trim().to_owned();
    deal.category = match deal.category.trim() {
        "" => DEFAULT_CATEGORY.to_owned(),
        other => other.to_owned(),
    };
    deal.original_price = round_cents(deal.original_price);
    deal.sale_price = round_cents(deal.sale_price);
    deal.discount_percentage = discount_percentage(deal.original_price, deal.sale_price);

    let mut item_ids: Vec<String> = Vec::with_capacity(deal.item_ids.len());
    for id in deal.item_ids.drain(..) {
        let id = id.trim().to_owned();
        if !id.is_empty() && !item_ids.contains(&id) {
            item_ids.push(id);
        }
    }
    deal.item_ids = item_ids;

    deal.restrictions = clean_optional(deal.restrictions);
    deal.image_url = clean_optional(deal.image_url);
    deal.source_url = clean_optional(deal.source_url);
    deal.deal_key = deal_key(&deal);
    deal
}

/// SHA-256 hex of `chain | lower(title) | lower(category) | sorted item ids`.
#[must_use]
pub fn deal_key(deal: &NewDeal) -> String {
    let mut ids: Vec<&str> = deal.item_ids.iter().map(String::as_str).collect();
    ids.sort_unstable();
    let input = format!(
        "{}|{}|{}|{}",
        deal.chain.as_str(),
        deal.title.to_lowercase(),
        deal.category.to_lowercase(),
        ids.join(",")
    );
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// The update needed to bring `existing` in line with `incoming`, or an
/// empty update when nothing material changed.
///
/// Material: either price moving by more than a cent, any date change, or a
/// change to title, description or restrictions. Image changes ride along
/// with a material update but never trigger one.
#[must_use]
pub fn material_changes(existing: &Deal, incoming: &NewDeal) -> DealUpdate {
    let mut update = DealUpdate::default();

    let sale_moved = (existing.sale_price - incoming.sale_price).abs() > PRICE_CHANGE_TOLERANCE;
    let original_moved =
        (existing.original_price - incoming.original_price).abs() > PRICE_CHANGE_TOLERANCE;
    if sale_moved {
        update.sale_price = Some(incoming.sale_price);
    }
    if original_moved {
        update.original_price = Some(incoming.original_price);
    }
    if sale_moved || original_moved {
        update.discount_percentage = Some(incoming.discount_percentage);
    }
    if existing.valid_from != incoming.valid_from {
        update.valid_from = Some(incoming.valid_from);
    }
    if existing.valid_until != incoming.valid_until {
        update.valid_until = Some(incoming.valid_until);
    }
    if existing.title != incoming.title {
        update.title = Some(incoming.title.clone());
    }
    if existing.description != incoming.description {
        update.description = Some(incoming.description.clone());
    }
    if existing.restrictions != incoming.restrictions {
        update.restrictions = Some(incoming.restrictions.clone());
    }

    if !update.is_empty() && existing.image_url != incoming.image_url {
        update.image_url = Some(incoming.image_url.clone());
    }
    update
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
