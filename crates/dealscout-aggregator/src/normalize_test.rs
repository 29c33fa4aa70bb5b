use chrono::TimeZone;
use uuid::Uuid;

use super::*;

fn t(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, 0, 0, 0).unwrap()
}

fn deal() -> NewDeal {
    NewDeal {
        chain: StoreChain::Kroger,
        title: "  Large Eggs ".to_owned(),
        description: " Dozen, grade A ".to_owned(),
        original_price: 4.499,
        sale_price: 2.994,
        discount_percentage: 0.0,
        deal_type: DealType::Discount,
        valid_from: t(1),
        valid_until: t(8),
        category: "  ".to_owned(),
        item_ids: vec![" 111 ".to_owned(), String::new(), "111".to_owned(), "222".to_owned()],
        restrictions: Some("   ".to_owned()),
        image_url: None,
        source_url: None,
        deal_key: String::new(),
    }
}

#[test]
fn validation_names_each_broken_rule() {
    let mut bad = deal();
    bad.title = "   ".to_owned();
    bad.sale_price = 0.0;
    bad.original_price = -1.0;
    bad.valid_from = t(8);
    bad.valid_until = t(1);

    let err = validate(&bad).unwrap_err();
    assert_eq!(
        err.reasons,
        vec![
            "title is required".to_owned(),
            "sale price must be greater than zero".to_owned(),
            "original price must be greater than zero".to_owned(),
            "sale price cannot exceed original price".to_owned(),
            "valid from must be before valid until".to_owned(),
        ]
    );
}

#[test]
fn sale_above_original_is_rejected() {
    let mut bad = deal();
    bad.sale_price = 5.0;
    let err = validate(&bad).unwrap_err();
    assert_eq!(err.reasons, vec!["sale price cannot exceed original price".to_owned()]);
    assert!(err.to_string().contains("Large Eggs"));
}

#[test]
fn equal_dates_are_rejected() {
    let mut bad = deal();
    bad.valid_until = bad.valid_from;
    assert!(validate(&bad).is_err());
}

#[test]
fn sub_cent_sale_price_is_rejected_once_rounded() {
    let mut tiny = deal();
    tiny.sale_price = 0.004;
    assert!(validate(&tiny).is_ok());

    let err = validate(&normalize(tiny)).unwrap_err();
    assert_eq!(err.reasons, vec!["sale price must be greater than zero".to_owned()]);
    assert_eq!(err.to_string(), "invalid deal 'Large Eggs': sale price must be greater than zero");
}

#[test]
fn valid_deal_passes() {
    assert!(validate(&deal()).is_ok());
}

#[test]
fn normalize_cleans_fields() {
    let deal = normalize(deal());
    assert_eq!(deal.title, "Large Eggs");
    assert_eq!(deal.description, "Dozen, grade A");
    assert_eq!(deal.category, DEFAULT_CATEGORY);
    assert!((deal.original_price - 4.50).abs() < 1e-9);
    assert!((deal.sale_price - 2.99).abs() < 1e-9);
    assert!((deal.discount_percentage - 33.56).abs() < 1e-9);
    assert_eq!(deal.item_ids, vec!["111".to_owned(), "222".to_owned()]);
    assert!(deal.restrictions.is_none());
    assert_eq!(deal.deal_key.len(), 64);
}

#[test]
fn deal_key_ignores_case_and_item_order() {
    let a = normalize(deal());
    let mut other = deal();
    other.title = "LARGE EGGS".to_owned();
    other.item_ids = vec!["222".to_owned(), "111".to_owned()];
    let b = normalize(other);
    assert_eq!(a.deal_key, b.deal_key);

    let mut publix = deal();
    publix.chain = StoreChain::Publix;
    assert_ne!(a.deal_key, normalize(publix).deal_key);
}

#[test]
fn scraped_deal_without_window_runs_one_week() {
    let scraped = ScrapedDeal {
        title: "Ice Cream".to_owned(),
        description: String::new(),
        original_price: 6.0,
        sale_price: 3.0,
        deal_type: ScrapedDealType::Bogo,
        valid_from: None,
        valid_until: None,
        category: None,
        image_url: None,
        item_id: Some("sku-9".to_owned()),
        restrictions: None,
        source_url: "https://www.publix.com/savings/weekly-ad/view-all".to_owned(),
    };
    let now = t(10);
    let canonical = to_canonical(RawDeal::Scraped(scraped), "ignored", now);
    assert_eq!(canonical.chain, StoreChain::Publix);
    assert_eq!(canonical.deal_type, DealType::Bogo);
    assert_eq!(canonical.valid_from, now);
    assert_eq!(canonical.valid_until, t(17));
    assert!((canonical.discount_percentage - 50.0).abs() < 1e-9);
    assert_eq!(canonical.item_ids, vec!["sku-9".to_owned()]);
}

#[test]
fn canonical_deal_gets_source_url_fallback() {
    let canonical = to_canonical(RawDeal::Canonical(deal()), "https://api.kroger.com", t(1));
    assert_eq!(canonical.source_url.as_deref(), Some("https://api.kroger.com"));
}

fn stored(from: &NewDeal) -> Deal {
    Deal::from_new(Uuid::new_v4(), from.clone(), t(1))
}

#[test]
fn sub_cent_price_drift_is_not_material() {
    let incoming = normalize(deal());
    let existing = stored(&incoming);
    let mut drifted = incoming.clone();
    drifted.sale_price += 0.005;
    drifted.image_url = Some("https://img/new.png".to_owned());
    assert!(material_changes(&existing, &drifted).is_empty());
}

#[test]
fn price_change_updates_price_and_discount() {
    let incoming = normalize(deal());
    let existing = stored(&incoming);
    let mut cheaper = incoming.clone();
    cheaper.sale_price = 2.49;
    cheaper.discount_percentage = discount_percentage(cheaper.original_price, 2.49);
    cheaper.image_url = Some("https://img/new.png".to_owned());

    let update = material_changes(&existing, &cheaper);
    assert_eq!(update.sale_price, Some(2.49));
    assert!(update.original_price.is_none());
    assert!(update.discount_percentage.is_some());
    assert_eq!(update.image_url, Some(Some("https://img/new.png".to_owned())));
}

#[test]
fn date_and_text_changes_are_material() {
    let incoming = normalize(deal());
    let existing = stored(&incoming);

    let mut extended = incoming.clone();
    extended.valid_until = t(15);
    assert_eq!(material_changes(&existing, &extended).valid_until, Some(t(15)));

    let mut reworded = incoming.clone();
    reworded.restrictions = Some("Limit 2".to_owned());
    assert_eq!(
        material_changes(&existing, &reworded).restrictions,
        Some(Some("Limit 2".to_owned()))
    );
}
