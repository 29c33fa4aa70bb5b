//! Maps Kroger wire records onto canonical [`NewDeal`]s.

use dealscout_core::{round_cents, DealType, NewDeal, StoreChain};

use super::types::{CouponValueType, KrogerCoupon, KrogerPromotion};

pub(crate) const COUPONS_PAGE_URL: &str = "https://www.kroger.com/savings/cl/coupons/";
pub(crate) const PROMOTIONS_PAGE_URL: &str = "https://www.kroger.com/weeklyad";

/// Prices a coupon against its regular price.
///
/// Returns `None` for coupons without a usable regular price.
#[must_use]
pub fn coupon_to_deal(coupon: &KrogerCoupon) -> Option<NewDeal> {
    let original = coupon.regular_price.filter(|p| *p > 0.0)?;

    let (sale, pct, deal_type) = match coupon.value_type {
        CouponValueType::DollarOff => (
            (original - coupon.value).max(0.0),
            coupon.value / original * 100.0,
            DealType::Coupon,
        ),
        CouponValueType::PercentOff => (
            original * (1.0 - coupon.value / 100.0),
            coupon.value,
            DealType::Coupon,
        ),
        CouponValueType::Bogo => (original * 0.5, 50.0, DealType::Bogo),
    };

    let description = match &coupon.brand {
        Some(brand) if !brand.trim().is_empty() => format!("{brand}: {}", coupon.description),
        _ => coupon.description.clone(),
    };

    Some(NewDeal {
        chain: StoreChain::Kroger,
        title: coupon.description.clone(),
        description,
        original_price: round_cents(original),
        sale_price: round_cents(sale),
        discount_percentage: round_cents(pct),
        deal_type,
        valid_from: coupon.start_date,
        valid_until: coupon.expiration_date,
        category: coupon.category.clone().unwrap_or_default(),
        item_ids: coupon.upcs.clone(),
        restrictions: coupon.terms.clone(),
        image_url: coupon.image_url.clone(),
        source_url: Some(format!("{COUPONS_PAGE_URL}{}", coupon.id)),
        deal_key: String::new(),
    })
}

/// One DISCOUNT deal per promoted line item.
#[must_use]
pub fn promotion_to_deals(promotion: &KrogerPromotion) -> Vec<NewDeal> {
    promotion
        .items
        .iter()
        .map(|item| {
            let description = promotion
                .description
                .clone()
                .unwrap_or_else(|| promotion.title.clone());
            NewDeal {
                chain: StoreChain::Kroger,
                title: item
                    .description
                    .clone()
                    .unwrap_or_else(|| promotion.title.clone()),
                description,
                original_price: round_cents(item.regular_price),
                sale_price: round_cents(item.promo_price),
                discount_percentage: 0.0,
                deal_type: DealType::Discount,
                valid_from: promotion.start_date,
                valid_until: promotion.end_date,
                category: promotion.category.clone().unwrap_or_default(),
                item_ids: vec![item.upc.clone()],
                restrictions: promotion.terms.clone(),
                image_url: item.image_url.clone(),
                source_url: Some(format!("{PROMOTIONS_PAGE_URL}?promotion={}", promotion.id)),
                deal_key: String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::kroger::types::PromotionItem;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn coupon(value_type: CouponValueType, value: f64, regular: Option<f64>) -> KrogerCoupon {
        KrogerCoupon {
            id: "c-1".to_owned(),
            description: "Save on Cheerios".to_owned(),
            brand: Some("General Mills".to_owned()),
            category: Some("Cereal".to_owned()),
            value,
            value_type,
            regular_price: regular,
            start_date: ts("2026-03-01T00:00:00Z"),
            expiration_date: ts("2026-03-08T00:00:00Z"),
            upcs: vec!["0001600027528".to_owned()],
            image_url: None,
            terms: Some("Limit 1".to_owned()),
        }
    }

    #[test]
    fn dollar_off_subtracts_value() {
        let deal = coupon_to_deal(&coupon(CouponValueType::DollarOff, 1.0, Some(4.0))).unwrap();
        assert!((deal.sale_price - 3.0).abs() < 1e-9);
        assert!((deal.discount_percentage - 25.0).abs() < 1e-9);
        assert_eq!(deal.deal_type, DealType::Coupon);
        assert_eq!(deal.description, "General Mills: Save on Cheerios");
    }

    #[test]
    fn dollar_off_never_goes_negative() {
        let deal = coupon_to_deal(&coupon(CouponValueType::DollarOff, 9.0, Some(4.0))).unwrap();
        assert!(deal.sale_price.abs() < 1e-9);
    }

    #[test]
    fn percent_off_scales_price() {
        let deal = coupon_to_deal(&coupon(CouponValueType::PercentOff, 20.0, Some(5.0))).unwrap();
        assert!((deal.sale_price - 4.0).abs() < 1e-9);
        assert!((deal.discount_percentage - 20.0).abs() < 1e-9);
    }

    #[test]
    fn bogo_is_half_price() {
        let deal = coupon_to_deal(&coupon(CouponValueType::Bogo, 0.0, Some(6.98))).unwrap();
        assert!((deal.sale_price - 3.49).abs() < 1e-9);
        assert!((deal.discount_percentage - 50.0).abs() < 1e-9);
        assert_eq!(deal.deal_type, DealType::Bogo);
    }

    #[test]
    fn coupon_without_regular_price_is_skipped() {
        assert!(coupon_to_deal(&coupon(CouponValueType::DollarOff, 1.0, None)).is_none());
        assert!(coupon_to_deal(&coupon(CouponValueType::DollarOff, 1.0, Some(0.0))).is_none());
    }

    #[test]
    fn promotion_expands_per_item() {
        let promotion = KrogerPromotion {
            id: "p-9".to_owned(),
            title: "Dairy Days".to_owned(),
            description: None,
            category: Some("Dairy".to_owned()),
            start_date: ts("2026-03-01T00:00:00Z"),
            end_date: ts("2026-03-08T00:00:00Z"),
            terms: None,
            items: vec![
                PromotionItem {
                    upc: "111".to_owned(),
                    description: Some("Whole Milk".to_owned()),
                    regular_price: 3.99,
                    promo_price: 2.99,
                    image_url: None,
                },
                PromotionItem {
                    upc: "222".to_owned(),
                    description: None,
                    regular_price: 5.49,
                    promo_price: 4.49,
                    image_url: None,
                },
            ],
        };
        let deals = promotion_to_deals(&promotion);
        assert_eq!(deals.len(), 2);
        assert_eq!(deals[0].title, "Whole Milk");
        assert_eq!(deals[1].title, "Dairy Days");
        assert_eq!(deals[1].item_ids, vec!["222".to_owned()]);
        assert!(deals.iter().all(|d| d.deal_type == DealType::Discount));
    }
}
