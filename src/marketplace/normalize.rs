//! Normalization of raw API payloads into [`RestrictionStatus`] and [`OfferSummary`].
//!
//! The upstream schema is not stable: the same data shows up at the top level
//! or wrapped in `payload`, and field casing differs between API versions.
//! Each function below reads its source fields in a fixed priority order.

use crate::error::RemoteError;
use crate::marketplace::models::{Money, OfferSummary, RestrictionStatus};
use serde_json::Value;

const APPROVAL_REQUIRED: &str = "APPROVAL_REQUIRED";

/// Normalizes a listings-restrictions response for one marketplace.
///
/// Priority for the restriction list:
/// 1. top-level `restrictions`
/// 2. `payload.restrictions`
/// 3. `payload` when it is itself an array
///
/// Entries tagged with a different `marketplaceId` are ignored. An empty list
/// means the listing is open. Any remaining entry closes it, and any
/// `APPROVAL_REQUIRED` reason marks it as approval required.
pub fn restrictions(body: &Value, marketplace_id: &str) -> Result<RestrictionStatus, RemoteError> {
    let list = body
        .get("restrictions")
        .and_then(Value::as_array)
        .or_else(|| body.pointer("/payload/restrictions").and_then(Value::as_array))
        .or_else(|| body.get("payload").and_then(Value::as_array))
        .ok_or_else(|| RemoteError::Decode("no restrictions list in response".to_string()))?;

    let mut status = RestrictionStatus::open();
    let mut any_restriction = false;
    let mut any_approval = false;

    for entry in list {
        let scoped_elsewhere = entry
            .get("marketplaceId")
            .and_then(Value::as_str)
            .is_some_and(|id| id != marketplace_id);
        if scoped_elsewhere {
            continue;
        }

        let reasons = entry.get("reasons").and_then(Value::as_array);
        let Some(reasons) = reasons.filter(|r| !r.is_empty()) else {
            // A restriction entry without reasons still blocks listing
            any_restriction = true;
            continue;
        };

        for reason in reasons {
            any_restriction = true;
            let code = reason.get("reasonCode").and_then(Value::as_str);
            if code == Some(APPROVAL_REQUIRED) {
                any_approval = true;
            }
            let text = reason.get("message").and_then(Value::as_str).or(code);
            if let Some(text) = text {
                status.reasons.push(text.to_string());
            }
        }
    }

    if any_restriction {
        status.allowed = false;
        status.approval_required = any_approval;
    }

    Ok(status)
}

/// Normalizes an item-offers response.
///
/// The body is `payload` when present, otherwise the top level.
///
/// Offer count: `Summary.TotalOfferCount`, then the sum of
/// `Summary.NumberOfOffers[].OfferCount`, then the length of `Offers`.
///
/// Buy box: first `Summary.BuyBoxPrices[]` entry, `LandedPrice` before
/// `ListingPrice`.
///
/// Lowest price: minimum over `Summary.LowestPrices[]` (`LandedPrice` before
/// `ListingPrice`), falling back to the minimum `ListingPrice + Shipping`
/// over `Offers[]`.
pub fn offers(body: &Value) -> Result<OfferSummary, RemoteError> {
    if !body.is_object() {
        return Err(RemoteError::Decode("offers response is not an object".to_string()));
    }

    let root = body.get("payload").filter(|p| p.is_object()).unwrap_or(body);
    let summary = field(root, "Summary");
    let offers = field(root, "Offers").and_then(Value::as_array);

    let offer_count = summary
        .and_then(|s| field(s, "TotalOfferCount"))
        .and_then(as_u32)
        .or_else(|| {
            let counts = summary.and_then(|s| field(s, "NumberOfOffers")).and_then(Value::as_array)?;
            Some(counts.iter().filter_map(|c| field(c, "OfferCount").and_then(as_u32)).sum())
        })
        .or_else(|| offers.map(|o| o.len() as u32))
        .unwrap_or(0);

    let buy_box_price = summary
        .and_then(|s| field(s, "BuyBoxPrices"))
        .and_then(Value::as_array)
        .and_then(|prices| prices.first())
        .and_then(landed_or_listing);

    let lowest_price = summary
        .and_then(|s| field(s, "LowestPrices"))
        .and_then(Value::as_array)
        .and_then(|prices| cheapest(prices.iter().filter_map(landed_or_listing)))
        .or_else(|| cheapest(offers?.iter().filter_map(offer_total)));

    Ok(OfferSummary { available: offer_count > 0, offer_count, lowest_price, buy_box_price })
}

/// Reads `PascalCase` keys, falling back to the `camelCase` spelling.
fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key).or_else(|| {
        let mut chars = key.chars();
        let first = chars.next()?;
        let camel: String = first.to_lowercase().chain(chars).collect();
        value.get(camel)
    })
}

fn as_u32(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|n| u32::try_from(n).ok())
}

fn money(value: &Value) -> Option<Money> {
    let amount = field(value, "Amount")?;
    let amount = amount.as_f64().or_else(|| amount.as_str()?.trim().parse().ok())?;
    let currency = field(value, "CurrencyCode").and_then(Value::as_str).unwrap_or_default();
    Some(Money::new(amount, currency))
}

fn landed_or_listing(entry: &Value) -> Option<Money> {
    field(entry, "LandedPrice").and_then(money).or_else(|| field(entry, "ListingPrice").and_then(money))
}

fn offer_total(offer: &Value) -> Option<Money> {
    let mut total = field(offer, "ListingPrice").and_then(money)?;
    if let Some(shipping) = field(offer, "Shipping").and_then(money) {
        total.amount += shipping.amount;
    }
    Some(total)
}

fn cheapest(prices: impl Iterator<Item = Money>) -> Option<Money> {
    prices.min_by(|a, b| a.amount.total_cmp(&b.amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DE: &str = "A1PA6795UKMFR9";

    #[test]
    fn test_restriction_shapes() {
        // (case, body, allowed, approval_required, reasons)
        let cases = vec![
            ("empty top-level list", json!({ "restrictions": [] }), true, false, 0),
            ("empty payload list", json!({ "payload": { "restrictions": [] } }), true, false, 0),
            ("payload is the list", json!({ "payload": [] }), true, false, 0),
            (
                "approval required",
                json!({ "restrictions": [{
                    "marketplaceId": DE,
                    "conditionType": "new_new",
                    "reasons": [{ "reasonCode": "APPROVAL_REQUIRED", "message": "You need approval" }]
                }]}),
                false,
                true,
                1,
            ),
            (
                "not eligible",
                json!({ "restrictions": [{
                    "marketplaceId": DE,
                    "reasons": [{ "reasonCode": "NOT_ELIGIBLE", "message": "Not eligible" }]
                }]}),
                false,
                false,
                1,
            ),
            (
                "mixed reasons still need approval",
                json!({ "payload": { "restrictions": [{
                    "reasons": [
                        { "reasonCode": "APPROVAL_REQUIRED", "message": "Approval" },
                        { "reasonCode": "ASIN_NOT_FOUND" }
                    ]
                }]}}),
                false,
                true,
                2,
            ),
            (
                "approval in a later entry",
                json!({ "restrictions": [
                    { "marketplaceId": DE, "reasons": [{ "reasonCode": "NOT_ELIGIBLE" }] },
                    { "marketplaceId": DE, "reasons": [{ "reasonCode": "APPROVAL_REQUIRED" }] }
                ]}),
                false,
                true,
                2,
            ),
            (
                "other marketplace ignored",
                json!({ "restrictions": [{
                    "marketplaceId": "A1F83G8C2ARO7P",
                    "reasons": [{ "reasonCode": "NOT_ELIGIBLE", "message": "UK only" }]
                }]}),
                true,
                false,
                0,
            ),
            (
                "entry without reasons",
                json!({ "restrictions": [{ "marketplaceId": DE, "reasons": [] }] }),
                false,
                false,
                0,
            ),
        ];

        for (name, body, allowed, approval, reasons) in cases {
            let status = restrictions(&body, DE).unwrap_or_else(|e| panic!("{}: {}", name, e));
            assert_eq!(status.allowed, allowed, "{}", name);
            assert_eq!(status.approval_required, approval, "{}", name);
            assert_eq!(status.reasons.len(), reasons, "{}", name);
        }
    }

    #[test]
    fn test_restriction_reason_falls_back_to_code() {
        let body = json!({ "restrictions": [{ "reasons": [{ "reasonCode": "ASIN_NOT_FOUND" }] }] });
        let status = restrictions(&body, DE).unwrap();
        assert_eq!(status.reasons, vec!["ASIN_NOT_FOUND"]);
    }

    #[test]
    fn test_restriction_unrecognized_shape() {
        for body in [json!({}), json!({ "payload": {} }), json!("nope"), json!(null)] {
            assert!(matches!(restrictions(&body, DE), Err(RemoteError::Decode(_))), "{}", body);
        }
    }

    #[test]
    fn test_offer_shapes() {
        // (case, body, offer_count, lowest, buy_box)
        let cases = vec![
            (
                "full summary",
                json!({ "payload": { "Summary": {
                    "TotalOfferCount": 4,
                    "LowestPrices": [
                        { "LandedPrice": { "Amount": 21.5, "CurrencyCode": "EUR" } },
                        { "LandedPrice": { "Amount": 19.99, "CurrencyCode": "EUR" } }
                    ],
                    "BuyBoxPrices": [{
                        "LandedPrice": { "Amount": 22.0, "CurrencyCode": "EUR" },
                        "ListingPrice": { "Amount": 20.0, "CurrencyCode": "EUR" }
                    }]
                }}}),
                4,
                Some(19.99),
                Some(22.0),
            ),
            (
                "count from NumberOfOffers",
                json!({ "payload": { "Summary": {
                    "NumberOfOffers": [
                        { "condition": "new", "fulfillmentChannel": "Amazon", "OfferCount": 2 },
                        { "condition": "new", "fulfillmentChannel": "Merchant", "OfferCount": 3 }
                    ],
                    "LowestPrices": [{ "ListingPrice": { "Amount": "12.00", "CurrencyCode": "GBP" } }]
                }}}),
                5,
                Some(12.0),
                None,
            ),
            (
                "count and price from Offers",
                json!({ "payload": { "Offers": [
                    { "ListingPrice": { "Amount": 10.0, "CurrencyCode": "USD" },
                      "Shipping": { "Amount": 4.0, "CurrencyCode": "USD" } },
                    { "ListingPrice": { "Amount": 12.0, "CurrencyCode": "USD" } }
                ]}}),
                2,
                Some(12.0),
                None,
            ),
            (
                "top-level camelCase",
                json!({
                    "summary": {
                        "totalOfferCount": 1,
                        "buyBoxPrices": [{ "listingPrice": { "amount": 3000, "currencyCode": "JPY" } }]
                    }
                }),
                1,
                None,
                Some(3000.0),
            ),
            ("no offers", json!({ "payload": { "Summary": { "TotalOfferCount": 0 }, "Offers": [] } }), 0, None, None),
            ("empty payload", json!({ "payload": {} }), 0, None, None),
        ];

        for (name, body, count, lowest, buy_box) in cases {
            let summary = offers(&body).unwrap_or_else(|e| panic!("{}: {}", name, e));
            assert_eq!(summary.offer_count, count, "{}", name);
            assert_eq!(summary.available, count > 0, "{}", name);
            assert_eq!(summary.lowest_price.map(|m| m.amount), lowest, "{}", name);
            assert_eq!(summary.buy_box_price.map(|m| m.amount), buy_box, "{}", name);
        }
    }

    #[test]
    fn test_offer_currency_preserved() {
        let body = json!({ "payload": { "Summary": {
            "TotalOfferCount": 1,
            "BuyBoxPrices": [{ "LandedPrice": { "Amount": 5.0, "CurrencyCode": "SEK" } }]
        }}});
        let summary = offers(&body).unwrap();
        assert_eq!(summary.buy_box_price.unwrap().currency, "SEK");
    }

    #[test]
    fn test_offer_not_an_object() {
        assert!(matches!(offers(&json!([])), Err(RemoteError::Decode(_))));
        assert!(matches!(offers(&json!("x")), Err(RemoteError::Decode(_))));
    }
}
