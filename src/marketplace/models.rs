//! Normalized per-marketplace results for restrictions and offers.

use serde::{Deserialize, Serialize};

/// Listing eligibility of one ASIN in one marketplace.
///
/// The default is "closed": not allowed, nothing known.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestrictionStatus {
    /// The seller can list this ASIN without further action
    pub allowed: bool,
    /// Listing is possible after an approval workflow
    pub approval_required: bool,
    /// Human-readable restriction reasons, in response order
    pub reasons: Vec<String>,
}

impl RestrictionStatus {
    pub fn open() -> Self {
        Self { allowed: true, approval_required: false, reasons: Vec::new() }
    }

    /// Short label used by the table and CSV renderers.
    pub fn label(&self) -> &'static str {
        if self.allowed {
            "open"
        } else if self.approval_required {
            "approval"
        } else {
            "closed"
        }
    }
}

/// Monetary amount as reported by the pricing API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    pub amount: f64,
    pub currency: String,
}

impl Money {
    pub fn new(amount: f64, currency: impl Into<String>) -> Self {
        Self { amount, currency: currency.into() }
    }
}

/// Offer availability of one ASIN in one marketplace.
///
/// The default is "empty": no offers, no prices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferSummary {
    pub available: bool,
    pub offer_count: u32,
    pub lowest_price: Option<Money>,
    pub buy_box_price: Option<Money>,
}

impl OfferSummary {
    /// Price shown to spreadsheet users: buy box first, then lowest offer.
    pub fn headline_price(&self) -> Option<&Money> {
        self.buy_box_price.as_ref().or(self.lowest_price.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restriction_default_is_closed() {
        let status = RestrictionStatus::default();
        assert!(!status.allowed);
        assert!(!status.approval_required);
        assert!(status.reasons.is_empty());
        assert_eq!(status.label(), "closed");
    }

    #[test]
    fn test_restriction_labels() {
        assert_eq!(RestrictionStatus::open().label(), "open");
        let approval = RestrictionStatus {
            allowed: false,
            approval_required: true,
            reasons: vec!["Approval required".to_string()],
        };
        assert_eq!(approval.label(), "approval");
    }

    #[test]
    fn test_offer_default_is_empty() {
        let summary = OfferSummary::default();
        assert!(!summary.available);
        assert_eq!(summary.offer_count, 0);
        assert!(summary.headline_price().is_none());
    }

    #[test]
    fn test_headline_price_prefers_buy_box() {
        let summary = OfferSummary {
            available: true,
            offer_count: 3,
            lowest_price: Some(Money::new(9.5, "EUR")),
            buy_box_price: Some(Money::new(10.0, "EUR")),
        };
        assert_eq!(summary.headline_price().unwrap().amount, 10.0);

        let summary = OfferSummary { buy_box_price: None, ..summary };
        assert_eq!(summary.headline_price().unwrap().amount, 9.5);
    }

    #[test]
    fn test_serde_field_names() {
        let json = serde_json::to_value(OfferSummary::default()).unwrap();
        assert_eq!(json["offerCount"], 0);
        assert!(json["buyBoxPrice"].is_null());

        let json = serde_json::to_value(RestrictionStatus::default()).unwrap();
        assert_eq!(json["approvalRequired"], false);
    }
}
