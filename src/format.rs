//! Output formatting for scan results (table, JSON, CSV).

use crate::aggregate::{Slot, SlotState};
use crate::config::OutputFormat;
use crate::marketplace::models::{Money, OfferSummary, RestrictionStatus};
use crate::service::ScanResponse;

/// Formats scan results for output.
pub struct Formatter {
    format: OutputFormat,
}

/// One flattened (ASIN, marketplace) row.
struct Row<'a> {
    asin: &'a str,
    marketplace: &'a str,
    restriction: Option<&'a Slot<RestrictionStatus>>,
    offers: Option<&'a Slot<OfferSummary>>,
}

impl Formatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_scan(&self, scan: &ScanResponse) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(scan).unwrap_or_else(|_| "{}".to_string())
            }
            OutputFormat::Table => self.table(scan),
            OutputFormat::Csv => self.csv(scan),
        }
    }

    fn rows<'a>(&self, scan: &'a ScanResponse) -> Vec<Row<'a>> {
        let mut rows = Vec::new();
        for (asin, entity) in &scan.results {
            let mut markets: Vec<&String> =
                entity.restrictions.keys().chain(entity.offers.keys()).collect();
            markets.sort();
            markets.dedup();

            for marketplace in markets {
                rows.push(Row {
                    asin,
                    marketplace,
                    restriction: entity.restrictions.get(marketplace),
                    offers: entity.offers.get(marketplace),
                });
            }
        }
        rows
    }

    fn table(&self, scan: &ScanResponse) -> String {
        let asin_width = 10;
        let market_width = 14;
        let status_width = 9;
        let count_width = 6;
        let price_width = 14;

        let mut lines = Vec::new();
        lines.push(format!(
            "{:<asin_width$}  {:<market_width$}  {:<status_width$}  {:>count_width$}  {:>price_width$}",
            "ASIN", "Marketplace", "Listing", "Offers", "Price"
        ));
        lines.push(format!(
            "{:-<asin_width$}  {:-<market_width$}  {:-<status_width$}  {:-<count_width$}  {:-<price_width$}",
            "", "", "", "", ""
        ));

        for row in self.rows(scan) {
            let listing = match row.restriction {
                Some(slot) if slot.state == SlotState::Success => slot.value.label(),
                Some(_) => "error",
                None => "-",
            };
            let (count, price) = match row.offers {
                Some(slot) if slot.state == SlotState::Success => (
                    slot.value.offer_count.to_string(),
                    slot.value.headline_price().map(price_string).unwrap_or_else(|| "N/A".to_string()),
                ),
                Some(_) => ("error".to_string(), "-".to_string()),
                None => ("-".to_string(), "-".to_string()),
            };

            lines.push(format!(
                "{:<asin_width$}  {:<market_width$}  {:<status_width$}  {:>count_width$}  {:>price_width$}",
                row.asin, row.marketplace, listing, count, price
            ));
        }

        lines.push(String::new());
        lines.push(format!("Total: {} ASINs, {} errors", scan.count, scan.errors.len()));

        for err in &scan.errors {
            lines.push(format!(
                "  {} {} {:?}: {}",
                err.asin, err.marketplace_id, err.operation, err.message
            ));
        }

        lines.join("\n")
    }

    fn csv_header(&self) -> String {
        "asin,marketplace,listing,approval_required,reasons,offer_count,buy_box_price,lowest_price,currency,error"
            .to_string()
    }

    fn csv(&self, scan: &ScanResponse) -> String {
        let mut lines = vec![self.csv_header()];

        for row in self.rows(scan) {
            let restriction = row.restriction.filter(|s| s.state == SlotState::Success);
            let offers = row.offers.filter(|s| s.state == SlotState::Success);

            let errors: Vec<&str> = [
                row.restriction.and_then(|s| s.error.as_ref()),
                row.offers.and_then(|s| s.error.as_ref()),
            ]
            .into_iter()
            .flatten()
            .map(|f| f.message.as_str())
            .collect();

            let currency = offers
                .and_then(|s| s.value.headline_price())
                .map(|m| m.currency.clone())
                .unwrap_or_default();

            lines.push(format!(
                "{},{},{},{},{},{},{},{},{},{}",
                row.asin,
                Self::csv_escape(row.marketplace),
                restriction.map(|s| s.value.label()).unwrap_or_default(),
                restriction.map(|s| s.value.approval_required.to_string()).unwrap_or_default(),
                Self::csv_escape(&restriction.map(|s| s.value.reasons.join("; ")).unwrap_or_default()),
                offers.map(|s| s.value.offer_count.to_string()).unwrap_or_default(),
                amount(offers.and_then(|s| s.value.buy_box_price.as_ref())),
                amount(offers.and_then(|s| s.value.lowest_price.as_ref())),
                currency,
                Self::csv_escape(&errors.join("; ")),
            ));
        }

        lines.join("\n")
    }

    fn csv_escape(s: &str) -> String {
        if s.contains(',') || s.contains('"') || s.contains('\n') {
            format!("\"{}\"", s.replace('"', "\"\""))
        } else {
            s.to_string()
        }
    }
}

fn price_string(money: &Money) -> String {
    format!("{} {:.2}", money.currency, money.amount)
}

fn amount(money: Option<&Money>) -> String {
    money.map(|m| format!("{:.2}", m.amount)).unwrap_or_default()
}
