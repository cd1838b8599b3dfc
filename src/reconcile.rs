//! Batch reconciliation: deterministic assignment of invoice numbers to a
//! batch of extracted line items.
//!
//! The assignment here is pure — prior sequence state comes in as
//! parameters and the enriched records go back out. Reading that state
//! from the store and persisting the result (inside one transaction) is
//! [`InvoiceStore::assign_batch`](crate::store::InvoiceStore::assign_batch).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::amounts::{format_dollar_amount, parse_dollar_amount};
use crate::normalize::{self, MarketVariants};
use crate::sequence::{DEFAULT_SEQUENCE_START, next_invoice_number};
use crate::types::{BatchId, InvoiceRecord, LineItem};
use crate::vendor::Vendor;

/// A line item after normalization, ready for ordering and assignment.
struct NormalizedItem {
    /// Canonical display market, as stored.
    market: String,
    /// Lowercased comparison market — the primary sort key.
    sort_market: String,
    /// Normalized service period — the secondary sort key.
    sort_period: String,
    /// Cleaned service period in its original casing, as stored.
    period: String,
    amount: Decimal,
    description: String,
}

/// Assign invoice numbers to a batch of extracted line items.
///
/// Items are canonicalized, then stable-sorted by
/// `(normalized market, normalized service period)` — the ordering is a
/// correctness requirement: it makes assignment reproducible across reruns
/// of the same input, which downstream auditing depends on. Remaining ties
/// keep input order.
///
/// The first number in the batch continues from `prior_last_invoice_no`
/// (computed once, up front). Each subsequent item consumes the next
/// sequence slot, with one exception: when the vendor defines a continuity
/// market (Matrix Media's Fort Payne), every occurrence of that market
/// reuses a single number — either `prior_continuity_invoice_no` from an
/// earlier insert in the same batch, or the number assigned to its first
/// occurrence here — without advancing the sequence. Duplicate market
/// names with *different* service periods are not collapsed; each gets a
/// fresh number.
///
/// Items with an unparseable amount or a missing market are logged and
/// skipped — one malformed item never aborts a batch. The returned records
/// are in sort order, not input order.
pub fn assign_invoice_numbers(
    items: &[LineItem],
    vendor: &Vendor,
    batch_id: &BatchId,
    date: NaiveDate,
    prior_last_invoice_no: Option<&str>,
    prior_continuity_invoice_no: Option<&str>,
    variants: &MarketVariants,
) -> Vec<InvoiceRecord> {
    let profile = vendor.profile();
    let suffix = profile.suffix;

    let mut normalized: Vec<NormalizedItem> = Vec::with_capacity(items.len());
    for item in items {
        let raw_market = normalize::clean(&item.market);
        if raw_market.is_empty() {
            warn!(amount = %item.amount, "line item without a market, skipped");
            continue;
        }
        let Some(amount) = parse_dollar_amount(&item.amount) else {
            warn!(market = %raw_market, amount = %item.amount, "unparseable amount, item skipped");
            continue;
        };

        let market = variants.canonical_market(&raw_market);
        let period_raw = item
            .service_period
            .as_deref()
            .map(normalize::clean)
            .unwrap_or_default();

        normalized.push(NormalizedItem {
            sort_market: variants.normalize_market(&raw_market),
            sort_period: normalize::normalize_service_period(&period_raw),
            period: period_raw,
            market,
            amount,
            description: item.description.clone().unwrap_or_default(),
        });
    }

    // Stable sort: ties resolve to input order.
    normalized.sort_by(|a, b| {
        a.sort_market
            .cmp(&b.sort_market)
            .then_with(|| a.sort_period.cmp(&b.sort_period))
    });
    debug!(
        batch_id = %batch_id,
        order = ?normalized.iter().map(|n| n.market.as_str()).collect::<Vec<_>>(),
        "sorted batch"
    );

    // Computed once, before iterating: the number for whichever sorted
    // item consumes the first slot.
    let first_invoice_no =
        next_invoice_number(prior_last_invoice_no, suffix, DEFAULT_SEQUENCE_START);

    let mut current: Option<String> = None;
    let mut continuity_no = prior_continuity_invoice_no.map(str::to_string);
    let date_str = date.format("%Y-%m-%d").to_string();
    let mut records = Vec::with_capacity(normalized.len());

    for item in normalized {
        let is_continuity = profile.continuity_market == Some(item.market.as_str());

        let invoice_no = if is_continuity && continuity_no.is_some() {
            // Reuse the established number; the running counter does not
            // advance.
            let reused = continuity_no.clone().unwrap_or_default();
            info!(invoice_no = %reused, market = %item.market, "reusing continuity invoice number");
            reused
        } else {
            let assigned = match current.as_deref() {
                None => first_invoice_no.clone(),
                Some(last) => next_invoice_number(Some(last), suffix, DEFAULT_SEQUENCE_START),
            };
            current = Some(assigned.clone());
            if is_continuity {
                continuity_no = Some(assigned.clone());
                info!(invoice_no = %assigned, market = %item.market, "established continuity invoice number");
            } else {
                info!(invoice_no = %assigned, market = %item.market, "assigned invoice number");
            }
            assigned
        };

        records.push(InvoiceRecord {
            id: None,
            batch_id: batch_id.as_str().to_string(),
            invoice_no,
            vendor: vendor.name().to_string(),
            amount: format_dollar_amount(item.amount),
            date: date_str.clone(),
            market: item.market,
            service_period: item.period,
            description: item.description,
            docx_path: None,
            job_number: None,
        });
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 25).unwrap()
    }

    fn batch() -> BatchId {
        BatchId::new("20241125_093000")
    }

    fn assign(items: &[LineItem], vendor: Vendor, last: Option<&str>) -> Vec<InvoiceRecord> {
        assign_invoice_numbers(
            items,
            &vendor,
            &batch(),
            date(),
            last,
            None,
            MarketVariants::builtin(),
        )
    }

    #[test]
    fn fort_payne_spellings_share_one_invoice_number() {
        let items = vec![
            LineItem::new("Ft Payne", "500.00").service_period("Nov 2024"),
            LineItem::new("FORT PAYNE", "600.00").service_period("November 2024"),
            LineItem::new("ft. payne", "700.00").service_period("Nov 2024"),
        ];
        let records = assign(&items, Vendor::MatrixMedia, Some("112523-M"));

        assert_eq!(records.len(), 3);
        for rec in &records {
            assert_eq!(rec.market, "Fort Payne");
            assert_eq!(rec.invoice_no, records[0].invoice_no);
        }
    }

    #[test]
    fn duplicate_markets_with_different_periods_are_not_collapsed() {
        let items = vec![
            LineItem::new("Conyers", "100.00").service_period("Oct 2024"),
            LineItem::new("Conyers", "200.00").service_period("Nov 2024"),
        ];
        let records = assign(&items, Vendor::MatrixMedia, Some("112523-M"));

        assert_eq!(records.len(), 2);
        assert_ne!(records[0].invoice_no, records[1].invoice_no);
        // Nov sorts after Oct.
        assert_eq!(records[0].service_period, "Oct 2024");
        assert_eq!(records[0].invoice_no, "112524-M");
        assert_eq!(records[1].invoice_no, "112525-M");
    }

    #[test]
    fn end_to_end_dothan_before_fort_payne() {
        let items = vec![
            LineItem::new("Dothan", "1003.00"),
            LineItem::new("Fort Payne", "500.00"),
            LineItem::new("Ft. Payne", "700.00"),
        ];
        let records = assign(&items, Vendor::MatrixMedia, Some("112523-M"));

        assert_eq!(records[0].market, "Dothan");
        assert_eq!(records[0].invoice_no, "112524-M");
        assert_eq!(records[0].amount, "$1,003.00");
        assert_eq!(records[1].invoice_no, "112525-M");
        assert_eq!(records[2].invoice_no, "112525-M");

        let distinct: std::collections::HashSet<_> =
            records.iter().map(|r| r.invoice_no.as_str()).collect();
        assert_eq!(distinct.len(), 2);
    }

    #[test]
    fn prior_continuity_number_is_reused_without_consuming_a_slot() {
        let items = vec![
            LineItem::new("Ft Payne", "500.00"),
            LineItem::new("Dothan", "1003.00"),
        ];
        let records = assign_invoice_numbers(
            &items,
            &Vendor::MatrixMedia,
            &batch(),
            date(),
            Some("112530-M"),
            Some("112528-M"),
            MarketVariants::builtin(),
        );

        // Dothan sorts first and takes the fresh slot; Fort Payne keeps
        // its pre-existing number from earlier in the batch.
        assert_eq!(records[0].market, "Dothan");
        assert_eq!(records[0].invoice_no, "112531-M");
        assert_eq!(records[1].market, "Fort Payne");
        assert_eq!(records[1].invoice_no, "112528-M");
    }

    #[test]
    fn continuity_rule_does_not_apply_to_other_vendors() {
        let items = vec![
            LineItem::new("Fort Payne", "500.00"),
            LineItem::new("Fort Payne", "700.00"),
        ];
        let records = assign(&items, Vendor::Rsh, Some("200-P"));

        assert_eq!(records[0].invoice_no, "201-P");
        assert_eq!(records[1].invoice_no, "202-P");
    }

    #[test]
    fn malformed_items_are_skipped_not_fatal() {
        let items = vec![
            LineItem::new("Dothan", "not a number"),
            LineItem::new("", "100.00"),
            LineItem::new("Conyers", "250.00"),
        ];
        let records = assign(&items, Vendor::FeeInvoice, None);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].market, "Conyers");
        assert_eq!(records[0].invoice_no, "112524");
        assert_eq!(records[0].amount, "$250.00");
    }

    #[test]
    fn assignment_is_deterministic() {
        let items = vec![
            LineItem::new("Troy", "10.00").service_period("Nov 2024"),
            LineItem::new("Dothan", "20.00"),
            LineItem::new("Ft Payne", "30.00"),
            LineItem::new("Conyers", "40.00").service_period("Oct 2024"),
        ];
        let a = assign(&items, Vendor::MatrixMedia, Some("112500-M"));
        let b = assign(&items, Vendor::MatrixMedia, Some("112500-M"));

        let nos = |recs: &[InvoiceRecord]| {
            recs.iter()
                .map(|r| (r.market.clone(), r.invoice_no.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(nos(&a), nos(&b));
    }

    #[test]
    fn returned_order_follows_the_sort_key() {
        let items = vec![
            LineItem::new("Troy", "10.00"),
            LineItem::new("Conyers", "20.00"),
            LineItem::new("Dothan", "30.00"),
        ];
        let records = assign(&items, Vendor::FeeInvoice, None);
        let markets: Vec<_> = records.iter().map(|r| r.market.as_str()).collect();
        assert_eq!(markets, ["Conyers", "Dothan", "Troy"]);
    }
}
