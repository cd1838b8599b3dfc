use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::BillingError;
use crate::normalize::{self, MarketVariants};

/// One extracted billing line, as produced by document extraction.
///
/// `amount` is kept as the raw extracted text (`"$1,003.00"`, `"1003.00"`,
/// OCR noise and all) — the reconciler parses it and skips the item with a
/// logged warning when it cannot, so one bad cell never aborts a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// Free-text market name as extracted (not yet normalized).
    pub market: String,
    /// Raw amount text.
    pub amount: String,
    /// Service period as extracted, e.g. "November 2024".
    pub service_period: Option<String>,
    /// Free-text description.
    pub description: Option<String>,
}

impl LineItem {
    pub fn new(market: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            market: market.into(),
            amount: amount.into(),
            service_period: None,
            description: None,
        }
    }

    pub fn service_period(mut self, period: impl Into<String>) -> Self {
        self.service_period = Some(period.into());
        self
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// A persisted invoice row. Append-only: created once per assigned line
/// item, never mutated or deleted by this crate.
///
/// `market` always holds the canonical display form (e.g. "Fort Payne"),
/// never raw extraction text. `invoice_no` is unique within its sequence
/// except for continuity reuse, where one number legitimately repeats
/// across rows sharing the same batch, vendor, and canonical market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Row id, assigned by the store on insert.
    pub id: Option<i64>,
    /// Batch id shared by every record of one processing run.
    pub batch_id: String,
    /// Assigned invoice number, e.g. "112524-M".
    pub invoice_no: String,
    /// Vendor display name.
    pub vendor: String,
    /// Formatted amount, e.g. "$1,003.00".
    pub amount: String,
    /// Assignment date, `YYYY-MM-DD`.
    pub date: String,
    /// Canonical market display form.
    pub market: String,
    /// Service period (cleaned, original casing).
    pub service_period: String,
    /// Free-text description.
    pub description: String,
    /// Source document path, when known.
    pub docx_path: Option<String>,
    /// External job reference, when known.
    pub job_number: Option<String>,
}

impl InvoiceRecord {
    /// The composite identity used for image matching and continuity
    /// lookups.
    pub fn market_key(&self) -> MarketKey {
        MarketKey::new(&self.market, &self.service_period)
    }
}

/// Composite identity `(normalized market, normalized service period)`.
///
/// Two line items or records describe the same billing line iff their
/// `MarketKey`s are equal. Duplicate market names with different service
/// periods therefore stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketKey {
    pub market: String,
    pub service_period: String,
}

impl MarketKey {
    /// Build a key using the built-in variant registry.
    pub fn new(market: &str, service_period: &str) -> Self {
        Self::with_variants(market, service_period, MarketVariants::builtin())
    }

    /// Build a key against a custom variant registry.
    pub fn with_variants(market: &str, service_period: &str, variants: &MarketVariants) -> Self {
        Self {
            market: variants.normalize_market(market),
            service_period: normalize::normalize_service_period(service_period),
        }
    }
}

/// Batch identifier in `YYYYMMDD_HHMMSS` form.
///
/// Every record produced by one processing run shares one batch id; it is
/// the grouping key for continuity lookups and document assembly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(String);

const BATCH_ID_FORMAT: &str = "%Y%m%d_%H%M%S";

impl BatchId {
    /// Wrap an existing batch id string. The shape is not verified here;
    /// use [`BatchId::timestamp`] when the embedded time matters.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A batch id for the current local time.
    pub fn now() -> Self {
        Self(Local::now().format(BATCH_ID_FORMAT).to_string())
    }

    /// Parse the embedded timestamp.
    pub fn timestamp(&self) -> Result<NaiveDateTime, BillingError> {
        NaiveDateTime::parse_from_str(&self.0, BATCH_ID_FORMAT)
            .map_err(|e| BillingError::BatchId(format!("{}: {e}", self.0)))
    }

    /// True if the batch's timestamp is at or after `cutoff`.
    pub fn is_within(&self, cutoff: NaiveDateTime) -> bool {
        self.timestamp().map(|t| t >= cutoff).unwrap_or(false)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn batch_id_round_trips_timestamp() {
        let batch = BatchId::new("20241125_093015");
        let ts = batch.timestamp().unwrap();
        assert_eq!(
            ts,
            NaiveDate::from_ymd_opt(2024, 11, 25)
                .unwrap()
                .and_hms_opt(9, 30, 15)
                .unwrap()
        );
    }

    #[test]
    fn malformed_batch_id_is_an_error_not_a_panic() {
        assert!(BatchId::new("not-a-batch").timestamp().is_err());
        assert!(!BatchId::new("not-a-batch").is_within(NaiveDateTime::MIN));
    }

    #[test]
    fn market_key_equality_is_normalized() {
        let a = MarketKey::new("Ft. Payne", "November 2024");
        let b = MarketKey::new("FORT PAYNE", "Nov  2024");
        assert_eq!(a, b);

        let c = MarketKey::new("Conyers", "Oct 2024");
        let d = MarketKey::new("Conyers", "Nov 2024");
        assert_ne!(c, d);
    }
}
