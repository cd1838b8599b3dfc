//! Ordering contract for document assembly.
//!
//! Pairs each persisted invoice row of a batch with its matched image set,
//! in the configured vendor processing order (fee invoices first, then the
//! media vendors — never alphabetical). Rendering the final document is an
//! external concern; this module only guarantees the order and the
//! pairing.

use tracing::info;

use crate::error::BillingError;
use crate::matcher::{ImageMatcher, ImageRef, MatchQuery};
use crate::store::InvoiceStore;
use crate::types::{BatchId, InvoiceRecord};
use crate::vendor::{CascadeVariant, Vendor};

/// One assembled page group: the invoice row plus its images. An empty
/// image list is valid — the assembler still emits the textual invoice
/// page, just without an attached image page.
pub type AssembledInvoice = (InvoiceRecord, Vec<ImageRef>);

/// Collect a batch's records in processing order and attach image matches.
///
/// Vendors run in [`Vendor::processing_order`]; vendors present in the
/// batch but absent from the configured order follow afterwards, in first-
/// appearance order. Within a vendor, records keep insertion order, which
/// is the reconciler's sort order.
///
/// Single-summary vendors (Capitol) get one image lookup against the
/// batch's first invoice number; only that first record carries images.
pub fn assemble_batch(
    store: &InvoiceStore,
    matcher: &mut ImageMatcher,
    batch_id: &BatchId,
) -> Result<Vec<AssembledInvoice>, BillingError> {
    let all = store.records_for_batch(batch_id)?;

    // Configured order first, then stragglers by first appearance.
    let mut vendor_names: Vec<String> = Vendor::processing_order()
        .iter()
        .map(|v| v.name().to_string())
        .collect();
    for record in &all {
        if !vendor_names.contains(&record.vendor) {
            vendor_names.push(record.vendor.clone());
        }
    }

    let mut assembled = Vec::with_capacity(all.len());
    for vendor_name in &vendor_names {
        let vendor = Vendor::from_name(vendor_name);
        let records: Vec<&InvoiceRecord> =
            all.iter().filter(|r| &r.vendor == vendor_name).collect();
        if records.is_empty() {
            continue;
        }

        match vendor.profile().cascade {
            CascadeVariant::SingleSummary => {
                for (i, record) in records.iter().enumerate() {
                    let images = if i == 0 {
                        matcher.find_matches(&query_for(record, &vendor))?
                    } else {
                        Vec::new()
                    };
                    assembled.push(((*record).clone(), images));
                }
            }
            CascadeVariant::Standard => {
                for record in records {
                    let images = matcher.find_matches(&query_for(record, &vendor))?;
                    assembled.push((record.clone(), images));
                }
            }
        }
    }

    info!(
        batch_id = %batch_id,
        invoices = assembled.len(),
        without_images = assembled.iter().filter(|(_, imgs)| imgs.is_empty()).count(),
        "batch assembled"
    );
    Ok(assembled)
}

fn query_for(record: &InvoiceRecord, vendor: &Vendor) -> MatchQuery {
    MatchQuery::new(
        &record.invoice_no,
        &record.market,
        vendor.clone(),
        &record.service_period,
    )
}
