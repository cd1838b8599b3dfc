//! # billmatch
//!
//! Invoice-numbering and market/invoice/image reconciliation for vendor
//! billing batches: deterministic sequential number assignment under
//! vendor-specific continuity rules, an append-only SQLite invoice store,
//! and fuzzy multi-field matching of invoice rows to generated page
//! images.
//!
//! All monetary values use [`rust_decimal::Decimal`] — never floating
//! point. Document extraction, OCR, rendering, and conversion are external
//! collaborators; this crate's boundary is plain data structures plus the
//! `invoices` table.
//!
//! ## Quick Start
//!
//! ```rust
//! use billmatch::{BatchId, InvoiceStore, LineItem, Vendor};
//! use chrono::NaiveDate;
//!
//! let mut store = InvoiceStore::open_in_memory().unwrap();
//! let items = vec![
//!     LineItem::new("Dothan", "$1,003.00"),
//!     LineItem::new("Fort Payne", "500.00"),
//!     LineItem::new("Ft. Payne", "700.00"),
//! ];
//!
//! let batch = BatchId::new("20241125_093000");
//! let date = NaiveDate::from_ymd_opt(2024, 11, 25).unwrap();
//! let records = store
//!     .assign_batch(&items, &Vendor::MatrixMedia, &batch, date, None)
//!     .unwrap();
//!
//! // Dothan sorts first and takes the next sequence slot; both Fort
//! // Payne spellings collapse to one market sharing one number.
//! assert_eq!(records[0].invoice_no, "112524-M");
//! assert_eq!(records[1].invoice_no, "112525-M");
//! assert_eq!(records[2].invoice_no, "112525-M");
//! assert_eq!(records[0].amount, "$1,003.00");
//! ```

pub mod amounts;
pub mod assemble;
pub mod error;
pub mod matcher;
pub mod normalize;
pub mod reconcile;
pub mod sequence;
pub mod store;
pub mod types;
pub mod vendor;

pub use assemble::{AssembledInvoice, assemble_batch};
pub use error::BillingError;
pub use matcher::{DirectoryPool, ImageMatcher, ImagePool, ImageRef, InMemoryPool, MatchQuery};
pub use normalize::{
    MarketVariants, canonical_market, clean, normalize_market, normalize_service_period,
};
pub use reconcile::assign_invoice_numbers;
pub use sequence::{DEFAULT_SEQUENCE_START, next_invoice_number, numeric_component};
pub use store::InvoiceStore;
pub use types::{BatchId, InvoiceRecord, LineItem, MarketKey};
pub use vendor::{CascadeVariant, Vendor, VendorProfile};
