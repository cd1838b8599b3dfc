use thiserror::Error;

/// Errors that can occur during reconciliation or image lookup.
///
/// Per-item defects (unparseable amounts, malformed line items, cascade
/// misses) are never surfaced here — they are logged and skipped. Only
/// failures that make a whole batch unsafe to assign (the invoice store
/// being unreachable, an unreadable image pool) become hard errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BillingError {
    /// The invoice store could not be opened, read, or written.
    #[error("invoice store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// An image pool could not be listed.
    #[error("image pool error: {0}")]
    Pool(#[from] std::io::Error),

    /// A batch id did not have the expected `YYYYMMDD_HHMMSS` shape.
    #[error("invalid batch id: {0}")]
    BatchId(String),
}
