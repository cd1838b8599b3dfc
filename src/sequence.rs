//! Invoice number sequencing.
//!
//! Numbers are a global numeric stream with a per-vendor-family suffix:
//! `112524-M`, `112525-M`, ... The numeric component always comes from the
//! most recently issued number regardless of vendor; only the suffix
//! changes. This module is pure — the caller reads prior state from the
//! store and persists what comes back.

use tracing::{debug, warn};

/// Starting point used when no prior invoice number exists or the prior
/// number's numeric portion cannot be parsed.
pub const DEFAULT_SEQUENCE_START: &str = "112524";

/// Compute the next invoice number.
///
/// The numeric component of `last` is the text before the first `-` (the
/// whole string if there is no dash), with any non-digit characters
/// stripped before parsing. On success the result is that number plus one,
/// with `suffix` appended. A missing, unparsable, or exhausted prior
/// number falls back to `default_start + suffix` — that is policy, not an
/// error, and is logged as a fallback event rather than raised.
pub fn next_invoice_number(last: Option<&str>, suffix: &str, default_start: &str) -> String {
    let Some(last) = last.filter(|s| !s.trim().is_empty()) else {
        let fallback = format!("{default_start}{suffix}");
        warn!(fallback = %fallback, "no prior invoice number, starting at default");
        return fallback;
    };

    let numeric_portion = last.split('-').next().unwrap_or(last);
    let digits: String = numeric_portion
        .chars()
        .filter(char::is_ascii_digit)
        .collect();

    match digits.parse::<u64>().ok().and_then(|n| n.checked_add(1)) {
        Some(n) => {
            let next = format!("{n}{suffix}");
            debug!(last = %last, next = %next, "incremented invoice number");
            next
        }
        None => {
            let fallback = format!("{default_start}{suffix}");
            warn!(
                last = %last,
                fallback = %fallback,
                "unparsable invoice number, falling back to default"
            );
            fallback
        }
    }
}

/// The numeric component of an issued invoice number, when one exists.
pub fn numeric_component(invoice_no: &str) -> Option<u64> {
    let numeric_portion = invoice_no.split('-').next().unwrap_or(invoice_no);
    let digits: String = numeric_portion
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}
