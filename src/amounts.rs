//! Dollar amount parsing, formatting, and vendor-specific arithmetic.
//!
//! All arithmetic uses [`rust_decimal::Decimal`] — never floats.

use rust_decimal::Decimal;

/// Parse extracted amount text like `"$1,234.56"` into a [`Decimal`].
///
/// Everything except digits and the decimal point is stripped first, so
/// currency symbols, thousands separators, and surrounding noise are
/// tolerated. Returns `None` when nothing parseable remains.
pub fn parse_dollar_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Format a [`Decimal`] as `$1,234.56`: dollar sign, thousands separators,
/// exactly two decimal places.
pub fn format_dollar_amount(value: Decimal) -> String {
    let rounded = value.round_dp(2);
    let negative = rounded.is_sign_negative();
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::new();
    let digits: Vec<char> = int_part.chars().collect();
    for (i, digit) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*digit);
    }

    if negative {
        format!("-${grouped}.{frac_part}")
    } else {
        format!("${grouped}.{frac_part}")
    }
}

/// Gross up a net amount by the agency's retained rate — the Matrix Media
/// `amount / 0.85` markup. Returns `None` for a non-positive rate.
///
/// Never applied implicitly by the reconciler; callers opt in per vendor.
pub fn gross_up(amount: Decimal, retained_rate: Decimal) -> Option<Decimal> {
    if retained_rate <= Decimal::ZERO {
        return None;
    }
    Some((amount / retained_rate).round_dp(2))
}

/// Split an amount into parts of at most `cap` each — the Capitol Media
/// rule that amounts over $5,000 are billed as PART A, PART B, ...
///
/// Amounts at or below the cap come back as a single part; non-positive
/// amounts produce no parts.
pub fn split_into_parts(amount: Decimal, cap: Decimal) -> Vec<Decimal> {
    if amount <= Decimal::ZERO || cap <= Decimal::ZERO {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut remaining = amount;
    while remaining > Decimal::ZERO {
        let part = remaining.min(cap);
        parts.push(part);
        remaining -= part;
    }
    parts
}

/// Label for the `index`-th split part: "PART A", "PART B", ... and past
/// "PART Z" spreadsheet-style "PART AA", "PART AB", so labels stay unique
/// no matter how many parts an amount splits into.
pub fn part_label(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push((b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    let letters: String = letters.into_iter().rev().collect();
    format!("PART {letters}")
}
