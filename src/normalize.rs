//! Canonicalization of free-text market and service-period strings.
//!
//! Extraction output is noisy: OCR artifacts, stray control characters
//! (Word table cells end in BEL), inconsistent spellings of the same
//! market. Everything that compares markets or service periods goes
//! through these pure, idempotent functions first.

use std::sync::OnceLock;

/// Strip control characters (code points below 32, BEL included) and trim
/// surrounding whitespace.
pub fn clean(raw: &str) -> String {
    raw.chars()
        .filter(|c| (*c as u32) >= 32)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Comparison fold: clean, lowercase, drop punctuation, collapse
/// whitespace. "Ft.  Payne" and "ft payne" fold to the same key.
fn fold(raw: &str) -> String {
    clean(raw)
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | '\'' | '"'))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// One set of known spellings that all mean the same market.
#[derive(Debug, Clone)]
pub struct VariantSet {
    /// Canonical display form, e.g. "Fort Payne".
    canonical: String,
    /// Spellings as registered, for substring queries against stored rows.
    spellings: Vec<String>,
    /// Folded comparison keys for the spellings and the canonical form.
    folded: Vec<String>,
}

impl VariantSet {
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Registered spellings plus the canonical form itself.
    pub fn spellings(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.canonical.as_str()).chain(self.spellings.iter().map(String::as_str))
    }

    fn matches(&self, folded_raw: &str) -> bool {
        self.folded.iter().any(|s| s == folded_raw)
    }
}

/// Declarative registry of market spelling variants.
///
/// New vendors' quirks are added by registering another variant set; the
/// matching and reconciliation logic never changes.
#[derive(Debug, Clone, Default)]
pub struct MarketVariants {
    sets: Vec<VariantSet>,
}

impl MarketVariants {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard registry: currently just the Fort Payne set.
    pub fn standard() -> Self {
        let mut variants = Self::new();
        variants.register("Fort Payne", ["ft payne", "ft. payne", "fort payne"]);
        variants
    }

    /// Shared instance of the standard registry.
    pub fn builtin() -> &'static Self {
        static BUILTIN: OnceLock<MarketVariants> = OnceLock::new();
        BUILTIN.get_or_init(Self::standard)
    }

    /// Register a variant set: every spelling (compared case- and
    /// punctuation-insensitively) resolves to `canonical`.
    pub fn register<'a>(
        &mut self,
        canonical: impl Into<String>,
        spellings: impl IntoIterator<Item = &'a str>,
    ) {
        let canonical = canonical.into();
        let spellings: Vec<String> = spellings.into_iter().map(str::to_string).collect();
        let mut folded: Vec<String> = spellings.iter().map(|s| fold(s)).collect();
        folded.push(fold(&canonical));
        folded.sort();
        folded.dedup();
        self.sets.push(VariantSet {
            canonical,
            spellings,
            folded,
        });
    }

    /// The variant set a raw market name belongs to, if any.
    pub fn resolve(&self, raw: &str) -> Option<&VariantSet> {
        let key = fold(raw);
        self.sets.iter().find(|set| set.matches(&key))
    }

    /// The variant set registered for a canonical display name.
    pub fn set_for_canonical(&self, canonical: &str) -> Option<&VariantSet> {
        self.sets.iter().find(|set| set.canonical == canonical)
    }

    /// Normalized comparison form of a market name. Variant-set members
    /// all normalize to the set's folded canonical key.
    pub fn normalize_market(&self, raw: &str) -> String {
        match self.resolve(raw) {
            Some(set) => fold(&set.canonical),
            None => fold(raw),
        }
    }

    /// Canonical display form. Variant-set members get the registered
    /// display spelling; everything else keeps its cleaned original text
    /// (only special-cased markets are re-cased).
    pub fn canonical_market(&self, raw: &str) -> String {
        match self.resolve(raw) {
            Some(set) => set.canonical.clone(),
            None => clean(raw),
        }
    }
}

/// Normalized comparison form via the built-in registry.
pub fn normalize_market(raw: &str) -> String {
    MarketVariants::builtin().normalize_market(raw)
}

/// Canonical display form via the built-in registry.
pub fn canonical_market(raw: &str) -> String {
    MarketVariants::builtin().canonical_market(raw)
}

const MONTHS: [(&str, &str); 12] = [
    ("january", "jan"),
    ("february", "feb"),
    ("march", "mar"),
    ("april", "apr"),
    ("may", "may"),
    ("june", "jun"),
    ("july", "jul"),
    ("august", "aug"),
    ("september", "sep"),
    ("october", "oct"),
    ("november", "nov"),
    ("december", "dec"),
];

/// Normalized service-period comparison form: cleaned, lowercased, full
/// month names shortened to their 3-letter abbreviations, whitespace
/// collapsed. "November 2024" and "Nov  2024" compare equal.
pub fn normalize_service_period(raw: &str) -> String {
    let mut period = clean(raw).to_lowercase();
    for (full, abbr) in MONTHS {
        period = period.replace(full, abbr);
    }
    period.split_whitespace().collect::<Vec<_>>().join(" ")
}
