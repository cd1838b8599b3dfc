//! Fuzzy matching of invoice records to generated page images.
//!
//! Image generation (out of scope) names files best-effort as
//! `{invoiceNo}_{market}_{vendor}_page_{n}.png`, but cannot always
//! populate every field: OCR noise, single-image vendor policies, files
//! written before normalization existed upstream. The matcher runs an
//! ordered cascade of patterns, most specific first, and stops at the
//! first pattern that finds anything within a search location.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::BillingError;
use crate::normalize::MarketVariants;
use crate::types::MarketKey;
use crate::vendor::{CascadeVariant, Vendor};

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "tif", "tiff", "bmp"];

fn page_regex() -> &'static Regex {
    static PAGE_RE: OnceLock<Regex> = OnceLock::new();
    PAGE_RE.get_or_init(|| Regex::new(r"_page_(\d+)\.[^.]+$").expect("page suffix regex"))
}

/// One candidate (or matched) page image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// File name, the unit the cascade matches against.
    pub file_name: String,
    /// Full path, for the consumer that embeds the image.
    pub path: PathBuf,
    /// Page index parsed from the `_page_<n>.<ext>` suffix, when present.
    pub page: Option<u32>,
}

impl ImageRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let page = page_regex()
            .captures(&file_name)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok());
        Self {
            file_name,
            path,
            page,
        }
    }
}

/// A source of candidate images — the abstraction boundary that lets the
/// cascade run against an in-memory fake pool in tests instead of a real
/// directory.
pub trait ImagePool {
    fn candidates(&self) -> Result<Vec<ImageRef>, BillingError>;
}

/// Candidate pool backed by a directory listing, filtered to image
/// extensions.
pub struct DirectoryPool {
    dir: PathBuf,
}

impl DirectoryPool {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ImagePool for DirectoryPool {
    fn candidates(&self) -> Result<Vec<ImageRef>, BillingError> {
        let mut refs = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false);
            if is_image {
                refs.push(ImageRef::new(path));
            }
        }
        Ok(refs)
    }
}

/// Fixed candidate pool, used by tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPool {
    images: Vec<ImageRef>,
}

impl InMemoryPool {
    pub fn new<I, S>(file_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PathBuf>,
    {
        Self {
            images: file_names.into_iter().map(ImageRef::new).collect(),
        }
    }
}

impl ImagePool for InMemoryPool {
    fn candidates(&self) -> Result<Vec<ImageRef>, BillingError> {
        Ok(self.images.clone())
    }
}

/// What the matcher is looking for: one persisted invoice's identifying
/// fields.
#[derive(Debug, Clone)]
pub struct MatchQuery {
    pub invoice_no: String,
    pub market: String,
    pub vendor: Vendor,
    pub service_period: String,
}

impl MatchQuery {
    pub fn new(
        invoice_no: impl Into<String>,
        market: impl Into<String>,
        vendor: Vendor,
        service_period: impl Into<String>,
    ) -> Self {
        Self {
            invoice_no: invoice_no.into(),
            market: market.into(),
            vendor,
            service_period: service_period.into(),
        }
    }
}

/// Lowercase, alphanumeric-only fold used to compare name tokens against
/// file names ("Matrix Media" → "matrixmedia", "112524-M" → "112524m").
fn fold_token(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_lowercase()
}

/// Cascade matcher over one or more search locations, with a
/// per-assembly-run result cache.
pub struct ImageMatcher {
    pools: Vec<Box<dyn ImagePool>>,
    variants: MarketVariants,
    cache: HashMap<(String, MarketKey), Vec<ImageRef>>,
}

impl ImageMatcher {
    /// A matcher over the given search locations, using the built-in
    /// variant registry.
    pub fn new(pools: Vec<Box<dyn ImagePool>>) -> Self {
        Self::with_variants(pools, MarketVariants::builtin().clone())
    }

    pub fn with_variants(pools: Vec<Box<dyn ImagePool>>, variants: MarketVariants) -> Self {
        Self {
            pools,
            variants,
            cache: HashMap::new(),
        }
    }

    /// Find the image set for one invoice.
    ///
    /// Runs the cascade per search location, unions the hits, dedupes by
    /// file name, and sorts by numeric page index (lexicographic file name
    /// where no index is extractable). Zero matches is reportable but not
    /// fatal: the assembler still emits the textual invoice page.
    ///
    /// Results are cached by `(invoice number, market key)` for the life
    /// of the matcher — a repeat lookup never rescans the pools, so output
    /// stays consistent even if the underlying files change mid-run.
    pub fn find_matches(&mut self, query: &MatchQuery) -> Result<Vec<ImageRef>, BillingError> {
        let key = (
            query.invoice_no.clone(),
            MarketKey::with_variants(&query.market, &query.service_period, &self.variants),
        );
        if let Some(cached) = self.cache.get(&key) {
            debug!(invoice_no = %query.invoice_no, market = %query.market, "image match served from cache");
            return Ok(cached.clone());
        }

        let mut seen = HashSet::new();
        let mut matches = Vec::new();
        for pool in &self.pools {
            for image in self.run_cascade(query, &pool.candidates()?) {
                if seen.insert(image.file_name.clone()) {
                    matches.push(image);
                }
            }
        }

        matches.sort_by(|a, b| match (a.page, b.page) {
            (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.file_name.cmp(&b.file_name)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.file_name.cmp(&b.file_name),
        });

        if matches.is_empty() {
            warn!(
                invoice_no = %query.invoice_no,
                market = %query.market,
                vendor = %query.vendor,
                "no image matched any cascade pattern"
            );
        }
        self.cache.insert(key, matches.clone());
        Ok(matches)
    }

    /// The ordered pattern cascade, applied to one location's candidates.
    /// Most specific first; the first pattern with ≥1 hit wins.
    fn run_cascade(&self, query: &MatchQuery, candidates: &[ImageRef]) -> Vec<ImageRef> {
        let inv_lower = query.invoice_no.to_lowercase();
        let inv_fold = fold_token(&query.invoice_no);
        let market_fold = fold_token(&query.market);
        let vendor_fold = fold_token(query.vendor.name());
        let profile = query.vendor.profile();

        // 1. Single-summary vendors expect exactly one image on the
        //    batch's first invoice number, page 1 only.
        if profile.cascade == CascadeVariant::SingleSummary {
            let hits = filter_candidates(candidates, |name, _| {
                name.to_lowercase().contains(&inv_lower)
            })
            .into_iter()
            .filter(|img| img.page.unwrap_or(1) == 1)
            .collect::<Vec<_>>();
            if !hits.is_empty() {
                return hits;
            }
        }

        // 2. Exact: invoice number + market + vendor, any page.
        let hits = filter_candidates(candidates, |_, folded| {
            folded.contains(&inv_fold)
                && !market_fold.is_empty()
                && folded.contains(&market_fold)
                && !vendor_fold.is_empty()
                && folded.contains(&vendor_fold)
        });
        if !hits.is_empty() {
            return hits;
        }

        // 3. Continuity-market spelling fallbacks: files generated before
        //    upstream normalization may carry any registered variant.
        if profile.continuity_market.as_deref() == Some(query.market.as_str()) {
            if let Some(set) = self.variants.set_for_canonical(&query.market) {
                let spellings: Vec<String> = set.spellings().map(fold_token).collect();
                let hits = filter_candidates(candidates, |_, folded| {
                    folded.contains(&inv_fold) && spellings.iter().any(|s| folded.contains(s))
                });
                if !hits.is_empty() {
                    return hits;
                }
            }
        }

        // 4. Invoice number + the literal "page" (market and vendor
        //    dropped entirely).
        let hits = filter_candidates(candidates, |name, _| {
            let lower = name.to_lowercase();
            lower.contains(&inv_lower) && lower.contains("page")
        });
        if !hits.is_empty() {
            return hits;
        }

        // 5. Last resort: any file name containing the invoice number.
        filter_candidates(candidates, |name, _| {
            name.to_lowercase().contains(&inv_lower)
        })
    }
}

fn filter_candidates<F>(candidates: &[ImageRef], mut pred: F) -> Vec<ImageRef>
where
    F: FnMut(&str, &str) -> bool,
{
    candidates
        .iter()
        .filter(|img| pred(&img.file_name, &fold_token(&img.file_name)))
        .cloned()
        .collect()
}
