use serde::{Deserialize, Serialize};

/// A supported invoice vendor.
///
/// Vendor behavior (number suffix, continuity rule, image cascade shape)
/// lives in [`VendorProfile`], looked up through [`Vendor::profile`] —
/// adding a vendor is a new enum row plus one profile entry, not a new
/// branch in the reconciliation or matching logic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vendor {
    MatrixMedia,
    CapitolMedia,
    Rsh,
    SmartPost,
    FeeInvoice,
    /// Any vendor without specific rules. Gets an empty suffix and the
    /// standard cascade — a documented default, not an error.
    Other(String),
}

/// Shape of the image-matching cascade for a vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeVariant {
    /// Full ordered cascade over invoice number, market, and vendor.
    Standard,
    /// One summary image per batch, tied to the batch's first invoice
    /// number, page 1 only.
    SingleSummary,
}

/// Per-vendor rule table.
#[derive(Debug, Clone, Copy)]
pub struct VendorProfile {
    /// Invoice-number suffix for this vendor family.
    pub suffix: &'static str,
    /// Canonical market whose rows all reuse one invoice number within a
    /// batch, if this vendor has such a rule.
    pub continuity_market: Option<&'static str>,
    /// Which image cascade the matcher runs.
    pub cascade: CascadeVariant,
}

impl Vendor {
    /// Parse the free-text vendor name the extraction layer produces.
    pub fn from_name(name: &str) -> Self {
        let trimmed = name.trim();
        match trimmed {
            "Matrix Media" => Self::MatrixMedia,
            "RSH" => Self::Rsh,
            "Smart Post" => Self::SmartPost,
            "FEE INVOICE" | "FEE INVOICES" => Self::FeeInvoice,
            _ if trimmed.to_lowercase().contains("capitol") => Self::CapitolMedia,
            _ => Self::Other(trimmed.to_string()),
        }
    }

    /// Display name, as stored in invoice rows.
    pub fn name(&self) -> &str {
        match self {
            Self::MatrixMedia => "Matrix Media",
            Self::CapitolMedia => "Capitol Media",
            Self::Rsh => "RSH",
            Self::SmartPost => "Smart Post",
            Self::FeeInvoice => "FEE INVOICES",
            Self::Other(name) => name,
        }
    }

    /// Rule table lookup.
    pub fn profile(&self) -> VendorProfile {
        match self {
            Self::MatrixMedia => VendorProfile {
                suffix: "-M",
                continuity_market: Some("Fort Payne"),
                cascade: CascadeVariant::Standard,
            },
            Self::CapitolMedia => VendorProfile {
                suffix: "-M",
                continuity_market: None,
                cascade: CascadeVariant::SingleSummary,
            },
            Self::Rsh | Self::SmartPost => VendorProfile {
                suffix: "-P",
                continuity_market: None,
                cascade: CascadeVariant::Standard,
            },
            Self::FeeInvoice | Self::Other(_) => VendorProfile {
                suffix: "",
                continuity_market: None,
                cascade: CascadeVariant::Standard,
            },
        }
    }

    /// Invoice-number suffix for this vendor family.
    pub fn suffix(&self) -> &'static str {
        self.profile().suffix
    }

    /// The configured document-assembly order: fee invoices first, then
    /// the media vendors. Not alphabetical.
    pub fn processing_order() -> &'static [Vendor] {
        static ORDER: [Vendor; 5] = [
            Vendor::FeeInvoice,
            Vendor::MatrixMedia,
            Vendor::CapitolMedia,
            Vendor::Rsh,
            Vendor::SmartPost,
        ];
        &ORDER
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
