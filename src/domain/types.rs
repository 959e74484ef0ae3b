//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - produced in parallel by the normalizer
//! - merged by the aggregator without copying the raw payloads
//! - flattened into the CSV/JSON export rows

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::ProductLine;

/// One product as delivered by a source, before normalization.
///
/// The shape varies per source and is treated as untrusted input.
pub type RawProduct = serde_json::Map<String, serde_json::Value>;

/// Principals used for the repayment columns, in column order.
pub const STANDARD_PRINCIPALS: [f64; 4] = [300_000.0, 500_000.0, 750_000.0, 1_000_000.0];

/// Derived loan purpose (union of the purpose tags on all rate entries).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoanPurpose {
    Investment,
    OwnerOccupier,
    Both,
    NotSpecified,
}

impl LoanPurpose {
    pub fn label(self) -> &'static str {
        match self {
            LoanPurpose::Investment => "Investment",
            LoanPurpose::OwnerOccupier => "Owner Occupier",
            LoanPurpose::Both => "Both",
            LoanPurpose::NotSpecified => "Not Specified",
        }
    }
}

/// Derived repayment type (union of the repayment tags on all rate entries).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepaymentType {
    PrincipalAndInterest,
    InterestOnly,
    Both,
    NotSpecified,
}

impl RepaymentType {
    pub fn label(self) -> &'static str {
        match self {
            RepaymentType::PrincipalAndInterest => "Principal and Interest",
            RepaymentType::InterestOnly => "Interest Only",
            RepaymentType::Both => "Both",
            RepaymentType::NotSpecified => "Not Specified",
        }
    }
}

/// Where an extracted value came from.
///
/// Text inference is a lower-confidence fallback; consumers can tell it apart
/// from a value read off an explicit field even though the export schema only
/// carries the value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction<T> {
    /// Read from an explicit boolean/enum field on the raw product.
    DirectField(T),
    /// Found by keyword search over free text.
    InferredFromText(T),
    /// No evidence either way.
    Defaulted(T),
}

impl<T: Copy> Extraction<T> {
    pub fn value(&self) -> T {
        match *self {
            Extraction::DirectField(v) | Extraction::InferredFromText(v) | Extraction::Defaulted(v) => v,
        }
    }

    pub fn is_inferred(&self) -> bool {
        matches!(self, Extraction::InferredFromText(_))
    }

    pub fn provenance(&self) -> &'static str {
        match self {
            Extraction::DirectField(_) => "direct",
            Extraction::InferredFromText(_) => "text",
            Extraction::Defaulted(_) => "default",
        }
    }
}

impl Extraction<bool> {
    /// `Y`/`N` rendering used by the export schema.
    pub fn yes_no(&self) -> &'static str {
        if self.value() { "Y" } else { "N" }
    }
}

/// Loan features carried as Y/N flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Offset,
    Redraw,
    SplitLoan,
    Construction,
}

impl Feature {
    pub const ALL: [Feature; 4] = [Feature::Offset, Feature::Redraw, Feature::SplitLoan, Feature::Construction];

    pub fn display_name(self) -> &'static str {
        match self {
            Feature::Offset => "offset",
            Feature::Redraw => "redraw",
            Feature::SplitLoan => "split loan",
            Feature::Construction => "construction",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    pub offset: Extraction<bool>,
    pub redraw: Extraction<bool>,
    pub split_loan: Extraction<bool>,
    pub construction: Extraction<bool>,
}

impl FeatureFlags {
    pub fn get(&self, feature: Feature) -> Extraction<bool> {
        match feature {
            Feature::Offset => self.offset,
            Feature::Redraw => self.redraw,
            Feature::SplitLoan => self.split_loan,
            Feature::Construction => self.construction,
        }
    }

    pub fn any_yes(&self) -> bool {
        Feature::ALL.iter().any(|f| self.get(*f).value())
    }

    pub fn inferred_count(&self) -> usize {
        Feature::ALL.iter().filter(|f| self.get(**f).is_inferred()).count()
    }
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            offset: Extraction::Defaulted(false),
            redraw: Extraction::Defaulted(false),
            split_loan: Extraction::Defaulted(false),
            construction: Extraction::Defaulted(false),
        }
    }
}

/// A canonical rate slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateSlot {
    Variable,
    /// Fixed term in years (1..=5).
    Fixed(u8),
}

impl RateSlot {
    pub const ALL: [RateSlot; 6] = [
        RateSlot::Variable,
        RateSlot::Fixed(1),
        RateSlot::Fixed(2),
        RateSlot::Fixed(3),
        RateSlot::Fixed(4),
        RateSlot::Fixed(5),
    ];

    pub fn label(self) -> String {
        match self {
            RateSlot::Variable => "variable".to_string(),
            RateSlot::Fixed(years) => format!("fixed {years}y"),
        }
    }
}

/// Annual percentage rates per canonical slot. Absent means the source did not
/// advertise one; nothing is ever filled in.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateSet {
    pub variable: Option<f64>,
    /// `fixed[0]` is the 1-year rate, `fixed[4]` the 5-year rate.
    pub fixed: [Option<f64>; 5],
    pub comparison: Option<f64>,
}

impl RateSet {
    pub fn get(&self, slot: RateSlot) -> Option<f64> {
        match slot {
            RateSlot::Variable => self.variable,
            RateSlot::Fixed(years) => self.fixed.get(usize::from(years).wrapping_sub(1)).copied().flatten(),
        }
    }

    pub fn has_fixed(&self) -> bool {
        self.fixed.iter().any(Option::is_some)
    }

    pub fn is_empty(&self) -> bool {
        self.variable.is_none() && !self.has_fixed() && self.comparison.is_none()
    }
}

/// Fee amounts in dollars.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeeSet {
    pub application: Option<f64>,
    pub annual: Option<f64>,
    pub monthly: Option<f64>,
    pub exit: Option<f64>,
    pub valuation: Option<f64>,
    pub settlement: Option<f64>,
    /// Fees that fit none of the slots above, `Name: amount` joined by ` | `.
    pub other: String,
}

/// Result of a monthly repayment calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Repayment {
    Monthly(f64),
    /// Rate absent, zero or otherwise unusable.
    NotComputable,
}

impl Repayment {
    pub fn amount(self) -> Option<f64> {
        match self {
            Repayment::Monthly(v) => Some(v),
            Repayment::NotComputable => None,
        }
    }
}

/// Repayments for `STANDARD_PRINCIPALS` against the headline rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadlineRepayments {
    /// Slot whose rate was used; `None` when no rate was available.
    pub basis: Option<RateSlot>,
    pub amounts: [Repayment; 4],
}

impl Default for HeadlineRepayments {
    fn default() -> Self {
        Self {
            basis: None,
            amounts: [Repayment::NotComputable; 4],
        }
    }
}

/// Tag classification problems recorded during normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionNotes {
    pub ambiguous_purpose: bool,
    pub ambiguous_repayment: bool,
}

/// The normalized, source-independent record for one product.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalProduct {
    pub brand_id: String,
    pub brand_name: String,
    pub product_id: String,
    pub product_name: String,
    pub category: String,
    pub description: String,

    pub rates: RateSet,
    pub loan_purpose: LoanPurpose,
    pub repayment_type: RepaymentType,
    pub flags: FeatureFlags,
    pub fees: FeeSet,

    pub features: String,
    pub eligibility: String,
    pub constraints: String,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,

    pub repayments: HeadlineRepayments,

    pub application_url: String,
    pub last_updated: String,
    pub data_source: String,

    pub notes: ExtractionNotes,
}

impl CanonicalProduct {
    /// Identity used for cross-source deduplication.
    ///
    /// Falls back to the lower-cased brand name when a source carries no brand id.
    pub fn dedup_key(&self) -> (String, String) {
        let brand = if self.brand_id.trim().is_empty() {
            self.brand_name.trim().to_lowercase()
        } else {
            self.brand_id.trim().to_string()
        };
        (brand, self.product_id.trim().to_string())
    }

    /// Brand label used for distinct-brand counting.
    pub fn brand_label(&self) -> String {
        self.dedup_key().0
    }
}

/// Kind of upstream endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// An institution's CDR product API (`/cds-au/v1/banking/products`).
    CdrApi,
    /// A pre-aggregated JSON document (array of products).
    Aggregated,
}

impl SourceKind {
    /// Direct institution data outranks the aggregated fallback.
    pub fn default_priority(self) -> u8 {
        match self {
            SourceKind::CdrApi => 10,
            SourceKind::Aggregated => 0,
        }
    }

    pub fn default_profile(self) -> &'static str {
        match self {
            SourceKind::CdrApi => "cdr",
            SourceKind::Aggregated => "aggregated",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SourceKind::CdrApi => "cdr-api",
            SourceKind::Aggregated => "aggregated",
        }
    }
}

fn default_true() -> bool {
    true
}

/// One configured endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    pub kind: SourceKind,
    pub url: String,
    /// CDR `x-v` header.
    #[serde(default)]
    pub version: Option<String>,
    /// CDR `x-min-v` header.
    #[serde(default)]
    pub min_version: Option<String>,
    #[serde(default)]
    pub priority: Option<u8>,
    /// Mapping profile name; defaults per `kind`.
    #[serde(default)]
    pub profile: Option<String>,
    /// Brand identity used when product records omit it.
    #[serde(default)]
    pub brand_id: Option<String>,
    #[serde(default)]
    pub brand_name: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl SourceSpec {
    pub fn new(name: impl Into<String>, kind: SourceKind, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            url: url.into(),
            version: None,
            min_version: None,
            priority: None,
            profile: None,
            brand_id: None,
            brand_name: None,
            timeout_secs: None,
            active: true,
        }
    }

    pub fn priority(&self) -> u8 {
        self.priority.unwrap_or_else(|| self.kind.default_priority())
    }

    pub fn profile_name(&self) -> &str {
        self.profile.as_deref().unwrap_or_else(|| self.kind.default_profile())
    }

    pub fn timeout(&self, fallback: Duration) -> Duration {
        self.timeout_secs.map(Duration::from_secs).unwrap_or(fallback)
    }
}

/// Resolved configuration for one collection run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub output_dir: PathBuf,
    pub sources_file: Option<PathBuf>,
    /// Build the CDR source list from the register instead of the defaults.
    pub discover: bool,
    /// Wall-clock budget for the whole fetch phase.
    pub budget: Duration,
    /// Per-request timeout (sources may override).
    pub request_timeout: Duration,
    /// Attempts per request, including the first.
    pub retries: u32,
    /// Linear backoff unit between attempts.
    pub backoff: Duration,
    pub max_pages: usize,
    /// Fetch per-product detail documents from CDR sources.
    pub fetch_details: bool,
    pub term_years: u32,
    pub product_line: ProductLine,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("mortgage_data"),
            sources_file: None,
            discover: false,
            budget: Duration::from_secs(600),
            request_timeout: Duration::from_secs(30),
            retries: 3,
            backoff: Duration::from_secs(2),
            max_pages: 20,
            fetch_details: true,
            term_years: 30,
            product_line: ProductLine::Mortgages,
        }
    }
}
