//! Field normalization: raw source records → `CanonicalProduct`.
//!
//! This module is responsible for turning heterogeneous product JSON into the
//! canonical record, driven entirely by a source's `MappingProfile`.
//!
//! Design goals:
//! - **Never fabricate**: absent numbers stay `None` (zero is a real value)
//! - **Deterministic**: slot tie-breaks and tag unions do not depend on ordering
//!   of hash maps or threads
//! - **Record-level isolation**: a bad record is skipped and counted, the batch
//!   carries on

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::domain::{CanonicalProduct, ExtractionNotes, MappingProfile, RawProduct};
use crate::math::{LoanTerms, headline_repayments};

pub mod deposits;
pub mod features;
pub mod fees;
pub mod rates;
pub mod tags;
pub mod value;

use value::{first_text, lookup, round_to, tag, text};

/// Identity defaults supplied by the source when records omit them.
#[derive(Debug, Clone, Copy)]
pub struct SourceContext<'a> {
    pub source_name: &'a str,
    pub brand_id: Option<&'a str>,
    pub brand_name: Option<&'a str>,
}

/// Output of normalizing one source's records.
#[derive(Debug, Clone)]
pub struct NormalizedBatch<T = CanonicalProduct> {
    pub products: Vec<T>,
    /// Records dropped because they carry no product id.
    pub skipped: usize,
}

impl<T> Default for NormalizedBatch<T> {
    fn default() -> Self {
        Self {
            products: Vec::new(),
            skipped: 0,
        }
    }
}

/// Whether the record belongs to a category the profile accepts.
pub fn matches_category(raw: &RawProduct, profile: &MappingProfile) -> bool {
    if profile.category_filter.is_empty() {
        return true;
    }
    match first_text(raw, &profile.category) {
        Some(category) => {
            let category = tag(&category);
            profile.category_filter.iter().any(|c| tag(c) == category)
        }
        None => false,
    }
}

/// Brand id and name of a record, falling back to the source's configured
/// identity. Profiles marked `source_brand_first` take the configured id first.
pub(crate) fn resolve_brand(raw: &RawProduct, profile: &MappingProfile, ctx: &SourceContext<'_>) -> (String, String) {
    let record_brand = first_text(raw, &profile.brand_id);
    let source_brand = ctx.brand_id.filter(|id| !id.trim().is_empty()).map(str::to_string);
    let brand_id = if profile.source_brand_first {
        source_brand.or(record_brand)
    } else {
        record_brand.or(source_brand)
    };
    let brand_name = first_text(raw, &profile.brand_name).or_else(|| ctx.brand_name.map(str::to_string));
    (brand_id.unwrap_or_default(), brand_name.unwrap_or_default())
}

/// Normalize one record. Returns `None` when the record has no product id.
pub fn normalize_product(
    raw: &RawProduct,
    profile: &MappingProfile,
    ctx: &SourceContext<'_>,
    terms: &LoanTerms,
) -> Option<CanonicalProduct> {
    let product_id = first_text(raw, &profile.product_id)?;

    let entries = rates::collect_entries(raw, &profile.rates);
    let rate_set = rates::select_rates(&entries);
    let purpose = tags::purpose_of(&entries);
    let repayment = tags::repayment_of(&entries);
    if purpose.ambiguous || repayment.ambiguous {
        debug!(
            source = ctx.source_name,
            product_id = %product_id,
            ambiguous_purpose = purpose.ambiguous,
            ambiguous_repayment = repayment.ambiguous,
            "rate entry tags did not map to a known value"
        );
    }

    let codes = features::feature_codes(raw, profile);
    let flags = features::extract_flags(raw, profile, &codes);

    let fee_set = profile
        .fees
        .as_ref()
        .map(|rule| fees::extract_fees(raw, rule))
        .unwrap_or_default();
    let eligibility = profile
        .eligibility_list
        .as_deref()
        .map(|list| fees::describe_list(raw, list, "eligibilityType"))
        .unwrap_or_default();
    let (constraints, min_amount, max_amount) = profile
        .constraints
        .as_ref()
        .map(|rule| fees::extract_constraints(raw, rule))
        .unwrap_or_default();

    let (brand_id, brand_name) = resolve_brand(raw, profile, ctx);

    Some(CanonicalProduct {
        brand_id,
        brand_name,
        product_id,
        product_name: first_text(raw, &profile.product_name).unwrap_or_default(),
        category: first_text(raw, &profile.category).unwrap_or_default(),
        description: first_text(raw, &profile.description).unwrap_or_default(),
        rates: rate_set,
        loan_purpose: purpose.value,
        repayment_type: repayment.value,
        flags,
        fees: fee_set,
        features: features::features_summary(&codes),
        eligibility,
        constraints,
        min_amount: min_amount.map(|v| round_to(v, 2)),
        max_amount: max_amount.map(|v| round_to(v, 2)),
        repayments: headline_repayments(&rate_set, terms),
        application_url: first_text(raw, &profile.application_url).unwrap_or_default(),
        last_updated: first_text(raw, &profile.last_updated).unwrap_or_default(),
        data_source: ctx.source_name.to_string(),
        notes: ExtractionNotes {
            ambiguous_purpose: purpose.ambiguous,
            ambiguous_repayment: repayment.ambiguous,
        },
    })
}

/// Normalize a whole batch in parallel; output order follows input order.
pub fn normalize_batch(
    raws: &[RawProduct],
    profile: &MappingProfile,
    ctx: &SourceContext<'_>,
    terms: &LoanTerms,
) -> NormalizedBatch {
    let results: Vec<Option<CanonicalProduct>> = raws
        .par_iter()
        .map(|raw| normalize_product(raw, profile, ctx, terms))
        .collect();

    let mut batch: NormalizedBatch = NormalizedBatch::default();
    for (raw, result) in raws.iter().zip(results) {
        match result {
            Some(product) => batch.products.push(product),
            None => {
                batch.skipped += 1;
                let name = lookup(raw, "name").and_then(text).unwrap_or_default();
                warn!(source = ctx.source_name, name = %name, "skipping record without a product id");
            }
        }
    }
    batch
}

#[cfg(test)]
pub(crate) mod tests_support {
    use crate::domain::{CanonicalProduct, FeatureFlags, FeeSet, HeadlineRepayments, LoanPurpose, RateSet, RepaymentType};

    /// A product with every optional field empty.
    pub fn empty_product() -> CanonicalProduct {
        CanonicalProduct {
            brand_id: String::new(),
            brand_name: String::new(),
            product_id: String::new(),
            product_name: String::new(),
            category: String::new(),
            description: String::new(),
            rates: RateSet::default(),
            loan_purpose: LoanPurpose::NotSpecified,
            repayment_type: RepaymentType::NotSpecified,
            flags: FeatureFlags::default(),
            fees: FeeSet::default(),
            features: String::new(),
            eligibility: String::new(),
            constraints: String::new(),
            min_amount: None,
            max_amount: None,
            repayments: HeadlineRepayments::default(),
            application_url: String::new(),
            last_updated: String::new(),
            data_source: String::new(),
            notes: Default::default(),
        }
    }

    pub fn product(brand_id: &str, product_id: &str, source: &str) -> CanonicalProduct {
        CanonicalProduct {
            brand_id: brand_id.to_string(),
            brand_name: format!("{brand_id} bank"),
            product_id: product_id.to_string(),
            product_name: format!("{product_id} loan"),
            data_source: source.to_string(),
            ..empty_product()
        }
    }
}
