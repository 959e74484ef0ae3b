//! Term deposit normalization: one `DepositRate` per advertised rate variant.
//!
//! Deposit rate entries follow the CDR `depositRates` shape in every source;
//! the profile only supplies identity fields and the rate scale.

use rayon::prelude::*;
use tracing::warn;

use crate::domain::{DepositRate, MappingProfile, RawProduct};
use crate::normalize::value::{duration_months, first_text, lookup, number, objects, round_to, tag, text, title_case};
use crate::normalize::{NormalizedBatch, SourceContext, resolve_brand};

const RATES_LIST: &str = "depositRates";
const RATE_TYPE: &str = "depositRateType";
const RATE_VALUE: &str = "rate";
const TERM: &str = "additionalValue";
const TIERS: &str = "tiers";
const INFO: &str = "additionalInfo";
const PAYMENT_KEYS: [&str; 2] = ["applicationFrequency", "interestPaymentDue"];

/// Months in a deposit term. Day and week terms count whole 30-day months.
pub fn term_months(raw: &str) -> Option<u32> {
    if let Some(months) = duration_months(raw) {
        return Some(months);
    }
    let body = raw.trim().to_ascii_uppercase();
    let body = body.strip_prefix('P')?;
    let days = if let Some(n) = body.strip_suffix('D') {
        n.parse::<u32>().ok()?
    } else if let Some(n) = body.strip_suffix('W') {
        n.parse::<u32>().ok()?.checked_mul(7)?
    } else {
        return None;
    };
    Some(days / 30)
}

fn payment_label(raw: &str) -> String {
    match duration_months(raw) {
        Some(1) => "Monthly".to_string(),
        Some(3) => "Quarterly".to_string(),
        Some(6) => "Half-yearly".to_string(),
        Some(12) => "Annually".to_string(),
        Some(m) => format!("Every {m} months"),
        None if raw.trim().starts_with('P') => raw.trim().to_string(),
        None => title_case(raw),
    }
}

/// Balance bounds of the entry, preferring a tier keyed on amount or balance.
fn tier_bounds(entry: &RawProduct) -> (Option<f64>, Option<f64>) {
    let tiers: Vec<&RawProduct> = objects(entry, TIERS).collect();
    let by_amount = tiers.iter().find(|tier| {
        lookup(tier, "name")
            .and_then(text)
            .is_some_and(|name| {
                let name = tag(&name);
                name.contains("AMOUNT") || name.contains("BALANCE")
            })
    });
    let Some(tier) = by_amount.or(tiers.first()) else {
        return (None, None);
    };
    let bound = |key: &str| lookup(tier, key).and_then(number).filter(|v| v.is_finite() && *v >= 0.0);
    (bound("minimumValue"), bound("maximumValue"))
}

fn read_variant(entry: &RawProduct, scale: f64, base: &DepositRate) -> DepositRate {
    let rate_type = lookup(entry, RATE_TYPE).and_then(text).map(|t| tag(&t)).unwrap_or_default();
    let interest_rate = lookup(entry, RATE_VALUE)
        .and_then(number)
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| round_to(v * scale, 4));
    let term_months = lookup(entry, TERM).and_then(text).and_then(|t| term_months(&t));
    let (min_deposit, max_deposit) = tier_bounds(entry);
    let interest_payment = PAYMENT_KEYS
        .iter()
        .find_map(|key| lookup(entry, key).and_then(text))
        .map(|raw| payment_label(&raw))
        .unwrap_or_default();
    let info = lookup(entry, INFO).and_then(text).unwrap_or_default().to_uppercase();
    let promotional =
        rate_type.contains("INTRODUCTORY") || rate_type.contains("PROMOTIONAL") || info.contains("PROMO");

    DepositRate {
        rate_type,
        interest_rate,
        term_months,
        min_deposit,
        max_deposit,
        interest_payment,
        promotional,
        ..base.clone()
    }
}

/// Normalize one term deposit product into its rate variants. Returns `None`
/// when the record has no product id.
pub fn normalize_deposit(raw: &RawProduct, profile: &MappingProfile, ctx: &SourceContext<'_>) -> Option<Vec<DepositRate>> {
    let product_id = first_text(raw, &profile.product_id)?;
    let (brand_id, brand_name) = resolve_brand(raw, profile, ctx);
    let base = DepositRate {
        brand_id,
        brand_name,
        product_id,
        product_name: first_text(raw, &profile.product_name).unwrap_or_default(),
        description: first_text(raw, &profile.description).unwrap_or_default(),
        rate_type: String::new(),
        interest_rate: None,
        term_months: None,
        min_deposit: None,
        max_deposit: None,
        interest_payment: String::new(),
        promotional: false,
        application_url: first_text(raw, &profile.application_url).unwrap_or_default(),
        last_updated: first_text(raw, &profile.last_updated).unwrap_or_default(),
        data_source: ctx.source_name.to_string(),
    };

    let mut entries: Vec<&RawProduct> = objects(raw, RATES_LIST).collect();
    // Flattened feeds carry a single variant on the product itself.
    if entries.is_empty() && lookup(raw, RATE_VALUE).is_some_and(|v| !v.is_array() && !v.is_null()) {
        entries.push(raw);
    }
    if entries.is_empty() {
        return Some(vec![base]);
    }
    let scale = profile.rates.scale;
    Some(entries.into_iter().map(|entry| read_variant(entry, scale, &base)).collect())
}

/// Normalize a batch of deposit products in parallel; output order follows
/// input order and each product's variants stay together.
pub fn normalize_deposit_batch(
    raws: &[RawProduct],
    profile: &MappingProfile,
    ctx: &SourceContext<'_>,
) -> NormalizedBatch<DepositRate> {
    let results: Vec<Option<Vec<DepositRate>>> = raws
        .par_iter()
        .map(|raw| normalize_deposit(raw, profile, ctx))
        .collect();

    let mut batch = NormalizedBatch::default();
    for (raw, result) in raws.iter().zip(results) {
        match result {
            Some(variants) => batch.products.extend(variants),
            None => {
                batch.skipped += 1;
                let name = lookup(raw, "name").and_then(text).unwrap_or_default();
                warn!(source = ctx.source_name, name = %name, "skipping deposit record without a product id");
            }
        }
    }
    batch
}
