//! Feature flag extraction.
//!
//! Explicit data wins: a boolean field on the product, or a matching code in
//! its features list. Only when neither exists do we search the product's text
//! for a fixed keyword list, and the result is tagged as text-inferred.

use tracing::debug;

use crate::domain::{Extraction, Feature, FeatureFlags, MappingProfile, RawProduct};
use crate::normalize::value::{boolean, lookup, objects, tag, text, title_case};

/// Case-insensitive keywords searched when no explicit field exists.
pub fn keywords(feature: Feature) -> &'static [&'static str] {
    match feature {
        Feature::Offset => &["offset"],
        Feature::Redraw => &["redraw"],
        Feature::SplitLoan => &["split loan", "split"],
        Feature::Construction => &["construction", "building loan", "building finance"],
    }
}

/// Feature-type codes present in the product's features list, upper-cased, in order.
pub fn feature_codes(raw: &RawProduct, profile: &MappingProfile) -> Vec<String> {
    let (Some(list), Some(key)) = (profile.features_list.as_deref(), profile.feature_type.as_deref()) else {
        return Vec::new();
    };
    let mut codes: Vec<String> = Vec::new();
    for item in objects(raw, list) {
        if let Some(code) = lookup(item, key).and_then(text).map(|t| tag(&t)) {
            if !codes.contains(&code) {
                codes.push(code);
            }
        }
    }
    codes
}

/// `Features` column: feature codes, title-cased and joined.
pub fn features_summary(codes: &[String]) -> String {
    codes.iter().map(|c| title_case(c)).collect::<Vec<_>>().join(" | ")
}

/// Lower-cased text searched for keyword fallback.
fn search_text(raw: &RawProduct, profile: &MappingProfile) -> String {
    let mut parts: Vec<String> = profile
        .text_fields
        .iter()
        .filter_map(|k| lookup(raw, k).and_then(text))
        .collect();
    if let Some(list) = profile.features_list.as_deref() {
        for item in objects(raw, list) {
            for key in ["additionalInfo", "description"] {
                if let Some(t) = lookup(item, key).and_then(text) {
                    parts.push(t);
                }
            }
        }
    }
    parts.join(" ").to_lowercase()
}

fn extract_flag(raw: &RawProduct, profile: &MappingProfile, feature: Feature, codes: &[String], haystack: &str) -> Extraction<bool> {
    if let Some(rule) = profile.flag_rule(feature) {
        if let Some(v) = rule.direct_keys.iter().find_map(|k| lookup(raw, k).and_then(boolean)) {
            return Extraction::DirectField(v);
        }
        if rule.feature_types.iter().any(|t| codes.contains(&tag(t))) {
            return Extraction::DirectField(true);
        }
    }

    if keywords(feature).iter().any(|k| haystack.contains(k)) {
        Extraction::InferredFromText(true)
    } else {
        Extraction::Defaulted(false)
    }
}

pub fn extract_flags(raw: &RawProduct, profile: &MappingProfile, codes: &[String]) -> FeatureFlags {
    let haystack = search_text(raw, profile);
    let flags = FeatureFlags {
        offset: extract_flag(raw, profile, Feature::Offset, codes, &haystack),
        redraw: extract_flag(raw, profile, Feature::Redraw, codes, &haystack),
        split_loan: extract_flag(raw, profile, Feature::SplitLoan, codes, &haystack),
        construction: extract_flag(raw, profile, Feature::Construction, codes, &haystack),
    };

    if flags.inferred_count() > 0 {
        let product_id = lookup(raw, "productId").and_then(text).unwrap_or_default();
        for feature in Feature::ALL.into_iter().filter(|f| flags.get(*f).is_inferred()) {
            debug!(feature = feature.display_name(), product_id = %product_id, "flag inferred from description text");
        }
    }
    flags
}
