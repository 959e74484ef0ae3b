//! Declarative per-source mapping profiles.
//!
//! A profile tells the normalizer where each canonical field lives in one
//! source's raw product shape. Adding an institution with a new shape is a
//! matter of adding a profile (built in, or in the sources file), not code.
//!
//! Keys may be dotted paths (`additionalInformation.overviewUri`). Where a
//! field lists several keys, the first non-empty value wins.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Feature, ProductLine};

/// How a rate entry expresses its fixed term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermUnit {
    /// A plain number of months (`"period": 36`).
    Months,
    /// An ISO-8601 duration (`"additionalValue": "P3Y"`).
    Iso8601,
}

/// Where rate entries live and how to read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRule {
    /// Key of the list of rate entries on the product. Unset, or pointing at a
    /// scalar, means the product itself is a single flattened entry.
    #[serde(default)]
    pub list: Option<String>,
    pub rate_type: String,
    pub value: String,
    /// Multiplier turning the raw value into a percentage (CDR sends `0.0624`).
    #[serde(default = "default_scale")]
    pub scale: f64,
    pub term: String,
    pub term_unit: TermUnit,
    pub purpose: String,
    pub repayment_type: String,
    #[serde(default)]
    pub comparison: Option<String>,
}

fn default_scale() -> f64 {
    1.0
}

/// Explicit sources for one feature flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagRule {
    pub feature: Feature,
    /// Boolean fields on the product (`"offset": true`).
    #[serde(default)]
    pub direct_keys: Vec<String>,
    /// Feature-type codes in the features list (`"OFFSET"`).
    #[serde(default)]
    pub feature_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeRule {
    pub list: String,
    pub fee_type: String,
    pub name: String,
    pub amount: String,
    /// Percentage-rate keys, used for the other-fees summary when no amount exists.
    #[serde(default)]
    pub rate_keys: Vec<String>,
    /// Duration of a periodic fee (`P1M`, `P1Y`).
    #[serde(default)]
    pub period: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintRule {
    pub list: String,
    pub constraint_type: String,
    pub value: String,
    #[serde(default)]
    pub min_types: Vec<String>,
    #[serde(default)]
    pub max_types: Vec<String>,
}

/// Canonical field → extraction rule table for one source shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingProfile {
    pub name: String,
    pub brand_id: Vec<String>,
    /// Prefer the source's configured brand id over the record's own brand
    /// field. CDR product records carry free-text brand names, while the
    /// register id configured on the source is shared with aggregated feeds.
    #[serde(default)]
    pub source_brand_first: bool,
    pub brand_name: Vec<String>,
    pub product_id: Vec<String>,
    pub product_name: Vec<String>,
    pub category: Vec<String>,
    pub description: Vec<String>,
    #[serde(default)]
    pub application_url: Vec<String>,
    #[serde(default)]
    pub last_updated: Vec<String>,
    pub rates: RateRule,
    #[serde(default)]
    pub flags: Vec<FlagRule>,
    /// List of `{featureType, additionalInfo}` objects.
    #[serde(default)]
    pub features_list: Option<String>,
    #[serde(default)]
    pub feature_type: Option<String>,
    #[serde(default)]
    pub fees: Option<FeeRule>,
    #[serde(default)]
    pub eligibility_list: Option<String>,
    #[serde(default)]
    pub constraints: Option<ConstraintRule>,
    /// Free-text fields searched when a flag has no explicit source.
    #[serde(default)]
    pub text_fields: Vec<String>,
    /// Accepted product categories; empty accepts everything.
    #[serde(default)]
    pub category_filter: Vec<String>,
}

fn keys(list: &[&str]) -> Vec<String> {
    list.iter().map(|k| k.to_string()).collect()
}

impl MappingProfile {
    /// CDR Banking product schema (product list merged with product detail).
    pub fn cdr() -> Self {
        Self {
            name: "cdr".to_string(),
            brand_id: keys(&["brand", "brandId"]),
            source_brand_first: true,
            brand_name: keys(&["brandName"]),
            product_id: keys(&["productId"]),
            product_name: keys(&["name"]),
            category: keys(&["productCategory"]),
            description: keys(&["description"]),
            application_url: keys(&["applicationUri", "additionalInformation.overviewUri"]),
            last_updated: keys(&["lastUpdated"]),
            rates: RateRule {
                list: Some("lendingRates".to_string()),
                rate_type: "lendingRateType".to_string(),
                value: "rate".to_string(),
                scale: 100.0,
                term: "additionalValue".to_string(),
                term_unit: TermUnit::Iso8601,
                purpose: "loanPurpose".to_string(),
                repayment_type: "repaymentType".to_string(),
                comparison: Some("comparisonRate".to_string()),
            },
            flags: vec![
                FlagRule {
                    feature: Feature::Offset,
                    direct_keys: Vec::new(),
                    feature_types: keys(&["OFFSET"]),
                },
                FlagRule {
                    feature: Feature::Redraw,
                    direct_keys: Vec::new(),
                    feature_types: keys(&["REDRAW"]),
                },
            ],
            features_list: Some("features".to_string()),
            feature_type: Some("featureType".to_string()),
            fees: Some(FeeRule {
                list: "fees".to_string(),
                fee_type: "feeType".to_string(),
                name: "name".to_string(),
                amount: "amount".to_string(),
                rate_keys: keys(&["balanceRate", "transactionRate", "accruedRate"]),
                period: Some("additionalValue".to_string()),
            }),
            eligibility_list: Some("eligibility".to_string()),
            constraints: Some(ConstraintRule {
                list: "constraints".to_string(),
                constraint_type: "constraintType".to_string(),
                value: "additionalValue".to_string(),
                min_types: keys(&["MIN_LIMIT"]),
                max_types: keys(&["MAX_LIMIT"]),
            }),
            text_fields: keys(&["name", "description"]),
            category_filter: keys(&["RESIDENTIAL_MORTGAGES"]),
        }
    }

    /// Pre-aggregated tracker feed: flat rates in percent, terms in months,
    /// boolean `offset`/`redraw` fields.
    pub fn aggregated() -> Self {
        Self {
            name: "aggregated".to_string(),
            brand_id: keys(&["brandId", "brand"]),
            source_brand_first: false,
            brand_name: keys(&["brandName"]),
            product_id: keys(&["productId"]),
            product_name: keys(&["productName", "name"]),
            category: keys(&["productCategory"]),
            description: keys(&["description"]),
            application_url: keys(&["applicationUri"]),
            last_updated: keys(&["lastUpdated"]),
            rates: RateRule {
                list: Some("rate".to_string()),
                rate_type: "lendingRateType".to_string(),
                value: "rate".to_string(),
                scale: 1.0,
                term: "period".to_string(),
                term_unit: TermUnit::Months,
                purpose: "purpose".to_string(),
                repayment_type: "repaymentType".to_string(),
                comparison: Some("comparisonRate".to_string()),
            },
            flags: vec![
                FlagRule {
                    feature: Feature::Offset,
                    direct_keys: keys(&["offset"]),
                    feature_types: Vec::new(),
                },
                FlagRule {
                    feature: Feature::Redraw,
                    direct_keys: keys(&["redraw"]),
                    feature_types: Vec::new(),
                },
            ],
            features_list: None,
            feature_type: None,
            fees: None,
            eligibility_list: None,
            constraints: None,
            text_fields: keys(&["name", "productName", "description"]),
            category_filter: Vec::new(),
        }
    }

    pub fn flag_rule(&self, feature: Feature) -> Option<&FlagRule> {
        self.flags.iter().find(|r| r.feature == feature)
    }

    /// The profile as used for a product line: a profile that filters by
    /// category filters on that line's category instead.
    pub fn for_line(&self, line: ProductLine) -> Self {
        let mut profile = self.clone();
        if !profile.category_filter.is_empty() {
            profile.category_filter = vec![line.category().to_string()];
        }
        profile
    }
}

/// Profiles available to a run, keyed by name.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: HashMap<String, MappingProfile>,
}

impl ProfileRegistry {
    pub fn builtin() -> Self {
        let mut profiles = HashMap::new();
        for profile in [MappingProfile::cdr(), MappingProfile::aggregated()] {
            profiles.insert(profile.name.clone(), profile);
        }
        Self { profiles }
    }

    /// Built-in profiles plus custom ones; a custom profile replaces a built-in
    /// profile of the same name.
    pub fn with_custom(custom: Vec<MappingProfile>) -> Self {
        let mut registry = Self::builtin();
        for profile in custom {
            registry.profiles.insert(profile.name.clone(), profile);
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<&MappingProfile> {
        self.profiles.get(name)
    }

    pub fn for_line(&self, line: ProductLine) -> Self {
        Self {
            profiles: self
                .profiles
                .iter()
                .map(|(name, profile)| (name.clone(), profile.for_line(line)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_profile_overrides_builtin() {
        let mut custom = MappingProfile::aggregated();
        custom.rates.scale = 100.0;
        let registry = ProfileRegistry::with_custom(vec![custom]);
        assert_eq!(registry.get("aggregated").unwrap().rates.scale, 100.0);
        assert!(registry.get("cdr").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn registry_retargets_category_filters() {
        let registry = ProfileRegistry::builtin().for_line(ProductLine::TermDeposits);
        assert_eq!(registry.get("cdr").unwrap().category_filter, vec!["TERM_DEPOSITS"]);
        assert!(registry.get("aggregated").unwrap().category_filter.is_empty());
    }

    #[test]
    fn profile_parses_from_json_with_defaults() {
        let json = r#"{
            "name": "credit-union",
            "brand_id": ["brandId"],
            "brand_name": ["brand"],
            "product_id": ["id"],
            "product_name": ["title"],
            "category": [],
            "description": ["summary"],
            "rates": {
                "list": "rates",
                "rate_type": "type",
                "value": "pct",
                "term": "months",
                "term_unit": "months",
                "purpose": "purpose",
                "repayment_type": "repayment"
            },
            "flags": [{"feature": "offset", "direct_keys": ["hasOffset"]}]
        }"#;
        let profile: MappingProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.rates.scale, 1.0);
        assert!(profile.rates.comparison.is_none());
        assert_eq!(profile.flag_rule(Feature::Offset).unwrap().direct_keys, vec!["hasOffset"]);
        assert!(profile.flag_rule(Feature::Redraw).is_none());
        assert!(profile.category_filter.is_empty());
        assert!(!profile.source_brand_first);
    }
}
