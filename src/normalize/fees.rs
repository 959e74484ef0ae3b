//! Fees, eligibility and constraints.

use crate::domain::{ConstraintRule, FeeRule, FeeSet, RawProduct};
use crate::normalize::value::{duration_months, lookup, number, objects, tag, text, title_case};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeeSlot {
    Application,
    Annual,
    Monthly,
    Exit,
    Valuation,
    Settlement,
}

/// Keyword table matched against the lower-cased fee type and name; first row wins.
const FEE_KEYWORDS: [(FeeSlot, &[&str]); 6] = [
    (FeeSlot::Application, &["application", "establishment"]),
    (FeeSlot::Annual, &["annual", "yearly"]),
    (FeeSlot::Monthly, &["monthly"]),
    (FeeSlot::Exit, &["exit", "termination", "discharge"]),
    (FeeSlot::Valuation, &["valuation"]),
    (FeeSlot::Settlement, &["settlement"]),
];

fn slot_mut(fees: &mut FeeSet, slot: FeeSlot) -> &mut Option<f64> {
    match slot {
        FeeSlot::Application => &mut fees.application,
        FeeSlot::Annual => &mut fees.annual,
        FeeSlot::Monthly => &mut fees.monthly,
        FeeSlot::Exit => &mut fees.exit,
        FeeSlot::Valuation => &mut fees.valuation,
        FeeSlot::Settlement => &mut fees.settlement,
    }
}

fn classify(fee_type: &str, name: &str, period_months: Option<u32>) -> Option<FeeSlot> {
    let haystack = format!("{} {}", fee_type.to_lowercase(), name.to_lowercase());
    if let Some((slot, _)) = FEE_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| haystack.contains(w)))
    {
        return Some(*slot);
    }
    // A periodic fee with no telling name is classified by its period.
    match (tag(fee_type).as_str(), period_months) {
        ("PERIODIC", Some(12)) => Some(FeeSlot::Annual),
        ("PERIODIC", Some(1)) => Some(FeeSlot::Monthly),
        _ => None,
    }
}

/// `$395` for whole dollars, `$12.50` otherwise.
pub fn format_money(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("${amount:.0}")
    } else {
        format!("${amount:.2}")
    }
}

pub fn extract_fees(raw: &RawProduct, rule: &FeeRule) -> FeeSet {
    let mut fees = FeeSet::default();
    let mut other: Vec<String> = Vec::new();

    for fee in objects(raw, &rule.list) {
        let fee_type = lookup(fee, &rule.fee_type).and_then(text).unwrap_or_default();
        let name = lookup(fee, &rule.name).and_then(text).unwrap_or_default();
        let amount = lookup(fee, &rule.amount).and_then(number).filter(|v| *v >= 0.0);
        let period = rule
            .period
            .as_deref()
            .and_then(|k| lookup(fee, k))
            .and_then(text)
            .and_then(|p| duration_months(&p));
        let label = if name.is_empty() { title_case(&fee_type) } else { name.clone() };

        let Some(amount) = amount else {
            let rate = rule.rate_keys.iter().find_map(|k| lookup(fee, k).and_then(number));
            if let Some(rate) = rate {
                other.push(format!("{label}: {:.2}%", rate * 100.0));
            }
            continue;
        };

        match classify(&fee_type, &name, period).map(|slot| slot_mut(&mut fees, slot)) {
            Some(target) if target.is_none() => *target = Some(amount),
            _ => other.push(format!("{label}: {}", format_money(amount))),
        }
    }

    fees.other = other.join(" | ");
    fees
}

/// Text of each object in a list: description, additional info, or the title-cased type code.
pub fn describe_list(raw: &RawProduct, list: &str, type_key: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    for item in objects(raw, list) {
        let described = ["description", "additionalInfo"]
            .iter()
            .find_map(|k| lookup(item, k).and_then(text))
            .or_else(|| lookup(item, type_key).and_then(text).map(|t| title_case(&t)));
        if let Some(d) = described {
            if !out.contains(&d) {
                out.push(d);
            }
        }
    }
    out.join(" | ")
}

/// Constraint text plus minimum/maximum loan amounts.
pub fn extract_constraints(raw: &RawProduct, rule: &ConstraintRule) -> (String, Option<f64>, Option<f64>) {
    let mut min_amount = None;
    let mut max_amount = None;
    for item in objects(raw, &rule.list) {
        let Some(kind) = lookup(item, &rule.constraint_type).and_then(text).map(|t| tag(&t)) else {
            continue;
        };
        let value = lookup(item, &rule.value).and_then(number).filter(|v| *v >= 0.0);
        if min_amount.is_none() && rule.min_types.iter().any(|t| tag(t) == kind) {
            min_amount = value;
        } else if max_amount.is_none() && rule.max_types.iter().any(|t| tag(t) == kind) {
            max_amount = value;
        }
    }
    (describe_list(raw, &rule.list, &rule.constraint_type), min_amount, max_amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MappingProfile;
    use serde_json::json;

    #[test]
    fn fees_are_slotted_by_type_and_name() {
        let profile = MappingProfile::cdr();
        let raw = json!({"fees": [
            {"name": "Establishment fee", "feeType": "UPFRONT", "amount": "600.00"},
            {"name": "Package fee", "feeType": "PERIODIC", "amount": "395", "additionalValue": "P1Y"},
            {"name": "Service fee", "feeType": "PERIODIC", "amount": "10", "additionalValue": "P1M"},
            {"name": "Discharge fee", "feeType": "EXIT", "amount": "0"},
            {"name": "Valuation fee", "feeType": "UPFRONT", "amount": "220.50"},
            {"name": "Second application fee", "feeType": "UPFRONT", "amount": "100"},
            {"name": "Late payment", "feeType": "EVENT", "amount": "20"},
            {"name": "Rate lock", "feeType": "EVENT", "balanceRate": "0.0015"}
        ]});
        let fees = extract_fees(raw.as_object().unwrap(), profile.fees.as_ref().unwrap());
        assert_eq!(fees.application, Some(600.0));
        assert_eq!(fees.annual, Some(395.0));
        assert_eq!(fees.monthly, Some(10.0));
        assert_eq!(fees.exit, Some(0.0));
        assert_eq!(fees.valuation, Some(220.5));
        assert_eq!(fees.settlement, None);
        assert_eq!(
            fees.other,
            "Second application fee: $100 | Late payment: $20 | Rate lock: 0.15%"
        );
    }

    #[test]
    fn missing_fee_list_leaves_slots_empty() {
        let profile = MappingProfile::cdr();
        let fees = extract_fees(json!({}).as_object().unwrap(), profile.fees.as_ref().unwrap());
        assert_eq!(fees, FeeSet::default());
    }

    #[test]
    fn constraints_carry_loan_limits() {
        let profile = MappingProfile::cdr();
        let raw = json!({
            "constraints": [
                {"constraintType": "MIN_LIMIT", "additionalValue": "10000.00"},
                {"constraintType": "MAX_LIMIT", "additionalValue": "5000000", "additionalInfo": "Max $5m"},
                {"constraintType": "MAX_LVR", "additionalValue": "0.95"}
            ],
            "eligibility": [
                {"eligibilityType": "MIN_AGE", "additionalValue": "18"},
                {"eligibilityType": "RESIDENCY_STATUS", "additionalInfo": "Australian residents"}
            ]
        });
        let raw = raw.as_object().unwrap();
        let (text, min, max) = extract_constraints(raw, profile.constraints.as_ref().unwrap());
        assert_eq!(min, Some(10_000.0));
        assert_eq!(max, Some(5_000_000.0));
        assert_eq!(text, "Min Limit | Max $5m | Max Lvr");
        assert_eq!(describe_list(raw, "eligibility", "eligibilityType"), "Min Age | Australian residents");
    }
}
