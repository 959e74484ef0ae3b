//! Loan purpose and repayment type classification.
//!
//! Both fields are the union of tags across all rate entries of a product:
//! - no tags at all → `NotSpecified`
//! - `BOTH`/`UNCONSTRAINED`, or both concrete tags → `Both`
//! - exactly one concrete tag → that value
//! - only unrecognised tags → `NotSpecified`, reported as ambiguous

use std::collections::BTreeSet;

use crate::domain::{LoanPurpose, RepaymentType};
use crate::normalize::rates::RateEntry;
use crate::normalize::value::tag;

/// Classification result plus whether the tags failed to map cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified<T> {
    pub value: T,
    pub ambiguous: bool,
}

fn tag_set<'a>(values: impl Iterator<Item = Option<&'a str>>) -> BTreeSet<String> {
    values.flatten().map(tag).filter(|t| !t.is_empty()).collect()
}

fn is_both(tags: &BTreeSet<String>) -> bool {
    tags.contains("BOTH") || tags.contains("UNCONSTRAINED")
}

pub fn classify_purpose(tags: &BTreeSet<String>) -> Classified<LoanPurpose> {
    if tags.is_empty() {
        return Classified { value: LoanPurpose::NotSpecified, ambiguous: false };
    }
    let investment = tags.contains("INVESTMENT");
    let owner = tags.contains("OWNER_OCCUPIED") || tags.contains("OWNER_OCCUPIER");

    let value = if is_both(tags) || (investment && owner) {
        LoanPurpose::Both
    } else if investment {
        LoanPurpose::Investment
    } else if owner {
        LoanPurpose::OwnerOccupier
    } else {
        return Classified { value: LoanPurpose::NotSpecified, ambiguous: true };
    };
    Classified { value, ambiguous: false }
}

pub fn classify_repayment(tags: &BTreeSet<String>) -> Classified<RepaymentType> {
    if tags.is_empty() {
        return Classified { value: RepaymentType::NotSpecified, ambiguous: false };
    }
    let pi = tags.contains("PRINCIPAL_AND_INTEREST");
    let io = tags.contains("INTEREST_ONLY");

    let value = if is_both(tags) || (pi && io) {
        RepaymentType::Both
    } else if io {
        RepaymentType::InterestOnly
    } else if pi {
        RepaymentType::PrincipalAndInterest
    } else {
        return Classified { value: RepaymentType::NotSpecified, ambiguous: true };
    };
    Classified { value, ambiguous: false }
}

pub fn purpose_of(entries: &[RateEntry]) -> Classified<LoanPurpose> {
    classify_purpose(&tag_set(entries.iter().map(|e| e.purpose.as_deref())))
}

pub fn repayment_of(entries: &[RateEntry]) -> Classified<RepaymentType> {
    classify_repayment(&tag_set(entries.iter().map(|e| e.repayment_type.as_deref())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn purpose_union() {
        assert_eq!(classify_purpose(&set(&[])).value, LoanPurpose::NotSpecified);
        assert_eq!(classify_purpose(&set(&["INVESTMENT"])).value, LoanPurpose::Investment);
        assert_eq!(classify_purpose(&set(&["OWNER_OCCUPIED"])).value, LoanPurpose::OwnerOccupier);
        assert_eq!(
            classify_purpose(&set(&["INVESTMENT", "OWNER_OCCUPIED"])).value,
            LoanPurpose::Both
        );
        assert_eq!(classify_purpose(&set(&["BOTH"])).value, LoanPurpose::Both);
        assert_eq!(classify_purpose(&set(&["INVESTMENT", "OTHER"])).value, LoanPurpose::Investment);
    }

    #[test]
    fn empty_tags_are_not_the_same_as_both() {
        let empty = classify_purpose(&set(&[]));
        let both = classify_purpose(&set(&["BOTH"]));
        assert_ne!(empty.value, both.value);
        assert!(!empty.ambiguous);
    }

    #[test]
    fn unrecognised_tags_are_ambiguous() {
        let c = classify_purpose(&set(&["OTHER"]));
        assert_eq!(c.value, LoanPurpose::NotSpecified);
        assert!(c.ambiguous);

        let r = classify_repayment(&set(&["NEGOTIABLE"]));
        assert_eq!(r.value, RepaymentType::NotSpecified);
        assert!(r.ambiguous);
    }

    #[test]
    fn repayment_union() {
        assert_eq!(classify_repayment(&set(&["INTEREST_ONLY"])).value, RepaymentType::InterestOnly);
        assert_eq!(
            classify_repayment(&set(&["PRINCIPAL_AND_INTEREST"])).value,
            RepaymentType::PrincipalAndInterest
        );
        assert_eq!(
            classify_repayment(&set(&["PRINCIPAL_AND_INTEREST", "INTEREST_ONLY"])).value,
            RepaymentType::Both
        );
        assert_eq!(classify_repayment(&set(&["UNCONSTRAINED"])).value, RepaymentType::Both);
    }
}
