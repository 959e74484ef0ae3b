//! Rate entry extraction and slot selection.
//!
//! A raw product carries a list of rate entries, each tagged with a rate type,
//! an optional fixed term, a purpose and a repayment type. Several entries can
//! compete for the same canonical slot (LVR tiers, purpose variants); the slot
//! takes the entry with the lowest rate, ties going to the entry seen first.

use serde_json::Value;

use crate::domain::{RateRule, RateSet, RateSlot, RawProduct, TermUnit};
use crate::normalize::value::{duration_months, lookup, number, round_to, tag, text};

/// Decimal places kept on percentage rates.
const RATE_DECIMALS: i32 = 4;

#[derive(Debug, Clone, PartialEq)]
pub enum RateKind {
    Variable,
    Fixed,
    Comparison,
    Other(String),
}

impl RateKind {
    fn parse(raw: &str) -> Self {
        let t = tag(raw);
        match t.as_str() {
            "VARIABLE" => RateKind::Variable,
            "FIXED" => RateKind::Fixed,
            _ if t.contains("COMPARISON") => RateKind::Comparison,
            _ => RateKind::Other(t),
        }
    }
}

/// One rate entry, as read through a profile's `RateRule`.
#[derive(Debug, Clone, PartialEq)]
pub struct RateEntry {
    /// Position in the source list (tie-break order).
    pub index: usize,
    pub kind: RateKind,
    /// Annual rate in percent.
    pub rate: Option<f64>,
    pub term_months: Option<u32>,
    pub comparison: Option<f64>,
    pub purpose: Option<String>,
    pub repayment_type: Option<String>,
}

impl RateEntry {
    /// Canonical slot this entry competes for, if any.
    pub fn slot(&self) -> Option<RateSlot> {
        match self.kind {
            RateKind::Variable => Some(RateSlot::Variable),
            RateKind::Fixed => match self.term_months? {
                m @ (12 | 24 | 36 | 48 | 60) => Some(RateSlot::Fixed((m / 12) as u8)),
                _ => None,
            },
            _ => None,
        }
    }
}

fn scaled(value: Option<f64>, scale: f64) -> Option<f64> {
    value
        .map(|v| round_to(v * scale, RATE_DECIMALS))
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Read every rate entry of a product. Entries without a usable rate are kept:
/// their purpose/repayment tags still count.
///
/// When the profile's list key is unset or does not hold a list, a product
/// carrying rate fields of its own is read as a single entry; without a rate
/// type, that flattened rate is taken as variable.
pub fn collect_entries(raw: &RawProduct, rule: &RateRule) -> Vec<RateEntry> {
    let listed = rule
        .list
        .as_deref()
        .and_then(|key| lookup(raw, key))
        .and_then(Value::as_array);
    match listed {
        Some(items) => items
            .iter()
            .filter_map(Value::as_object)
            .enumerate()
            .map(|(index, entry)| read_entry(index, entry, rule, RateKind::Other(String::new())))
            .collect(),
        None if carries_rate_fields(raw, rule) => vec![read_entry(0, raw, rule, RateKind::Variable)],
        None => Vec::new(),
    }
}

fn carries_rate_fields(raw: &RawProduct, rule: &RateRule) -> bool {
    [&rule.rate_type, &rule.value, &rule.purpose, &rule.repayment_type]
        .into_iter()
        .any(|key| lookup(raw, key).is_some_and(|v| !v.is_array() && !v.is_null()))
}

fn read_entry(index: usize, entry: &RawProduct, rule: &RateRule, untyped: RateKind) -> RateEntry {
    let kind = lookup(entry, &rule.rate_type)
        .and_then(text)
        .map(|t| RateKind::parse(&t))
        .unwrap_or(untyped);
    let term_months = lookup(entry, &rule.term).and_then(|v| match rule.term_unit {
        TermUnit::Months => number(v).filter(|m| *m >= 0.0).map(|m| m.round() as u32),
        TermUnit::Iso8601 => text(v).and_then(|s| duration_months(&s)),
    });
    let comparison = rule
        .comparison
        .as_deref()
        .and_then(|key| lookup(entry, key))
        .and_then(number);

    RateEntry {
        index,
        kind,
        rate: scaled(lookup(entry, &rule.value).and_then(number), rule.scale),
        term_months,
        comparison: scaled(comparison, rule.scale),
        purpose: lookup(entry, &rule.purpose).and_then(text),
        repayment_type: lookup(entry, &rule.repayment_type).and_then(text),
    }
}

/// Lowest-rate entry for a slot; first seen wins on ties.
pub fn select_entry(entries: &[RateEntry], slot: RateSlot) -> Option<&RateEntry> {
    let mut best: Option<&RateEntry> = None;
    for entry in entries.iter().filter(|e| e.slot() == Some(slot)) {
        let Some(rate) = entry.rate else { continue };
        if best.and_then(|b| b.rate).is_none_or(|b| rate < b) {
            best = Some(entry);
        }
    }
    best
}

/// Fill the canonical rate slots.
///
/// The comparison rate is the lowest of the entries' own comparison values and
/// any entry typed as a comparison rate.
pub fn select_rates(entries: &[RateEntry]) -> RateSet {
    let mut rates = RateSet {
        variable: select_entry(entries, RateSlot::Variable).and_then(|e| e.rate),
        ..RateSet::default()
    };
    for years in 1..=5u8 {
        rates.fixed[usize::from(years) - 1] = select_entry(entries, RateSlot::Fixed(years)).and_then(|e| e.rate);
    }

    let comparisons = entries.iter().filter_map(|e| match e.kind {
        RateKind::Comparison => e.rate,
        _ => e.comparison,
    });
    rates.comparison = comparisons.fold(None, |acc: Option<f64>, v| match acc {
        Some(a) if a <= v => Some(a),
        _ => Some(v),
    });

    rates
}
