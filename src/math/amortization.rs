//! Monthly repayment for a standard amortizing loan.
//!
//! The annuity formula:
//!
//! ```text
//! M = P * r * (1 + r)^n / ((1 + r)^n - 1)
//! ```
//!
//! where `r` is the monthly rate (`annual / 12 / 100`) and `n` the number of
//! monthly payments. A zero rate would make the denominator vanish; rather than
//! emitting `P / n` or dividing by zero we return `Repayment::NotComputable`.
//!
//! Only one rate per product is kept in the export (the "headline" rate):
//! - the variable rate when present and positive
//! - otherwise the lowest positive fixed rate, ties going to the shorter term

use crate::domain::{HeadlineRepayments, RateSet, RateSlot, Repayment, STANDARD_PRINCIPALS};

/// Loan assumptions shared by every repayment column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoanTerms {
    pub term_years: u32,
    pub principals: [f64; 4],
}

impl LoanTerms {
    pub fn new(term_years: u32) -> Self {
        Self {
            term_years,
            principals: STANDARD_PRINCIPALS,
        }
    }
}

impl Default for LoanTerms {
    fn default() -> Self {
        Self::new(30)
    }
}

/// Repayments for every principal against one rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepaymentRow {
    pub slot: RateSlot,
    pub annual_rate: f64,
    pub amounts: [Repayment; 4],
}

/// Fixed monthly repayment, rounded to cents.
pub fn monthly_repayment(principal: f64, annual_rate_pct: Option<f64>, term_years: u32) -> Repayment {
    let Some(rate) = annual_rate_pct else {
        return Repayment::NotComputable;
    };
    if !(rate.is_finite() && rate > 0.0) || !(principal.is_finite() && principal > 0.0) || term_years == 0 {
        return Repayment::NotComputable;
    }

    let r = rate / 12.0 / 100.0;
    let n = term_years.saturating_mul(12) as i32;
    let growth = (1.0 + r).powi(n);
    let denom = growth - 1.0;
    if !(denom.is_finite() && denom > 0.0) {
        return Repayment::NotComputable;
    }

    let payment = principal * r * growth / denom;
    if !payment.is_finite() {
        return Repayment::NotComputable;
    }
    Repayment::Monthly((payment * 100.0).round() / 100.0)
}

fn amounts_for(rate: Option<f64>, terms: &LoanTerms) -> [Repayment; 4] {
    terms.principals.map(|p| monthly_repayment(p, rate, terms.term_years))
}

/// Repayments for every available rate slot, in slot order.
pub fn repayment_table(rates: &RateSet, terms: &LoanTerms) -> Vec<RepaymentRow> {
    RateSlot::ALL
        .iter()
        .filter_map(|&slot| {
            let rate = rates.get(slot)?;
            Some(RepaymentRow {
                slot,
                annual_rate: rate,
                amounts: amounts_for(Some(rate), terms),
            })
        })
        .collect()
}

/// Pick the rate whose repayments are exported.
pub fn headline_slot(rates: &RateSet) -> Option<(RateSlot, f64)> {
    if let Some(v) = rates.variable.filter(|v| v.is_finite() && *v > 0.0) {
        return Some((RateSlot::Variable, v));
    }

    let mut best: Option<(RateSlot, f64)> = None;
    for years in 1..=5u8 {
        let slot = RateSlot::Fixed(years);
        let Some(rate) = rates.get(slot).filter(|v| v.is_finite() && *v > 0.0) else {
            continue;
        };
        // Strict comparison keeps the shorter term on ties.
        if best.is_none_or(|(_, b)| rate < b) {
            best = Some((slot, rate));
        }
    }
    best
}

pub fn headline_repayments(rates: &RateSet, terms: &LoanTerms) -> HeadlineRepayments {
    match headline_slot(rates) {
        Some((slot, rate)) => HeadlineRepayments {
            basis: Some(slot),
            amounts: amounts_for(Some(rate), terms),
        },
        None => HeadlineRepayments::default(),
    }
}
