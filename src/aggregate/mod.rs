//! Merge, deduplication and summary metrics.
//!
//! Batches arrive in configuration order. A product seen in several sources is
//! kept once, at the position it was first seen; its record is replaced only
//! by a source of strictly higher priority.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use serde::Serialize;
use tracing::debug;

use crate::domain::{CanonicalProduct, DepositRate};
use crate::normalize::value::round_to;

/// Records that collapse to one row when several sources list them.
pub trait Deduplicate {
    type Key: Eq + Hash + Debug;

    fn merge_key(&self) -> Self::Key;
}

impl Deduplicate for CanonicalProduct {
    type Key = (String, String);

    fn merge_key(&self) -> Self::Key {
        self.dedup_key()
    }
}

impl Deduplicate for DepositRate {
    type Key = (String, String, String);

    fn merge_key(&self) -> Self::Key {
        self.dedup_key()
    }
}

/// Normalized records from one source.
#[derive(Debug, Clone)]
pub struct SourceBatch<T = CanonicalProduct> {
    pub source: String,
    pub priority: u8,
    pub products: Vec<T>,
}

#[derive(Debug, Clone)]
pub struct Merged<T = CanonicalProduct> {
    pub products: Vec<T>,
    pub duplicates_dropped: usize,
}

pub fn merge<T: Deduplicate>(batches: Vec<SourceBatch<T>>) -> Merged<T> {
    let mut merged = Merged {
        products: Vec::new(),
        duplicates_dropped: 0,
    };
    let mut priorities: Vec<u8> = Vec::new();
    let mut index: HashMap<T::Key, usize> = HashMap::new();

    for batch in batches {
        for product in batch.products {
            let key = product.merge_key();
            match index.get(&key) {
                Some(&slot) => {
                    merged.duplicates_dropped += 1;
                    if batch.priority > priorities[slot] {
                        debug!(key = ?key, source = %batch.source, "higher-priority source replaces duplicate");
                        merged.products[slot] = product;
                        priorities[slot] = batch.priority;
                    }
                }
                None => {
                    index.insert(key, merged.products.len());
                    merged.products.push(product);
                    priorities.push(batch.priority);
                }
            }
        }
    }
    merged
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Succeeded,
    Failed,
}

/// Outcome of one source in a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub name: String,
    pub kind: &'static str,
    pub priority: u8,
    pub status: SourceStatus,
    /// Normalized products contributed before deduplication.
    pub records: usize,
    /// Records skipped for lacking a product id.
    pub skipped: usize,
    pub detail_failures: usize,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl SourceReport {
    pub fn succeeded(&self) -> bool {
        self.status == SourceStatus::Succeeded
    }
}

/// Read-only coverage metrics over the merged product set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryMetrics {
    pub total_records: usize,
    pub distinct_brands: usize,
    pub variable_rate_pct: f64,
    pub fixed_rate_pct: f64,
    pub feature_flag_pct: f64,
    /// Flags set from description text rather than an explicit field.
    pub inferred_flags: usize,
    /// Products whose purpose or repayment tags did not map cleanly.
    pub ambiguous_tags: usize,
}

fn pct(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round_to(count as f64 * 100.0 / total as f64, 1)
    }
}

pub fn summarize(products: &[CanonicalProduct]) -> SummaryMetrics {
    let total = products.len();
    let brands: HashSet<String> = products.iter().map(CanonicalProduct::brand_label).collect();
    let count = |pred: fn(&CanonicalProduct) -> bool| products.iter().filter(|p| pred(p)).count();

    SummaryMetrics {
        total_records: total,
        distinct_brands: brands.len(),
        variable_rate_pct: pct(count(|p| p.rates.variable.is_some()), total),
        fixed_rate_pct: pct(count(|p| p.rates.has_fixed()), total),
        feature_flag_pct: pct(count(|p| p.flags.any_yes()), total),
        inferred_flags: products.iter().map(|p| p.flags.inferred_count()).sum(),
        ambiguous_tags: count(|p| p.notes.ambiguous_purpose || p.notes.ambiguous_repayment),
    }
}

/// Coverage metrics over a merged term deposit set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DepositMetrics {
    /// Rate variants, one row each.
    pub total_records: usize,
    pub distinct_brands: usize,
    pub distinct_products: usize,
    pub with_rate_pct: f64,
    pub promotional: usize,
    /// Highest rate offered for a 12 month term.
    pub best_rate_12m: Option<f64>,
}

pub fn summarize_deposits(rates: &[DepositRate]) -> DepositMetrics {
    let total = rates.len();
    let brands: HashSet<String> = rates.iter().map(DepositRate::brand_label).collect();
    let products: HashSet<(String, String)> = rates
        .iter()
        .map(|r| (r.brand_label(), r.product_id.trim().to_string()))
        .collect();

    DepositMetrics {
        total_records: total,
        distinct_brands: brands.len(),
        distinct_products: products.len(),
        with_rate_pct: pct(rates.iter().filter(|r| r.interest_rate.is_some()).count(), total),
        promotional: rates.iter().filter(|r| r.promotional).count(),
        best_rate_12m: rates
            .iter()
            .filter(|r| r.term_months == Some(12))
            .filter_map(|r| r.interest_rate)
            .reduce(f64::max),
    }
}

/// Summary metrics of a run, shaped by the product line collected.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RunMetrics {
    Mortgages(SummaryMetrics),
    TermDeposits(DepositMetrics),
}

impl RunMetrics {
    pub fn total_records(&self) -> usize {
        match self {
            RunMetrics::Mortgages(m) => m.total_records,
            RunMetrics::TermDeposits(m) => m.total_records,
        }
    }
}
