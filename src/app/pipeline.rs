//! Shared collection pipeline.
//!
//! Source adapters (parallel) -> barrier -> normalize -> merge/dedup -> report -> sink
//!
//! Adapters run on scoped threads, one per source. Each sends its outcome tagged
//! with its slot index; the collector stops waiting when every slot is filled
//! or the run budget expires, and slots still empty at that point are recorded
//! as `BudgetExhausted`. Every request an adapter makes is capped by the same
//! deadline, so the scope join that follows the barrier is short.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use chrono::Local;
use tracing::{info, warn};

use crate::aggregate::{RunMetrics, SourceBatch, SourceReport, SourceStatus, merge, summarize, summarize_deposits};
use crate::data::{Fetch, FetchSettings, RawBatch, SourceError, collect_source};
use crate::domain::{CanonicalProduct, DepositRate, ProductLine, ProfileRegistry, RunConfig, SourceSpec};
use crate::error::AppError;
use crate::io::{
    CollectionReport, OutputNames, StagedWrite, render_csv, render_json, render_report, to_deposit_records, to_records,
};
use crate::math::LoanTerms;
use crate::normalize::deposits::normalize_deposit_batch;
use crate::normalize::{SourceContext, normalize_batch};

/// What one adapter produced.
#[derive(Debug, Clone)]
pub enum SourceOutcome {
    Collected(RawBatch),
    Failed(SourceError),
}

#[derive(Debug, Clone)]
pub struct AdapterResult {
    pub outcome: SourceOutcome,
    pub elapsed: Duration,
}

/// All computed outputs of a single collection run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub names: OutputNames,
    /// Merged mortgage products; empty on term deposit runs.
    pub products: Vec<CanonicalProduct>,
    /// Merged term deposit rate variants; empty on mortgage runs.
    pub deposits: Vec<DepositRate>,
    pub report: CollectionReport,
}

fn run_adapter(
    fetch: &dyn Fetch,
    spec: &SourceSpec,
    profiles: &ProfileRegistry,
    settings: &FetchSettings,
    deadline: Instant,
) -> SourceOutcome {
    let Some(profile) = profiles.get(spec.profile_name()) else {
        return SourceOutcome::Failed(SourceError::UnknownProfile(spec.profile_name().to_string()));
    };
    match collect_source(fetch, spec, profile, settings, deadline) {
        Ok(batch) => SourceOutcome::Collected(batch),
        Err(err) => SourceOutcome::Failed(err),
    }
}

/// Run every adapter in parallel and wait at the barrier.
///
/// Results are returned in source order.
pub fn fetch_all(
    fetch: &dyn Fetch,
    sources: &[SourceSpec],
    profiles: &ProfileRegistry,
    settings: &FetchSettings,
    deadline: Instant,
) -> Vec<AdapterResult> {
    let started = Instant::now();
    let mut slots: Vec<Option<AdapterResult>> = (0..sources.len()).map(|_| None).collect();

    std::thread::scope(|scope| {
        let (tx, rx) = mpsc::channel::<(usize, AdapterResult)>();
        for (slot, spec) in sources.iter().enumerate() {
            let tx = tx.clone();
            scope.spawn(move || {
                let t0 = Instant::now();
                let outcome = run_adapter(fetch, spec, profiles, settings, deadline);
                // The receiver is gone once the barrier has passed; late results are dropped.
                let _ = tx.send((
                    slot,
                    AdapterResult {
                        outcome,
                        elapsed: t0.elapsed(),
                    },
                ));
            });
        }
        drop(tx);

        let mut pending = sources.len();
        while pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok((slot, result)) => {
                    if slots[slot].replace(result).is_none() {
                        pending -= 1;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(pending, "run budget exhausted; abandoning unfinished sources");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    });

    let budget_elapsed = started.elapsed();
    slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or(AdapterResult {
                outcome: SourceOutcome::Failed(SourceError::BudgetExhausted),
                elapsed: budget_elapsed,
            })
        })
        .collect()
}

/// Execute a full collection and return the computed outputs (nothing written yet).
pub fn run_collection(
    fetch: &dyn Fetch,
    sources: &[SourceSpec],
    profiles: &ProfileRegistry,
    config: &RunConfig,
) -> RunOutput {
    let now = Local::now();
    let timestamp = now.format("%Y%m%d_%H%M%S").to_string();
    let deadline = Instant::now() + config.budget;
    let settings = FetchSettings::from_config(config);
    let terms = LoanTerms::new(config.term_years);
    let line = config.product_line;
    let profiles = &profiles.for_line(line);

    let active: Vec<SourceSpec> = sources.iter().filter(|s| s.active).cloned().collect();
    info!(sources = active.len(), product_line = line.file_stem(), budget_secs = config.budget.as_secs(), "collection started");

    // 1) Fetch in parallel, up to the barrier.
    let results = fetch_all(fetch, &active, profiles, &settings, deadline);

    // 2) Normalize what arrived.
    let mut batches = Vec::new();
    let mut deposit_batches = Vec::new();
    let mut reports = Vec::new();
    let mut skipped_total = 0;
    for (spec, result) in active.iter().zip(results) {
        let mut report = SourceReport {
            name: spec.name.clone(),
            kind: spec.kind.display_name(),
            priority: spec.priority(),
            status: SourceStatus::Failed,
            records: 0,
            skipped: 0,
            detail_failures: 0,
            error: None,
            elapsed_ms: u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
        };

        match (result.outcome, profiles.get(spec.profile_name())) {
            (SourceOutcome::Collected(raw), Some(profile)) => {
                let ctx = SourceContext {
                    source_name: &spec.name,
                    brand_id: spec.brand_id.as_deref(),
                    brand_name: spec.brand_name.as_deref(),
                };
                let (records, skipped) = match line {
                    ProductLine::Mortgages => {
                        let normalized = normalize_batch(&raw.products, profile, &ctx, &terms);
                        let counts = (normalized.products.len(), normalized.skipped);
                        batches.push(SourceBatch {
                            source: spec.name.clone(),
                            priority: spec.priority(),
                            products: normalized.products,
                        });
                        counts
                    }
                    ProductLine::TermDeposits => {
                        let normalized = normalize_deposit_batch(&raw.products, profile, &ctx);
                        let counts = (normalized.products.len(), normalized.skipped);
                        deposit_batches.push(SourceBatch {
                            source: spec.name.clone(),
                            priority: spec.priority(),
                            products: normalized.products,
                        });
                        counts
                    }
                };
                report.status = SourceStatus::Succeeded;
                report.records = records;
                report.skipped = skipped;
                report.detail_failures = raw.detail_failures;
                skipped_total += skipped;
            }
            (SourceOutcome::Collected(_), None) => {
                report.error = Some(SourceError::UnknownProfile(spec.profile_name().to_string()).to_string());
            }
            (SourceOutcome::Failed(err), _) => {
                warn!(source = %spec.name, error = %err, "source failed; contributing no records");
                report.error = Some(err.to_string());
            }
        }
        reports.push(report);
    }

    // 3) Merge + summarize.
    let (products, deposits, metrics, duplicates_dropped) = match line {
        ProductLine::Mortgages => {
            let merged = merge(batches);
            let metrics = RunMetrics::Mortgages(summarize(&merged.products));
            (merged.products, Vec::new(), metrics, merged.duplicates_dropped)
        }
        ProductLine::TermDeposits => {
            let merged = merge(deposit_batches);
            let metrics = RunMetrics::TermDeposits(summarize_deposits(&merged.products));
            (Vec::new(), merged.products, metrics, merged.duplicates_dropped)
        }
    };
    let succeeded = reports.iter().filter(|r| r.succeeded()).count();
    let names = OutputNames::for_run(line, &timestamp);
    let files = if succeeded > 0 {
        vec![names.csv.clone(), names.json.clone()]
    } else {
        Vec::new()
    };

    info!(
        succeeded,
        attempted = reports.len(),
        records = metrics.total_records(),
        duplicates = duplicates_dropped,
        "collection finished"
    );

    let report = CollectionReport {
        run_timestamp: timestamp,
        generated_at: now.to_rfc3339(),
        product_line: line,
        sources_attempted: reports.len(),
        sources_succeeded: succeeded,
        metrics,
        duplicates_dropped,
        records_skipped: skipped_total,
        sources: reports,
        files,
    };

    RunOutput {
        names,
        products,
        deposits,
        report,
    }
}

/// Publish the run's files atomically.
///
/// The collection report is always written; product files only when at least
/// one source succeeded.
pub fn write_outputs(dir: &Path, run: &RunOutput) -> Result<Vec<PathBuf>, AppError> {
    let mut staged = StagedWrite::new(dir)?;
    if !run.report.all_sources_failed() {
        let (csv, json) = match run.report.product_line {
            ProductLine::Mortgages => {
                let records = to_records(&run.products);
                (render_csv(&records)?, render_json(&records)?)
            }
            ProductLine::TermDeposits => {
                let records = to_deposit_records(&run.deposits);
                (render_csv(&records)?, render_json(&records)?)
            }
        };
        staged.stage(&run.names.csv, &csv)?;
        staged.stage(&run.names.json, &json)?;
    }
    staged.stage(&run.names.report, &render_report(&run.report)?)?;
    let written = staged.commit()?;
    info!(dir = %dir.display(), files = written.len(), "outputs written");
    Ok(written)
}

/// Fatal when no source produced data.
pub fn ensure_usable(report: &CollectionReport) -> Result<(), AppError> {
    if report.all_sources_failed() {
        return Err(AppError::all_sources_failed(report.sources_attempted));
    }
    Ok(())
}
