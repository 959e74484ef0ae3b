//! Collection report written next to the product files.

use serde::Serialize;

use crate::aggregate::{RunMetrics, SourceReport};
use crate::domain::ProductLine;
use crate::error::AppError;

/// Machine-readable summary of one run, for schedulers and dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionReport {
    pub run_timestamp: String,
    pub generated_at: String,
    pub product_line: ProductLine,
    pub sources_attempted: usize,
    pub sources_succeeded: usize,
    pub metrics: RunMetrics,
    pub duplicates_dropped: usize,
    pub records_skipped: usize,
    pub sources: Vec<SourceReport>,
    /// Product files of this run; empty when no source succeeded.
    pub files: Vec<String>,
}

impl CollectionReport {
    pub fn all_sources_failed(&self) -> bool {
        self.sources_succeeded == 0
    }
}

pub fn render_report(report: &CollectionReport) -> Result<Vec<u8>, AppError> {
    serde_json::to_vec_pretty(report)
        .map_err(|e| AppError::sink(format!("Failed to render collection report: {e}")))
}

/// Output file names for a run of one product line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNames {
    pub csv: String,
    pub json: String,
    pub report: String,
}

impl OutputNames {
    pub fn for_run(line: ProductLine, ts: &str) -> Self {
        let stem = line.file_stem();
        Self {
            csv: format!("{stem}_{ts}.csv"),
            json: format!("{stem}_{ts}.json"),
            report: format!("collection_report_{ts}.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{SourceStatus, SummaryMetrics};

    #[test]
    fn report_serializes_sources_and_metrics() {
        let report = CollectionReport {
            run_timestamp: "20250901_120000".to_string(),
            generated_at: "2025-09-01T12:00:00+10:00".to_string(),
            product_line: ProductLine::Mortgages,
            sources_attempted: 2,
            sources_succeeded: 1,
            metrics: RunMetrics::Mortgages(SummaryMetrics::default()),
            duplicates_dropped: 0,
            records_skipped: 0,
            sources: vec![SourceReport {
                name: "Bank".to_string(),
                kind: "cdr-api",
                priority: 10,
                status: SourceStatus::Failed,
                records: 0,
                skipped: 0,
                detail_failures: 0,
                error: Some("HTTP status 503".to_string()),
                elapsed_ms: 12,
            }],
            files: Vec::new(),
        };
        let value: serde_json::Value = serde_json::from_slice(&render_report(&report).unwrap()).unwrap();
        assert_eq!(value["sources_succeeded"], 1);
        assert_eq!(value["sources"][0]["status"], "failed");
        assert_eq!(value["metrics"]["total_records"], 0);
        assert_eq!(value["metrics"]["variable_rate_pct"], 0.0);
        assert_eq!(value["product_line"], "mortgages");
        assert!(!report.all_sources_failed());
    }

    #[test]
    fn names_follow_line_and_timestamp() {
        let names = OutputNames::for_run(ProductLine::Mortgages, "20250901_120000");
        assert_eq!(names.csv, "mortgages_20250901_120000.csv");
        assert_eq!(names.report, "collection_report_20250901_120000.json");

        let names = OutputNames::for_run(ProductLine::TermDeposits, "20250901_120000");
        assert_eq!(names.json, "term_deposits_20250901_120000.json");
    }
}
