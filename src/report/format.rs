//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the pipeline code stays free of presentation details
//! - output changes are localized

use std::path::PathBuf;

use crate::aggregate::RunMetrics;
use crate::domain::{RateSet, SourceSpec};
use crate::io::CollectionReport;
use crate::math::{LoanTerms, repayment_table};

fn money(amount: Option<f64>) -> String {
    match amount {
        Some(v) => format!("${v:>10.2}"),
        None => format!("{:>11}", "n/a"),
    }
}

fn principal_label(principal: f64) -> String {
    if principal >= 1_000_000.0 {
        format!("${:.0}M", principal / 1_000_000.0)
    } else {
        format!("${:.0}K", principal / 1_000.0)
    }
}

/// Run summary: per-source outcomes, coverage metrics, written files.
pub fn format_run_summary(report: &CollectionReport, written: &[PathBuf]) -> String {
    let mut out = String::new();

    out.push_str("=== hlr - Home Loan Rate Collection ===\n");
    out.push_str(&format!("Run: {}\n", report.run_timestamp));
    out.push_str(&format!(
        "Sources: {}/{} succeeded\n",
        report.sources_succeeded, report.sources_attempted
    ));

    out.push_str("\nSources:\n");
    for s in &report.sources {
        let status = if s.succeeded() { "ok" } else { "FAILED" };
        out.push_str(&format!(
            "  {:<32} {:<10} {:>6} records  {:>6}ms  {}",
            s.name, s.kind, s.records, s.elapsed_ms, status
        ));
        if s.detail_failures > 0 {
            out.push_str(&format!("  ({} detail failures)", s.detail_failures));
        }
        if let Some(err) = &s.error {
            out.push_str(&format!("  {err}"));
        }
        out.push('\n');
    }

    match &report.metrics {
        RunMetrics::Mortgages(m) => {
            out.push_str("\nProducts:\n");
            out.push_str(&format!(
                "  total={} | brands={} | duplicates dropped={} | skipped={}\n",
                m.total_records, m.distinct_brands, report.duplicates_dropped, report.records_skipped
            ));
            out.push_str(&format!(
                "  variable rate {:.1}% | fixed rate {:.1}% | any feature {:.1}%\n",
                m.variable_rate_pct, m.fixed_rate_pct, m.feature_flag_pct
            ));
            out.push_str(&format!(
                "  flags inferred from text={} | ambiguous tags={}\n",
                m.inferred_flags, m.ambiguous_tags
            ));
        }
        RunMetrics::TermDeposits(m) => {
            out.push_str("\nTerm deposit rates:\n");
            out.push_str(&format!(
                "  total={} | products={} | brands={} | duplicates dropped={} | skipped={}\n",
                m.total_records, m.distinct_products, m.distinct_brands, report.duplicates_dropped, report.records_skipped
            ));
            let best = m.best_rate_12m.map_or_else(|| "n/a".to_string(), |r| format!("{r:.2}%"));
            out.push_str(&format!(
                "  with rate {:.1}% | promotional={} | best 12 month rate {best}\n",
                m.with_rate_pct, m.promotional
            ));
        }
    }

    if !written.is_empty() {
        out.push_str("\nWritten:\n");
        for path in written {
            out.push_str(&format!("  {}\n", path.display()));
        }
    }

    out
}

/// Configured sources, one per line.
pub fn format_sources(sources: &[SourceSpec]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<32} {:<10} {:>8} {:<10} URL\n",
        "NAME", "KIND", "PRIORITY", "PROFILE"
    ));
    for s in sources {
        let name = if s.active { s.name.clone() } else { format!("{} (inactive)", s.name) };
        out.push_str(&format!(
            "{:<32} {:<10} {:>8} {:<10} {}\n",
            name,
            s.kind.display_name(),
            s.priority(),
            s.profile_name(),
            s.url
        ));
    }
    out
}

/// Monthly repayments for every available rate across the standard principals.
pub fn format_repayment_table(rates: &RateSet, terms: &LoanTerms) -> String {
    let mut out = String::new();
    out.push_str(&format!("Term: {} years\n", terms.term_years));
    for row in repayment_table(rates, terms) {
        out.push_str(&format!("\n{} {:.2}% p.a.\n", row.slot.label(), row.annual_rate));
        for (principal, repayment) in terms.principals.iter().zip(row.amounts) {
            out.push_str(&format!(
                "  {:>6}  {}/month\n",
                principal_label(*principal),
                money(repayment.amount())
            ));
        }
    }
    out
}
