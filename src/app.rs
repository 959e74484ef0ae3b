//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - initialises logging
//! - resolves the source list (built-in, sources file, or CDR register)
//! - runs the collection pipeline and writes outputs
//! - prints the run summary

use std::time::{Duration, Instant};

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, RepayArgs, RunArgs, SourceArgs};
use crate::data::{Fetch, HttpFetcher, RetryPolicy, default_sources, discover_sources};
use crate::domain::{ProfileRegistry, RateSet, RunConfig, SourceKind, SourceSpec};
use crate::error::AppError;
use crate::io::{read_sources_file, validate_sources};
use crate::math::LoanTerms;

pub mod pipeline;

/// Entry point for the `hlr` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    // Schedulers invoke `hlr` with no arguments or with `--run-now`; both mean `hlr run`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Sources(args) => handle_sources(args),
        Command::Repay(args) => handle_repay(args),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("info,home_loan_rates=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args);
    let fetcher = http_fetcher()?;
    let (sources, profiles) = resolve_sources(&fetcher, &args.source, &config)?;

    let run = pipeline::run_collection(&fetcher, &sources, &profiles, &config);
    let written = pipeline::write_outputs(&config.output_dir, &run)?;

    println!("{}", crate::report::format_run_summary(&run.report, &written));
    pipeline::ensure_usable(&run.report)
}

fn handle_sources(args: SourceArgs) -> Result<(), AppError> {
    let config = RunConfig {
        request_timeout: Duration::from_secs(args.timeout_secs),
        product_line: args.product,
        ..RunConfig::default()
    };
    let fetcher = http_fetcher()?;
    let (sources, _) = resolve_sources(&fetcher, &args, &config)?;
    print!("{}", crate::report::format_sources(&sources));
    Ok(())
}

fn handle_repay(args: RepayArgs) -> Result<(), AppError> {
    if !(args.rate.is_finite() && args.rate >= 0.0) {
        return Err(AppError::config(format!("Invalid rate {}: expected a percentage >= 0.", args.rate)));
    }
    if args.term_years == 0 {
        return Err(AppError::config("Loan term must be at least one year."));
    }
    let rates = RateSet {
        variable: Some(args.rate),
        ..RateSet::default()
    };
    print!(
        "{}",
        crate::report::format_repayment_table(&rates, &LoanTerms::new(args.term_years))
    );
    Ok(())
}

fn http_fetcher() -> Result<HttpFetcher, AppError> {
    HttpFetcher::new().map_err(|e| AppError::config(format!("Failed to initialise HTTP client: {e}")))
}

pub fn run_config_from_args(args: &RunArgs) -> RunConfig {
    RunConfig {
        output_dir: args.output_dir.clone(),
        sources_file: args.source.sources.clone(),
        discover: args.source.discover,
        budget: Duration::from_secs(args.budget_secs),
        request_timeout: Duration::from_secs(args.source.timeout_secs),
        retries: args.retries.max(1),
        backoff: Duration::from_secs(args.backoff_secs),
        max_pages: args.max_pages.max(1),
        fetch_details: !args.no_details,
        term_years: args.term_years,
        product_line: args.source.product,
    }
}

/// Source list plus the profiles it may reference.
///
/// With `--discover`, CDR sources come from the register and configured
/// aggregated sources are kept; a failed discovery falls back to the
/// configured list.
pub fn resolve_sources(
    fetch: &dyn Fetch,
    args: &SourceArgs,
    config: &RunConfig,
) -> Result<(Vec<SourceSpec>, ProfileRegistry), AppError> {
    let (mut sources, profiles) = match &args.sources {
        Some(path) => {
            let file = read_sources_file(path)?;
            (file.sources, ProfileRegistry::with_custom(file.profiles))
        }
        None => (default_sources(config.product_line), ProfileRegistry::builtin()),
    };

    if args.discover {
        let retry = RetryPolicy {
            attempts: config.retries.max(1),
            backoff: config.backoff,
        };
        let deadline = Instant::now() + config.request_timeout * config.retries.max(1) + config.backoff * 3;
        match discover_sources(fetch, config.request_timeout, retry, deadline) {
            Ok(discovered) if !discovered.is_empty() => {
                sources.retain(|s| s.kind == SourceKind::Aggregated);
                let mut merged: Vec<SourceSpec> = discovered
                    .into_iter()
                    .filter(|d| {
                        let clash = sources.iter().any(|s| s.name == d.name);
                        if clash {
                            warn!(source = %d.name, "discovered source shares a configured name; skipped");
                        }
                        !clash
                    })
                    .collect();
                merged.extend(sources);
                sources = merged;
            }
            Ok(_) => warn!("register listed no banking brands; using the configured sources"),
            Err(err) => warn!(error = %err, "register discovery failed; using the configured sources"),
        }
    }

    validate_sources(&sources, &profiles)?;
    if !sources.iter().any(|s| s.active) {
        return Err(AppError::config("No active sources configured."));
    }
    Ok((sources, profiles))
}

/// Rewrite argv so `hlr` defaults to `hlr run`.
///
/// Rules:
/// - `hlr`                      -> `hlr run`
/// - `hlr --run-now ...`        -> `hlr run --run-now ...`
/// - `hlr --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "run" | "sources" | "repay");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "run flags".
    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
        return argv;
    }

    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::data::fetch::{FetchError, FetchRequest, FnFetch};
    use crate::domain::ProductLine;
    use serde_json::json;
    use std::io::Write;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_and_run_now_mean_run() {
        assert_eq!(rewrite_args(args(&["hlr"])), args(&["hlr", "run"]));
        assert_eq!(rewrite_args(args(&["hlr", "--run-now"])), args(&["hlr", "run", "--run-now"]));
        assert_eq!(rewrite_args(args(&["hlr", "--help"])), args(&["hlr", "--help"]));
        assert_eq!(rewrite_args(args(&["hlr", "repay", "--rate", "6"])), args(&["hlr", "repay", "--rate", "6"]));
    }

    #[test]
    fn run_flags_map_to_config() {
        let cli = Cli::parse_from(args(&[
            "hlr",
            "run",
            "--run-now",
            "--output-dir",
            "/tmp/out",
            "--budget-secs",
            "60",
            "--retries",
            "0",
            "--no-details",
            "--term-years",
            "25",
        ]));
        let Command::Run(run_args) = cli.command else {
            panic!("expected run");
        };
        let config = run_config_from_args(&run_args);
        assert_eq!(config.output_dir, std::path::PathBuf::from("/tmp/out"));
        assert_eq!(config.budget, Duration::from_secs(60));
        assert_eq!(config.retries, 1);
        assert!(!config.fetch_details);
        assert_eq!(config.term_years, 25);
        assert_eq!(config.product_line, ProductLine::Mortgages);
    }

    #[test]
    fn product_flag_selects_term_deposits() {
        let cli = Cli::parse_from(args(&["hlr", "run", "--product", "term-deposits"]));
        let Command::Run(run_args) = cli.command else {
            panic!("expected run");
        };
        let config = run_config_from_args(&run_args);
        assert_eq!(config.product_line, ProductLine::TermDeposits);

        let fetch = FnFetch(|_: &FetchRequest| Err(FetchError::Status(500)));
        let (sources, _) = resolve_sources(&fetch, &run_args.source, &config).unwrap();
        assert!(sources.last().unwrap().url.ends_with("/TERM_DEPOSITS/data.json"));
    }

    #[test]
    fn invalid_repay_rate_is_a_config_error() {
        let err = handle_repay(RepayArgs {
            rate: f64::NAN,
            term_years: 30,
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn discovery_replaces_cdr_sources_and_keeps_the_tracker() {
        let fetch = FnFetch(|_: &FetchRequest| {
            Ok(json!({"data": [{"brandName": "Bank One", "publicBaseUri": "https://one.test", "industries": ["banking"]}]}))
        });
        let source_args = SourceArgs {
            product: ProductLine::Mortgages,
            sources: None,
            discover: true,
            timeout_secs: 5,
        };
        let (sources, _) = resolve_sources(&fetch, &source_args, &RunConfig::default()).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name, "Bank One");
        assert_eq!(sources[1].kind, SourceKind::Aggregated);
    }

    #[test]
    fn repeated_register_brand_names_do_not_abort_the_run() {
        let fetch = FnFetch(|_: &FetchRequest| {
            Ok(json!({"data": [
                {"brandName": "Bank One", "publicBaseUri": "https://one.test", "industries": ["banking"]},
                {"brandName": "Bank One", "publicBaseUri": "https://one-business.test", "industries": ["banking"]},
                {"brandName": "Open Banking Tracker", "publicBaseUri": "https://tracker.test", "industries": ["banking"]}
            ]}))
        });
        let source_args = SourceArgs {
            product: ProductLine::Mortgages,
            sources: None,
            discover: true,
            timeout_secs: 5,
        };
        let (sources, _) = resolve_sources(&fetch, &source_args, &RunConfig::default()).unwrap();
        let names: Vec<&str> = sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Bank One", "Bank One (one-business.test)", "Open Banking Tracker"]);
        assert_eq!(sources[2].kind, SourceKind::Aggregated);
    }

    #[test]
    fn failed_discovery_keeps_configured_sources() {
        let fetch = FnFetch(|_: &FetchRequest| Err(FetchError::Status(404)));
        let source_args = SourceArgs {
            product: ProductLine::Mortgages,
            sources: None,
            discover: true,
            timeout_secs: 5,
        };
        let (sources, _) = resolve_sources(&fetch, &source_args, &RunConfig::default()).unwrap();
        assert_eq!(sources, default_sources(ProductLine::Mortgages));
    }

    #[test]
    fn sources_file_without_active_sources_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"{"sources": [{"name": "Off", "kind": "aggregated", "url": "https://off.test/data.json", "active": false}]}"#,
        )
        .unwrap();
        let fetch = FnFetch(|_: &FetchRequest| Err(FetchError::Timeout));
        let source_args = SourceArgs {
            product: ProductLine::Mortgages,
            sources: Some(file.path().to_path_buf()),
            discover: false,
            timeout_secs: 5,
        };
        let err = resolve_sources(&fetch, &source_args, &RunConfig::default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
