//! Command-line parsing for the home loan rate collector.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the collection code. Every run option can also be set through
//! an `HLR_*` environment variable (a `.env` file is loaded first).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::ProductLine;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "hlr",
    version,
    about = "Australian home loan rate collector (CDR open banking)"
)]
pub struct Cli {
    /// Debug-level logging for this crate (overrides RUST_LOG).
    #[arg(short, long, global = true, env = "HLR_VERBOSE")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Collect products from every configured source and write CSV, JSON and a report.
    Run(RunArgs),
    /// Print the configured sources and exit.
    Sources(SourceArgs),
    /// Print monthly repayments for one annual rate.
    Repay(RepayArgs),
}

/// Where the source list comes from.
#[derive(Debug, Args, Clone)]
pub struct SourceArgs {
    /// Product category to collect.
    #[arg(long, value_enum, default_value_t = ProductLine::Mortgages, env = "HLR_PRODUCT")]
    pub product: ProductLine,

    /// JSON file with `sources` (and optional custom `profiles`); defaults to the built-in list.
    #[arg(long, value_name = "JSON", env = "HLR_SOURCES")]
    pub sources: Option<PathBuf>,

    /// Build the CDR source list from the public CDR register.
    #[arg(long, env = "HLR_DISCOVER")]
    pub discover: bool,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30, env = "HLR_TIMEOUT_SECS")]
    pub timeout_secs: u64,
}

/// Options for a collection run.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Run immediately (accepted for schedulers; a run always starts at once).
    #[arg(long)]
    pub run_now: bool,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Directory receiving the timestamped output files.
    #[arg(short, long, default_value = "mortgage_data", env = "HLR_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Wall-clock budget for fetching, in seconds.
    #[arg(long, default_value_t = 600, env = "HLR_BUDGET_SECS")]
    pub budget_secs: u64,

    /// Attempts per request, including the first.
    #[arg(long, default_value_t = 3, env = "HLR_RETRIES")]
    pub retries: u32,

    /// Linear backoff unit between attempts, in seconds.
    #[arg(long, default_value_t = 2)]
    pub backoff_secs: u64,

    /// Maximum product-list pages per CDR source.
    #[arg(long, default_value_t = 20)]
    pub max_pages: usize,

    /// Skip per-product detail requests (summaries only).
    #[arg(long)]
    pub no_details: bool,

    /// Loan term used for repayment columns.
    #[arg(long, default_value_t = 30, env = "HLR_TERM_YEARS")]
    pub term_years: u32,
}

/// Options for the repayment table.
#[derive(Debug, Args)]
pub struct RepayArgs {
    /// Annual rate in percent (e.g. 6.24).
    #[arg(long)]
    pub rate: f64,

    #[arg(long, default_value_t = 30)]
    pub term_years: u32,
}
