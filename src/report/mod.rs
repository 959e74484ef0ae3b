//! Reporting utilities: formatted terminal output for runs, sources and repayments.

pub mod format;

pub use format::*;
