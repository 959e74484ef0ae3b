//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the canonical product record and its enumerations (`CanonicalProduct`,
//!   `LoanPurpose`, `RepaymentType`, `Extraction`)
//! - term deposit rate variants and the product line selector (`DepositRate`,
//!   `ProductLine`)
//! - source and run configuration (`SourceSpec`, `RunConfig`)
//! - per-source mapping profiles (`MappingProfile`, `ProfileRegistry`)

pub mod deposit;
pub mod profile;
pub mod types;

pub use deposit::*;
pub use profile::*;
pub use types::*;
