//! `home-loan-rates` library crate.
//!
//! The binary (`hlr`) is a thin wrapper around this library so that:
//!
//! - the pipeline is testable without spawning processes or touching the network
//! - adapters, normalization and export can be reused by other front-ends
//! - code stays easy to navigate as sources and profiles are added

pub mod aggregate;
pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod normalize;
pub mod report;
