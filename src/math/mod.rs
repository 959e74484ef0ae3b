//! Mathematical utilities: loan amortization.

pub mod amortization;

pub use amortization::*;
