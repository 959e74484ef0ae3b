//! Input/output helpers.
//!
//! - sources file read + validation (`sources`)
//! - CSV/JSON product exports (`export`)
//! - collection report (`report`)
//! - atomic publication of output files (`atomic`)

pub mod atomic;
pub mod export;
pub mod report;
pub mod sources;

pub use atomic::*;
pub use export::*;
pub use report::*;
pub use sources::*;
