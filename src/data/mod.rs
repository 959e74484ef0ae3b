//! Upstream data: HTTP transport, source adapters and the source list.

pub mod fetch;
pub mod register;
pub mod source;

pub use fetch::{Exhausted, Fetch, FetchError, FetchRequest, HttpFetcher, RetryPolicy};
pub use register::{default_sources, discover_sources};
pub use source::{FetchSettings, RawBatch, SourceError, collect_source};
