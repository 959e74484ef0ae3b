//! Source adapters: one configured endpoint → raw product records.
//!
//! - CDR sources are paged through `links.next`, filtered to the profile's
//!   product categories, and each product summary is merged with its detail
//!   document (`{url}/{productId}`) when detail fetching is enabled.
//! - Aggregated sources are a single document: an array of products, or an
//!   object wrapping one.
//!
//! Every failure is returned as a `SourceError`; nothing here aborts the run.

use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::data::fetch::{Exhausted, Fetch, FetchError, FetchRequest, RetryPolicy, get_with_retry};
use crate::domain::{MappingProfile, RawProduct, RunConfig, SourceKind, SourceSpec};
use crate::normalize::matches_category;
use crate::normalize::value::{lookup, text};

const VERSION_HEADERS: [&str; 2] = ["x-v", "x-min-v"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(#[from] Exhausted),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("run budget exhausted before the source completed")]
    BudgetExhausted,
    #[error("unknown mapping profile '{0}'")]
    UnknownProfile(String),
}

/// Raw records gathered from one source.
#[derive(Debug, Clone, Default)]
pub struct RawBatch {
    pub products: Vec<RawProduct>,
    /// Detail documents that could not be fetched (summary kept).
    pub detail_failures: usize,
    pub pages: usize,
}

/// Network settings shared by every adapter in a run.
#[derive(Debug, Clone, Copy)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub max_pages: usize,
    pub fetch_details: bool,
}

impl FetchSettings {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            timeout: config.request_timeout,
            retry: RetryPolicy {
                attempts: config.retries,
                backoff: config.backoff,
            },
            max_pages: config.max_pages,
            fetch_details: config.fetch_details,
        }
    }
}

/// Per-source request builder; every request is capped by the time left in the run.
struct Requester<'a> {
    fetch: &'a dyn Fetch,
    spec: &'a SourceSpec,
    settings: &'a FetchSettings,
    deadline: Instant,
}

impl Requester<'_> {
    fn request(&self, url: &str) -> Result<FetchRequest, SourceError> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(SourceError::BudgetExhausted);
        }
        let mut req = FetchRequest::new(url, self.spec.timeout(self.settings.timeout).min(remaining));
        if let Some(v) = &self.spec.version {
            req = req.header("x-v", v);
        }
        if let Some(v) = &self.spec.min_version {
            req = req.header("x-min-v", v);
        }
        Ok(req)
    }

    fn get(&self, url: &str) -> Result<Value, SourceError> {
        let req = self.request(url)?;
        match get_with_retry(self.fetch, &req, self.settings.retry, self.deadline) {
            Err(Exhausted {
                cause: FetchError::Status(406),
                ..
            }) if !req.headers.is_empty() => {
                info!(source = %self.spec.name, url, "version not supported; retrying without version headers");
                let fallback = self.request(url)?.without_headers(&VERSION_HEADERS);
                Ok(get_with_retry(self.fetch, &fallback, self.settings.retry, self.deadline)?)
            }
            other => Ok(other?),
        }
    }
}

/// Fetch every raw product a source offers.
pub fn collect_source(
    fetch: &dyn Fetch,
    spec: &SourceSpec,
    profile: &MappingProfile,
    settings: &FetchSettings,
    deadline: Instant,
) -> Result<RawBatch, SourceError> {
    let requester = Requester {
        fetch,
        spec,
        settings,
        deadline,
    };
    match spec.kind {
        SourceKind::CdrApi => collect_cdr(&requester, profile),
        SourceKind::Aggregated => collect_aggregated(&requester, profile),
    }
}

fn product_objects(items: &[Value], source: &str) -> Vec<RawProduct> {
    let objects: Vec<RawProduct> = items.iter().filter_map(|v| v.as_object().cloned()).collect();
    if objects.len() < items.len() {
        warn!(source, dropped = items.len() - objects.len(), "ignoring non-object product entries");
    }
    objects
}

fn collect_cdr(req: &Requester<'_>, profile: &MappingProfile) -> Result<RawBatch, SourceError> {
    let source = req.spec.name.as_str();
    let mut batch = RawBatch::default();
    let mut next = Some(req.spec.url.clone());

    while let Some(url) = next.take() {
        if batch.pages >= req.settings.max_pages {
            warn!(source, pages = batch.pages, "page limit reached; remaining pages skipped");
            break;
        }
        let doc = match req.get(&url) {
            Ok(doc) => doc,
            Err(err) if batch.pages == 0 => return Err(err),
            Err(err) => {
                warn!(source, page = batch.pages + 1, error = %err, "stopping pagination early");
                break;
            }
        };
        let items = doc
            .pointer("/data/products")
            .and_then(Value::as_array)
            .ok_or_else(|| SourceError::Malformed("expected data.products array".to_string()))?;
        batch.pages += 1;

        let total = items.len();
        let products: Vec<RawProduct> = product_objects(items, source)
            .into_iter()
            .filter(|p| matches_category(p, profile))
            .collect();
        debug!(source, page = batch.pages, total, kept = products.len(), "product page");
        batch.products.extend(products);

        next = doc
            .pointer("/links/next")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty() && *n != url)
            .map(str::to_string);
    }

    if req.settings.fetch_details {
        merge_details(req, &mut batch);
    }
    info!(
        source,
        products = batch.products.len(),
        pages = batch.pages,
        detail_failures = batch.detail_failures,
        "source collected"
    );
    Ok(batch)
}

/// Overlay each summary with the fields of its detail document.
fn merge_details(req: &Requester<'_>, batch: &mut RawBatch) {
    let source = req.spec.name.as_str();
    let base = req.spec.url.trim_end_matches('/');
    let total = batch.products.len();

    for (i, product) in batch.products.iter_mut().enumerate() {
        let Some(id) = lookup(product, "productId").and_then(text) else {
            continue;
        };
        let detail = match req.get(&format!("{base}/{id}")) {
            Ok(doc) => doc,
            Err(SourceError::BudgetExhausted) => {
                batch.detail_failures += total - i;
                warn!(source, remaining = total - i, "run budget exhausted; keeping product summaries");
                return;
            }
            Err(err) => {
                batch.detail_failures += 1;
                debug!(source, product_id = %id, error = %err, "product detail unavailable");
                continue;
            }
        };
        match detail.get("data").and_then(Value::as_object) {
            Some(fields) => {
                for (key, value) in fields {
                    product.insert(key.clone(), value.clone());
                }
            }
            None => {
                batch.detail_failures += 1;
                debug!(source, product_id = %id, "product detail has no data object");
            }
        }
    }
}

fn collect_aggregated(req: &Requester<'_>, profile: &MappingProfile) -> Result<RawBatch, SourceError> {
    let source = req.spec.name.as_str();
    let doc = req.get(&req.spec.url)?;
    let items = doc
        .as_array()
        .or_else(|| doc.get("data").and_then(Value::as_array))
        .or_else(|| doc.get("products").and_then(Value::as_array))
        .or_else(|| doc.pointer("/data/products").and_then(Value::as_array))
        .ok_or_else(|| SourceError::Malformed("expected an array of products".to_string()))?;

    let products: Vec<RawProduct> = product_objects(items, source)
        .into_iter()
        .filter(|p| matches_category(p, profile))
        .collect();
    info!(source, products = products.len(), "source collected");
    Ok(RawBatch {
        products,
        detail_failures: 0,
        pages: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fetch::FnFetch;
    use serde_json::json;

    const BASE: &str = "https://bank.test/cds-au/v1/banking/products";

    fn settings() -> FetchSettings {
        FetchSettings {
            timeout: Duration::from_secs(5),
            retry: RetryPolicy {
                attempts: 2,
                backoff: Duration::from_millis(1),
            },
            max_pages: 10,
            fetch_details: true,
        }
    }

    fn cdr_spec() -> SourceSpec {
        let mut spec = SourceSpec::new("Bank", SourceKind::CdrApi, BASE);
        spec.version = Some("3".to_string());
        spec
    }

    fn far() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    fn page(products: Value, next: Option<&str>) -> Value {
        json!({"data": {"products": products}, "links": {"next": next}})
    }

    #[test]
    fn cdr_pages_filter_and_merge_details() {
        let fetch = FnFetch(|req: &FetchRequest| {
            let url = req.url.as_str();
            if url == BASE {
                Ok(page(
                    json!([
                        {"productId": "hl-1", "productCategory": "RESIDENTIAL_MORTGAGES", "name": "Home Loan"},
                        {"productId": "cc-1", "productCategory": "CRED_AND_CHRG_CARDS", "name": "Card"}
                    ]),
                    Some("https://bank.test/page2"),
                ))
            } else if url == "https://bank.test/page2" {
                Ok(page(json!([{"productId": "hl-2", "productCategory": "RESIDENTIAL_MORTGAGES"}]), None))
            } else if url == format!("{BASE}/hl-1") {
                Ok(json!({"data": {"productId": "hl-1", "lendingRates": [{"rate": "0.06"}]}}))
            } else {
                Err(FetchError::Status(404))
            }
        });
        let batch = collect_source(&fetch, &cdr_spec(), &MappingProfile::cdr(), &settings(), far()).unwrap();
        assert_eq!(batch.pages, 2);
        assert_eq!(batch.products.len(), 2);
        assert!(batch.products[0].contains_key("lendingRates"));
        assert_eq!(batch.products[0]["name"], "Home Loan");
        assert_eq!(batch.detail_failures, 1);
    }

    #[test]
    fn version_rejection_falls_back_to_unversioned_request() {
        let fetch = FnFetch(|req: &FetchRequest| {
            if req.headers.iter().any(|(k, _)| k == "x-v") {
                Err(FetchError::Status(406))
            } else {
                Ok(page(json!([{"productId": "hl-1", "productCategory": "RESIDENTIAL_MORTGAGES"}]), None))
            }
        });
        let mut s = settings();
        s.fetch_details = false;
        let batch = collect_source(&fetch, &cdr_spec(), &MappingProfile::cdr(), &s, far()).unwrap();
        assert_eq!(batch.products.len(), 1);
    }

    #[test]
    fn first_page_failure_fails_the_source() {
        let fetch = FnFetch(|_: &FetchRequest| Err(FetchError::Status(500)));
        let err = collect_source(&fetch, &cdr_spec(), &MappingProfile::cdr(), &settings(), far()).unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(Exhausted { attempts: 2, .. })));
    }

    #[test]
    fn missing_product_list_is_malformed() {
        let fetch = FnFetch(|_: &FetchRequest| Ok(json!({"data": {}})));
        let err = collect_source(&fetch, &cdr_spec(), &MappingProfile::cdr(), &settings(), far()).unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }

    #[test]
    fn expired_deadline_is_budget_exhausted() {
        let fetch = FnFetch(|_: &FetchRequest| Ok(json!([])));
        let spec = SourceSpec::new("Tracker", SourceKind::Aggregated, "https://tracker.test/data.json");
        let err = collect_source(&fetch, &spec, &MappingProfile::aggregated(), &settings(), Instant::now()).unwrap_err();
        assert_eq!(err, SourceError::BudgetExhausted);
    }

    #[test]
    fn aggregated_accepts_plain_and_wrapped_arrays() {
        let spec = SourceSpec::new("Tracker", SourceKind::Aggregated, "https://tracker.test/data.json");
        let profile = MappingProfile::aggregated();

        let plain = FnFetch(|_: &FetchRequest| Ok(json!([{"productId": "a"}, 7, {"productId": "b"}])));
        let batch = collect_source(&plain, &spec, &profile, &settings(), far()).unwrap();
        assert_eq!(batch.products.len(), 2);

        let wrapped = FnFetch(|_: &FetchRequest| Ok(json!({"data": [{"productId": "a"}]})));
        let batch = collect_source(&wrapped, &spec, &profile, &settings(), far()).unwrap();
        assert_eq!(batch.products.len(), 1);

        let junk = FnFetch(|_: &FetchRequest| Ok(json!({"message": "rate limited"})));
        let err = collect_source(&junk, &spec, &profile, &settings(), far()).unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }

    #[test]
    fn requests_are_capped_by_the_remaining_budget() {
        let fetch = FnFetch(|req: &FetchRequest| {
            assert!(req.timeout <= Duration::from_secs(2));
            Ok(json!([]))
        });
        let mut spec = SourceSpec::new("Tracker", SourceKind::Aggregated, "https://tracker.test/data.json");
        spec.timeout_secs = Some(30);
        let deadline = Instant::now() + Duration::from_secs(2);
        collect_source(&fetch, &spec, &MappingProfile::aggregated(), &settings(), deadline).unwrap();
    }
}
