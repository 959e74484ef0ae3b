//! Built-in source list and CDR register discovery.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{info, warn};

use crate::data::fetch::{Fetch, FetchRequest, RetryPolicy, get_with_retry};
use crate::data::source::SourceError;
use crate::domain::{ProductLine, SourceKind, SourceSpec};

pub const REGISTER_URL: &str = "https://api.cdr.gov.au/cdr-register/v1/banking/data-holders/brands/summary";
const TRACKER_BASE: &str = "https://raw.githubusercontent.com/LukePrior/open-banking-tracker/main/aggregate";

const PRODUCTS_PATH: &str = "cds-au/v1/banking/products";
const CDR_VERSION: &str = "3";

fn cdr_source(name: &str, brand_id: &str, url: &str) -> SourceSpec {
    let mut spec = SourceSpec::new(name, SourceKind::CdrApi, url);
    spec.version = Some(CDR_VERSION.to_string());
    spec.brand_id = Some(brand_id.to_string());
    spec.brand_name = Some(name.to_string());
    spec
}

/// Aggregated tracker feed for one product category.
pub fn tracker_url(line: ProductLine) -> String {
    format!("{TRACKER_BASE}/{}/data.json", line.category())
}

/// Major-bank CDR endpoints plus the aggregated tracker fallback.
pub fn default_sources(line: ProductLine) -> Vec<SourceSpec> {
    vec![
        cdr_source("ANZ", "anz", "https://api.anz/cds-au/v1/banking/products"),
        cdr_source(
            "CommBank",
            "commbank",
            "https://api.commbank.com.au/public/cds-au/v1/banking/products",
        ),
        cdr_source(
            "National Australia Bank",
            "national-australia-bank",
            "https://openbank.api.nab.com.au/cds-au/v1/banking/products",
        ),
        cdr_source(
            "Westpac",
            "westpac",
            "https://digital-api.westpac.com.au/cds-au/v1/banking/products",
        ),
        tracker_source(line),
    ]
}

fn tracker_source(line: ProductLine) -> SourceSpec {
    SourceSpec::new("Open Banking Tracker", SourceKind::Aggregated, tracker_url(line))
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    #[serde(default)]
    data: Vec<RegisterBrand>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBrand {
    #[serde(default)]
    brand_id: String,
    #[serde(default)]
    brand_name: String,
    #[serde(default)]
    public_base_uri: String,
    #[serde(default)]
    industries: Vec<String>,
}

/// `Bendigo & Adelaide Bank` → `bendigo-adelaide-bank`.
pub fn brand_slug(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Products endpoint under a data holder's public base URI.
pub fn products_endpoint(public_base_uri: &str) -> String {
    let base = public_base_uri.trim_end_matches('/');
    if base.ends_with(PRODUCTS_PATH) {
        base.to_string()
    } else {
        format!("{base}/{PRODUCTS_PATH}")
    }
}

/// Host part of an http(s) URL.
fn host(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split(['/', '?', '#']).next().unwrap_or(rest)
}

/// Build the CDR source list from the public register of banking data holders.
///
/// Brands without a public base URI are skipped; brands sharing an endpoint
/// are listed once. Source names are unique: a repeated brand name is
/// qualified with its endpoint host. The register `brandId` becomes the
/// source brand id so records line up with aggregated feeds keyed the same way.
pub fn discover_sources(
    fetch: &dyn Fetch,
    timeout: Duration,
    retry: RetryPolicy,
    deadline: Instant,
) -> Result<Vec<SourceSpec>, SourceError> {
    let req = FetchRequest::new(REGISTER_URL, timeout).header("x-v", "1");
    let doc = get_with_retry(fetch, &req, retry, deadline)?;
    let register: RegisterResponse =
        serde_json::from_value(doc).map_err(|e| SourceError::Malformed(format!("register: {e}")))?;

    let mut seen_urls = HashSet::new();
    let mut names = HashSet::new();
    let mut sources = Vec::new();
    for brand in register.data {
        let banking = brand.industries.is_empty() || brand.industries.iter().any(|i| i.eq_ignore_ascii_case("banking"));
        if !banking {
            continue;
        }
        if brand.public_base_uri.trim().is_empty() {
            warn!(brand = %brand.brand_name, "register entry has no public base URI");
            continue;
        }
        let url = products_endpoint(brand.public_base_uri.trim());
        if !seen_urls.insert(url.clone()) {
            continue;
        }

        let brand_name = brand.brand_name.trim();
        let mut name = if brand_name.is_empty() { host(&url).to_string() } else { brand_name.to_string() };
        if names.contains(&name) {
            name = format!("{name} ({})", host(&url));
            warn!(brand = brand_name, name = %name, "brand name listed more than once; qualifying with host");
        }
        if !names.insert(name.clone()) {
            warn!(brand = brand_name, url = %url, "duplicate register entry skipped");
            continue;
        }

        let brand_id = match brand.brand_id.trim() {
            "" => brand_slug(&name),
            id => id.to_string(),
        };
        let mut spec = cdr_source(&name, &brand_id, &url);
        if !brand_name.is_empty() {
            spec.brand_name = Some(brand_name.to_string());
        }
        sources.push(spec);
    }
    info!(brands = sources.len(), "discovered data holders from the CDR register");
    Ok(sources)
}
