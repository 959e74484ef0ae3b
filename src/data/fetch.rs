//! HTTP transport with retry.
//!
//! Sources talk to the network through the `Fetch` trait so that adapters can
//! be exercised against canned documents in tests. The production
//! implementation is a blocking `reqwest` client.

use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

const AGENT: &str = concat!("home-loan-rates/", env!("CARGO_PKG_VERSION"));

/// One GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            timeout,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// The same request without the named headers.
    pub fn without_headers(&self, names: &[&str]) -> Self {
        Self {
            url: self.url.clone(),
            headers: self
                .headers
                .iter()
                .filter(|(k, _)| !names.iter().any(|n| n.eq_ignore_ascii_case(k)))
                .cloned()
                .collect(),
            timeout: self.timeout,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("invalid JSON: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether another attempt may succeed. Client errors (4xx) never are.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Connect(_) | FetchError::Transport(_) => true,
            FetchError::Status(code) => (500..600).contains(code),
            FetchError::Decode(_) => false,
        }
    }
}

/// Retries used up, or a non-retryable failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{cause} (after {attempts} attempt(s))")]
pub struct Exhausted {
    pub attempts: u32,
    pub cause: FetchError,
}

pub trait Fetch: Sync {
    fn get_json(&self, request: &FetchRequest) -> Result<Value, FetchError>;
}

/// Blocking `reqwest` transport.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(AGENT)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if err.is_connect() {
        FetchError::Connect(err.to_string())
    } else if err.is_decode() {
        FetchError::Decode(err.to_string())
    } else {
        FetchError::Transport(err.to_string())
    }
}

impl Fetch for HttpFetcher {
    fn get_json(&self, request: &FetchRequest) -> Result<Value, FetchError> {
        let mut req = self
            .client
            .get(&request.url)
            .timeout(request.timeout)
            .header(ACCEPT, "application/json");
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let resp = req.send().map_err(classify)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = resp.text().map_err(classify)?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// Attempts per request and the linear backoff unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// GET with retry on transient failures.
///
/// Waits `backoff * attempt` between attempts, never sleeping past `deadline`;
/// when the deadline leaves no room for another attempt the last error is
/// returned.
pub fn get_with_retry(
    fetch: &dyn Fetch,
    request: &FetchRequest,
    policy: RetryPolicy,
    deadline: Instant,
) -> Result<Value, Exhausted> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let err = match fetch.get_json(request) {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_transient() || attempt >= attempts {
            return Err(Exhausted { attempts: attempt, cause: err });
        }

        let wait = policy.backoff * attempt;
        let now = Instant::now();
        if now + wait >= deadline {
            debug!(url = %request.url, "no time left for another attempt");
            return Err(Exhausted { attempts: attempt, cause: err });
        }
        warn!(url = %request.url, attempt, error = %err, "request failed; retrying in {:?}", wait);
        std::thread::sleep(wait);
    }
}

#[cfg(test)]
pub(crate) struct FnFetch<F>(pub F);

#[cfg(test)]
impl<F> Fetch for FnFetch<F>
where
    F: Fn(&FetchRequest) -> Result<Value, FetchError> + Sync,
{
    fn get_json(&self, request: &FetchRequest) -> Result<Value, FetchError> {
        (self.0)(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            backoff: Duration::from_millis(1),
        }
    }

    fn far() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[test]
    fn transient_failures_are_retried() {
        let calls = AtomicU32::new(0);
        let fetch = FnFetch(|_: &FetchRequest| {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(FetchError::Status(503))
            } else {
                Ok(json!({"ok": true}))
            }
        });
        let req = FetchRequest::new("https://bank.test", Duration::from_secs(1));
        let value = get_with_retry(&fetch, &req, policy(), far()).unwrap();
        assert_eq!(value, json!({"ok": true}));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn client_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let fetch = FnFetch(|_: &FetchRequest| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::Status(404))
        });
        let req = FetchRequest::new("https://bank.test", Duration::from_secs(1));
        let err = get_with_retry(&fetch, &req, policy(), far()).unwrap_err();
        assert_eq!(err, Exhausted { attempts: 1, cause: FetchError::Status(404) });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rate_limited_responses_are_not_retried() {
        let calls = AtomicU32::new(0);
        let fetch = FnFetch(|_: &FetchRequest| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::Status(429))
        });
        let req = FetchRequest::new("https://bank.test", Duration::from_secs(1));
        let err = get_with_retry(&fetch, &req, policy(), far()).unwrap_err();
        assert_eq!(err, Exhausted { attempts: 1, cause: FetchError::Status(429) });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retries_stop_at_the_attempt_limit() {
        let fetch = FnFetch(|_: &FetchRequest| Err(FetchError::Timeout));
        let req = FetchRequest::new("https://bank.test", Duration::from_secs(1));
        let err = get_with_retry(&fetch, &req, policy(), far()).unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(err.cause, FetchError::Timeout);
    }

    #[test]
    fn backoff_never_sleeps_past_the_deadline() {
        let fetch = FnFetch(|_: &FetchRequest| Err(FetchError::Connect("reset".into())));
        let req = FetchRequest::new("https://bank.test", Duration::from_secs(1));
        let slow = RetryPolicy {
            attempts: 5,
            backoff: Duration::from_secs(30),
        };
        let started = Instant::now();
        let err = get_with_retry(&fetch, &req, slow, Instant::now() + Duration::from_millis(50)).unwrap_err();
        assert_eq!(err.attempts, 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn transient_classification() {
        assert!(!FetchError::Status(429).is_transient());
        assert!(FetchError::Status(502).is_transient());
        assert!(!FetchError::Status(406).is_transient());
        assert!(!FetchError::Decode("eof".into()).is_transient());
    }

    #[test]
    fn header_removal_is_case_insensitive() {
        let req = FetchRequest::new("https://bank.test", Duration::from_secs(1))
            .header("x-v", "3")
            .header("x-min-v", "1")
            .header("x-fapi-interaction-id", "abc");
        let stripped = req.without_headers(&["X-V", "x-min-v"]);
        assert_eq!(stripped.headers, vec![("x-fapi-interaction-id".to_string(), "abc".to_string())]);
    }
}
