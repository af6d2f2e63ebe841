//! SPARQL query client.
//!
//! [`GraphQueryClient`] drives a [`SparqlTransport`] through a data-driven
//! retry machine ([`RetryPolicy`]): HTTP 429 triggers a fixed cooldown and a
//! repeat of the same request, timeouts and 5xx back off linearly, and all
//! other failures are fatal for the call. The transport trait is the seam
//! that lets tests script responses without a network or real sleeps.

use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use url::Url;

use crate::FetchConfig;

/// One result row: SPARQL variable name → plain value.
pub type Binding = BTreeMap<String, String>;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The retryable class (timeout, 429, 5xx) after the retry budget ran out.
    #[error("giving up after {attempts} attempts: {last}")]
    Transient { attempts: u32, last: String },

    /// The endpoint rejected the request outright (4xx other than 429).
    #[error("query rejected with HTTP {status}")]
    Rejected { status: u16 },

    /// The response body was not a SPARQL JSON result set.
    #[error("malformed query response: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

/// Network-level failure below the HTTP status layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
}

// ============================================================================
// Transport seam
// ============================================================================

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Sends one query and reports the raw outcome. Implementations hold no
/// retry logic; that belongs to [`GraphQueryClient`].
pub trait SparqlTransport {
    fn execute(&self, query: &str) -> Result<TransportResponse, TransportError>;
}

/// Production transport: form-encoded POST over reqwest's blocking client.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(config: &FetchConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/sparql-results+json"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("artatlas")),
        );

        let client = reqwest::blocking::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Connect(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

impl SparqlTransport for HttpTransport {
    fn execute(&self, query: &str) -> Result<TransportResponse, TransportError> {
        let resp = self
            .client
            .post(self.endpoint.clone())
            .form(&[("query", query)])
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Connect(e.to_string())
                }
            })?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .map_err(|e| TransportError::Connect(format!("failed to read body: {e}")))?;
        Ok(TransportResponse { status, body })
    }
}

// ============================================================================
// Retry policy + client
// ============================================================================

/// Retry behavior as data, so the whole machine is injectable.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per query, counting the first.
    pub max_attempts: u32,
    /// Fixed cooldown after an HTTP 429 before repeating the request.
    pub rate_limit_cooldown: Duration,
    /// Linear backoff step for timeouts and 5xx (`step × attempt`).
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            rate_limit_cooldown: Duration::from_secs(30),
            backoff_step: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Same attempt budget, zero sleeps. For tests.
    pub fn no_wait() -> Self {
        Self {
            rate_limit_cooldown: Duration::ZERO,
            backoff_step: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Executes parametrized queries with retry/backoff and classifies failures
/// as transient (worth retrying by a future run) or fatal.
pub struct GraphQueryClient<T: SparqlTransport> {
    transport: T,
    policy: RetryPolicy,
}

impl GraphQueryClient<HttpTransport> {
    pub fn over_http(config: &FetchConfig, policy: RetryPolicy) -> Result<Self, TransportError> {
        Ok(Self::new(HttpTransport::new(config)?, policy))
    }
}

impl<T: SparqlTransport> GraphQueryClient<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Run one query to completion, sleeping through rate limits.
    pub fn execute(&self, query: &str) -> Result<Vec<Binding>, FetchError> {
        let mut attempt: u32 = 0;
        let mut last = String::new();

        while attempt < self.policy.max_attempts {
            attempt += 1;
            match self.transport.execute(query) {
                Ok(resp) if resp.status == 429 => {
                    last = "HTTP 429".to_string();
                    tracing::warn!(
                        attempt,
                        cooldown_secs = self.policy.rate_limit_cooldown.as_secs(),
                        "rate limited; cooling down before repeating the request"
                    );
                    sleep(self.policy.rate_limit_cooldown);
                }
                Ok(resp) if (500..=599).contains(&resp.status) => {
                    last = format!("HTTP {}", resp.status);
                    let wait = self.policy.backoff_step * attempt;
                    tracing::warn!(attempt, status = resp.status, wait_secs = wait.as_secs(), "server error; backing off");
                    sleep(wait);
                }
                Ok(resp) if (200..=299).contains(&resp.status) => {
                    return parse_bindings(&resp.body);
                }
                Ok(resp) => return Err(FetchError::Rejected { status: resp.status }),
                Err(TransportError::Timeout) => {
                    last = "timeout".to_string();
                    let wait = self.policy.backoff_step * attempt;
                    tracing::warn!(attempt, wait_secs = wait.as_secs(), "request timed out; backing off");
                    sleep(wait);
                }
                Err(TransportError::Connect(reason)) => {
                    last = reason;
                    let wait = self.policy.backoff_step * attempt;
                    tracing::warn!(attempt, wait_secs = wait.as_secs(), "request failed; backing off");
                    sleep(wait);
                }
            }
        }

        Err(FetchError::Transient {
            attempts: self.policy.max_attempts,
            last,
        })
    }
}

fn sleep(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

/// Flatten the SPARQL JSON result format down to one value map per row.
fn parse_bindings(body: &str) -> Result<Vec<Binding>, FetchError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(format!("invalid JSON: {e}")))?;

    let rows = value
        .pointer("/results/bindings")
        .and_then(|v| v.as_array())
        .ok_or_else(|| FetchError::Malformed("missing results.bindings".to_string()))?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let cells = row
            .as_object()
            .ok_or_else(|| FetchError::Malformed("binding row is not an object".to_string()))?;
        let mut binding = Binding::new();
        for (var, cell) in cells {
            if let Some(v) = cell.get("value").and_then(|v| v.as_str()) {
                binding.insert(var.clone(), v.to_string());
            }
        }
        out.push(binding);
    }
    Ok(out)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{bindings_body, response, ScriptedTransport};

    fn client(
        responses: Vec<Result<TransportResponse, TransportError>>,
        policy: RetryPolicy,
    ) -> GraphQueryClient<ScriptedTransport> {
        GraphQueryClient::new(ScriptedTransport::new(responses), policy)
    }

    #[test]
    fn success_returns_flattened_bindings() {
        let body = bindings_body(&[serde_json::json!({
            "painter": {"type": "uri", "value": "http://www.wikidata.org/entity/Q296"},
            "painterLabel": {"type": "literal", "value": "Claude Monet"},
        })]);
        let client = client(vec![Ok(response(200, &body))], RetryPolicy::no_wait());

        let rows = client.execute("SELECT ...").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["painterLabel"], "Claude Monet");
        assert_eq!(rows[0]["painter"], "http://www.wikidata.org/entity/Q296");
    }

    #[test]
    fn rate_limit_cooldown_then_retry_succeeds() {
        let body = bindings_body(&[]);
        let client = client(
            vec![Ok(response(429, "")), Ok(response(200, &body))],
            RetryPolicy::no_wait(),
        );

        let rows = client.execute("SELECT ...").unwrap();
        assert!(rows.is_empty());
        assert_eq!(client.transport.calls(), 2);
    }

    #[test]
    fn persistent_rate_limit_exhausts_budget_as_transient() {
        let mut policy = RetryPolicy::no_wait();
        policy.max_attempts = 3;
        let client = client(
            vec![
                Ok(response(429, "")),
                Ok(response(429, "")),
                Ok(response(429, "")),
            ],
            policy,
        );

        let err = client.execute("SELECT ...").unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(err, FetchError::Transient { attempts: 3, .. }));
        assert_eq!(client.transport.calls(), 3);
    }

    #[test]
    fn server_errors_retry_then_give_up_as_transient() {
        let mut policy = RetryPolicy::no_wait();
        policy.max_attempts = 2;
        let client = client(
            vec![Ok(response(503, "")), Ok(response(500, ""))],
            policy,
        );

        let err = client.execute("SELECT ...").unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn timeout_is_transient() {
        let mut policy = RetryPolicy::no_wait();
        policy.max_attempts = 1;
        let client = client(vec![Err(TransportError::Timeout)], policy);

        let err = client.execute("SELECT ...").unwrap_err();
        assert!(matches!(err, FetchError::Transient { attempts: 1, .. }));
    }

    #[test]
    fn client_error_other_than_429_is_fatal_without_retry() {
        let client = client(vec![Ok(response(400, "bad query"))], RetryPolicy::no_wait());

        let err = client.execute("SELECT ...").unwrap_err();
        assert!(matches!(err, FetchError::Rejected { status: 400 }));
        assert_eq!(client.transport.calls(), 1);
    }

    #[test]
    fn malformed_body_is_fatal_without_retry() {
        let client = client(
            vec![Ok(response(200, "<html>not json</html>"))],
            RetryPolicy::no_wait(),
        );

        let err = client.execute("SELECT ...").unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
        assert_eq!(client.transport.calls(), 1);
    }

    #[test]
    fn missing_bindings_key_is_malformed() {
        let client = client(
            vec![Ok(response(200, r#"{"head": {"vars": []}}"#))],
            RetryPolicy::no_wait(),
        );

        assert!(matches!(
            client.execute("SELECT ...").unwrap_err(),
            FetchError::Malformed(_)
        ));
    }
}
