//! Wikidata acquisition layer for Artatlas.
//!
//! Everything needed to turn the public knowledge graph into a local
//! [`artatlas_snapshot::Snapshot`]:
//!
//! - [`client`] — SPARQL-over-HTTP with an explicit retry/backoff state
//!   machine (429 cooldowns, 5xx/timeout backoff, fatal 4xx),
//! - [`normalize`] — raw result bindings → canonical artwork rows,
//! - [`queries`] — the query text for both fetch phases,
//! - [`pipeline`] — the sequential two-phase refresh that tolerates
//!   per-painter failures and supports cooperative cancellation.
//!
//! The endpoint's rate policy is the real backpressure signal here, so the
//! whole stack is deliberately synchronous: one request at a time, paced by
//! a configured delay, blocking through cooldowns.

pub mod client;
pub mod normalize;
pub mod pipeline;
pub mod queries;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{
    Binding, FetchError, GraphQueryClient, HttpTransport, RetryPolicy, SparqlTransport,
    TransportError, TransportResponse,
};
pub use pipeline::{CancelFlag, FetchPipeline, PainterFailure, PainterRef, RefreshReport};

use std::time::Duration;

use url::Url;

/// The public query service for the Wikidata knowledge graph.
pub const WIKIDATA_SPARQL_ENDPOINT: &str = "https://query.wikidata.org/sparql";

/// Identifying client header, per the endpoint's user-agent policy.
pub const DEFAULT_USER_AGENT: &str = "artatlas/0.1 (+https://github.com/artatlas/artatlas)";

/// Knobs for a refresh run. Pacing lives here (not inside the HTTP client)
/// so tests can inject zero delays and never sleep for real.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// SPARQL endpoint to query.
    pub endpoint: Url,
    /// Value for the identifying `User-Agent` header.
    pub user_agent: String,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Pause between consecutive per-painter requests (not before the first).
    pub request_delay: Duration,
    /// How many ranked painters phase 1 asks for.
    pub painter_limit: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse(WIKIDATA_SPARQL_ENDPOINT).expect("endpoint constant parses"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(90),
            request_delay: Duration::from_secs(2),
            painter_limit: 250,
        }
    }
}
