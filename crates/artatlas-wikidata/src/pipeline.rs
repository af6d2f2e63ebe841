//! Two-phase refresh orchestration.
//!
//! Phase 1 fetches the ranked painter list (fatal on failure: there is no
//! meaningful partial result without it). Phase 2 walks the painters in
//! order, strictly sequentially, pacing each request and tolerating
//! per-painter failures: a painter that still fails after the client's
//! internal retries is logged, recorded, and skipped. The run then returns
//! a [`RefreshReport`] whose `failures`/`cancelled` fields mark the
//! partial-result path; only phase 1 produces an `Err`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use artatlas_snapshot::{ArtworkRecord, Snapshot};

use crate::client::{FetchError, GraphQueryClient, SparqlTransport};
use crate::{normalize, queries, FetchConfig};

/// A painter selected in phase 1, in source rank order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PainterRef {
    pub iri: String,
    pub label: String,
}

/// One painter whose detail fetch failed during phase 2.
#[derive(Debug)]
pub struct PainterFailure {
    /// Zero-based position in the phase-1 list.
    pub index: usize,
    pub painter: String,
    pub error: FetchError,
}

/// Outcome of a refresh run. Non-empty `failures` (or `cancelled`) means the
/// snapshot is partial: success with caveats, not a failure.
#[derive(Debug)]
pub struct RefreshReport {
    pub snapshot: Snapshot,
    pub painters_total: usize,
    pub failures: Vec<PainterFailure>,
    /// Rows rejected at normalization (placeholder or missing labels).
    pub rows_skipped: usize,
    pub cancelled: bool,
}

impl RefreshReport {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty() || self.cancelled
    }
}

/// Cooperative cancellation checked between painters, never mid-request.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }

    /// Shared handle, e.g. for a SIGINT hook to flip.
    pub fn handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.inner)
    }
}

pub struct FetchPipeline<T: SparqlTransport> {
    client: GraphQueryClient<T>,
    config: FetchConfig,
}

impl<T: SparqlTransport> FetchPipeline<T> {
    pub fn new(client: GraphQueryClient<T>, config: FetchConfig) -> Self {
        Self { client, config }
    }

    /// Run the full refresh. `progress` is called as `(index, total, painter)`
    /// (1-based) before each per-painter request so callers can render
    /// progress; `cancel` stops the loop at the next painter boundary while
    /// keeping everything fetched so far.
    pub fn refresh(
        &self,
        progress: &mut dyn FnMut(usize, usize, &str),
        cancel: &CancelFlag,
    ) -> Result<RefreshReport, FetchError> {
        let painters = self.top_painters()?;
        let total = painters.len();
        tracing::info!(painters = total, "phase 1 complete");

        let mut records: Vec<ArtworkRecord> = Vec::new();
        let mut failures = Vec::new();
        let mut rows_skipped = 0usize;
        let mut cancelled = false;

        for (index, painter) in painters.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(done = index, total, "refresh cancelled; keeping partial data");
                cancelled = true;
                break;
            }

            progress(index + 1, total, &painter.label);

            // Pace every request after the first; the endpoint's rate policy
            // is the real backpressure signal.
            if index > 0 && !self.config.request_delay.is_zero() {
                thread::sleep(self.config.request_delay);
            }

            match self.client.execute(&queries::painter_artworks(&painter.iri)) {
                Ok(rows) => {
                    for row in &rows {
                        match normalize::normalize(row) {
                            Some(record) => records.push(record),
                            None => rows_skipped += 1,
                        }
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        painter = %painter.label,
                        %error,
                        "painter fetch failed; continuing with the rest"
                    );
                    failures.push(PainterFailure {
                        index,
                        painter: painter.label.clone(),
                        error,
                    });
                }
            }
        }

        let raw = records.len();
        dedup_records(&mut records);
        tracing::debug!(
            rows = records.len(),
            duplicates = raw - records.len(),
            rows_skipped,
            failed_painters = failures.len(),
            "phase 2 complete"
        );

        Ok(RefreshReport {
            snapshot: Snapshot::new(records, Some(chrono::Utc::now().timestamp())),
            painters_total: total,
            failures,
            rows_skipped,
            cancelled,
        })
    }

    /// Phase 1: the ranked painter list, source order preserved.
    fn top_painters(&self) -> Result<Vec<PainterRef>, FetchError> {
        let rows = self
            .client
            .execute(&queries::top_painters(self.config.painter_limit))?;

        let mut painters = Vec::with_capacity(rows.len());
        for row in &rows {
            let Some(iri) = row.get("painter") else {
                continue;
            };
            let label = row.get("painterLabel").map(String::as_str).unwrap_or("");
            // A painter with no translated label would only yield placeholder
            // rows downstream; skip up front.
            if label.is_empty() || normalize::is_entity_placeholder(label) {
                tracing::debug!(iri = %iri, "skipping unlabeled painter");
                continue;
            }
            painters.push(PainterRef {
                iri: iri.clone(),
                label: label.to_string(),
            });
        }
        Ok(painters)
    }
}

/// Keep the first occurrence of each (painter, painting, museum) fact.
fn dedup_records(records: &mut Vec<ArtworkRecord>) {
    let mut seen = HashSet::new();
    records.retain(|r| seen.insert((r.painter.clone(), r.painting.clone(), r.museum.clone())));
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{RetryPolicy, TransportResponse, TransportError};
    use crate::testing::{artwork_row, bindings_body, painter_row, response, ScriptedTransport};
    use std::time::Duration;

    fn test_config() -> FetchConfig {
        FetchConfig {
            request_delay: Duration::ZERO,
            painter_limit: 5,
            ..FetchConfig::default()
        }
    }

    fn pipeline(
        responses: Vec<Result<TransportResponse, TransportError>>,
        policy: RetryPolicy,
    ) -> FetchPipeline<ScriptedTransport> {
        FetchPipeline::new(
            GraphQueryClient::new(ScriptedTransport::new(responses), policy),
            test_config(),
        )
    }

    fn phase1_body(labels: &[(&str, &str)]) -> String {
        let rows: Vec<_> = labels.iter().map(|(q, l)| painter_row(q, l)).collect();
        bindings_body(&rows)
    }

    fn detail_body(painter: &str, paintings: &[&str]) -> String {
        let rows: Vec<_> = paintings
            .iter()
            .map(|p| artwork_row(painter, p, "Musée d'Orsay", Some("Point(2.3266 48.86)")))
            .collect();
        bindings_body(&rows)
    }

    #[test]
    fn phase1_failure_is_fatal() {
        let p = pipeline(vec![Ok(response(400, "no"))], RetryPolicy::no_wait());
        let err = p
            .refresh(&mut |_, _, _| {}, &CancelFlag::new())
            .unwrap_err();
        assert!(matches!(err, FetchError::Rejected { status: 400 }));
    }

    #[test]
    fn one_failing_painter_degrades_to_partial_not_fatal() {
        let mut policy = RetryPolicy::no_wait();
        policy.max_attempts = 1;
        let p = pipeline(
            vec![
                Ok(response(
                    200,
                    &phase1_body(&[
                        ("Q1", "Painter One"),
                        ("Q2", "Painter Two"),
                        ("Q3", "Painter Three"),
                        ("Q4", "Painter Four"),
                        ("Q5", "Painter Five"),
                    ]),
                )),
                Ok(response(200, &detail_body("Painter One", &["A"]))),
                Ok(response(200, &detail_body("Painter Two", &["B"]))),
                Ok(response(503, "")),
                Ok(response(200, &detail_body("Painter Four", &["D"]))),
                Ok(response(200, &detail_body("Painter Five", &["E"]))),
            ],
            policy,
        );

        let report = p.refresh(&mut |_, _, _| {}, &CancelFlag::new()).unwrap();
        assert!(report.is_partial());
        assert_eq!(report.painters_total, 5);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 2);
        assert_eq!(report.failures[0].painter, "Painter Three");
        assert!(report.failures[0].error.is_transient());

        let painters: Vec<_> = report
            .snapshot
            .records()
            .iter()
            .map(|r| r.painter.as_str())
            .collect();
        assert_eq!(
            painters,
            vec!["Painter One", "Painter Two", "Painter Four", "Painter Five"]
        );
    }

    #[test]
    fn progress_reports_every_painter_in_order() {
        let p = pipeline(
            vec![
                Ok(response(200, &phase1_body(&[("Q1", "A"), ("Q2", "B")]))),
                Ok(response(200, &detail_body("A", &["one"]))),
                Ok(response(200, &detail_body("B", &["two"]))),
            ],
            RetryPolicy::no_wait(),
        );

        let mut seen = Vec::new();
        let report = p
            .refresh(
                &mut |index, total, painter| seen.push((index, total, painter.to_string())),
                &CancelFlag::new(),
            )
            .unwrap();

        assert!(!report.is_partial());
        assert_eq!(seen, vec![(1, 2, "A".to_string()), (2, 2, "B".to_string())]);
    }

    #[test]
    fn zero_paintings_is_not_an_error() {
        let p = pipeline(
            vec![
                Ok(response(200, &phase1_body(&[("Q1", "A")]))),
                Ok(response(200, &bindings_body(&[]))),
            ],
            RetryPolicy::no_wait(),
        );

        let report = p.refresh(&mut |_, _, _| {}, &CancelFlag::new()).unwrap();
        assert!(!report.is_partial());
        assert!(report.snapshot.is_empty());
    }

    #[test]
    fn unlabeled_painters_are_dropped_in_phase1() {
        let p = pipeline(
            vec![
                Ok(response(
                    200,
                    &phase1_body(&[("Q1", "A"), ("Q77", "Q77"), ("Q2", "B")]),
                )),
                Ok(response(200, &detail_body("A", &["one"]))),
                Ok(response(200, &detail_body("B", &["two"]))),
            ],
            RetryPolicy::no_wait(),
        );

        let report = p.refresh(&mut |_, _, _| {}, &CancelFlag::new()).unwrap();
        assert_eq!(report.painters_total, 2);
        assert_eq!(report.snapshot.len(), 2);
    }

    #[test]
    fn placeholder_rows_are_counted_as_skipped() {
        let body = bindings_body(&[
            artwork_row("A", "one", "Louvre", None),
            artwork_row("A", "Q4321", "Louvre", None),
        ]);
        let p = pipeline(
            vec![
                Ok(response(200, &phase1_body(&[("Q1", "A")]))),
                Ok(response(200, &body)),
            ],
            RetryPolicy::no_wait(),
        );

        let report = p.refresh(&mut |_, _, _| {}, &CancelFlag::new()).unwrap();
        assert_eq!(report.snapshot.len(), 1);
        assert_eq!(report.rows_skipped, 1);
    }

    #[test]
    fn duplicate_facts_are_deduplicated() {
        let body = bindings_body(&[
            artwork_row("A", "one", "Louvre", None),
            artwork_row("A", "one", "Louvre", Some("Point(2.33 48.86)")),
        ]);
        let p = pipeline(
            vec![
                Ok(response(200, &phase1_body(&[("Q1", "A")]))),
                Ok(response(200, &body)),
            ],
            RetryPolicy::no_wait(),
        );

        let report = p.refresh(&mut |_, _, _| {}, &CancelFlag::new()).unwrap();
        assert_eq!(report.snapshot.len(), 1);
        // First occurrence wins.
        assert_eq!(report.snapshot.records()[0].coordinates(), None);
    }

    #[test]
    fn cancellation_between_painters_keeps_partial_data() {
        let p = pipeline(
            vec![
                Ok(response(
                    200,
                    &phase1_body(&[("Q1", "A"), ("Q2", "B"), ("Q3", "C")]),
                )),
                Ok(response(200, &detail_body("A", &["one"]))),
                Ok(response(200, &detail_body("B", &["two"]))),
            ],
            RetryPolicy::no_wait(),
        );

        let cancel = CancelFlag::new();
        let trip = cancel.clone();
        let report = p
            .refresh(
                &mut |index, _, _| {
                    if index == 2 {
                        trip.cancel();
                    }
                },
                &cancel,
            )
            .unwrap();

        assert!(report.cancelled);
        assert!(report.is_partial());
        assert_eq!(report.snapshot.len(), 2);
        assert!(report.failures.is_empty());
    }
}
