//! Scripted transports and response builders shared by the unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::client::{SparqlTransport, TransportError, TransportResponse};

/// Replays a fixed sequence of transport outcomes and records every query.
pub(crate) struct ScriptedTransport {
    responses: RefCell<VecDeque<Result<TransportResponse, TransportError>>>,
    queries: RefCell<Vec<String>>,
}

impl ScriptedTransport {
    pub(crate) fn new(responses: Vec<Result<TransportResponse, TransportError>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            queries: RefCell::new(Vec::new()),
        }
    }

    /// Number of requests issued so far.
    pub(crate) fn calls(&self) -> usize {
        self.queries.borrow().len()
    }
}

impl SparqlTransport for ScriptedTransport {
    fn execute(&self, query: &str) -> Result<TransportResponse, TransportError> {
        self.queries.borrow_mut().push(query.to_string());
        self.responses
            .borrow_mut()
            .pop_front()
            .expect("transport script ran out of responses")
    }
}

pub(crate) fn response(status: u16, body: &str) -> TransportResponse {
    TransportResponse {
        status,
        body: body.to_string(),
    }
}

/// A SPARQL JSON result set wrapping the given binding rows.
pub(crate) fn bindings_body(rows: &[serde_json::Value]) -> String {
    serde_json::json!({"results": {"bindings": rows}}).to_string()
}

pub(crate) fn painter_row(qid: &str, label: &str) -> serde_json::Value {
    serde_json::json!({
        "painter": {"type": "uri", "value": format!("http://www.wikidata.org/entity/{qid}")},
        "painterLabel": {"type": "literal", "value": label},
        "sitelinks": {"type": "literal", "value": "100"},
    })
}

pub(crate) fn artwork_row(
    painter: &str,
    painting: &str,
    museum: &str,
    coords: Option<&str>,
) -> serde_json::Value {
    let mut row = serde_json::json!({
        "painterLabel": {"type": "literal", "value": painter},
        "paintingLabel": {"type": "literal", "value": painting},
        "museumLabel": {"type": "literal", "value": museum},
        "countryLabel": {"type": "literal", "value": "France"},
    });
    if let Some(point) = coords {
        row["coords"] = serde_json::json!({"type": "literal", "value": point});
    }
    row
}
