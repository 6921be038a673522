//! Open HTTP transactions and the sink contract the listener glue fulfills.
//!
//! A transaction pairs the snapshot of one inbound call with the two write
//! channels the listener handed over: a response sink (status + headers +
//! JSON body) and an error sink (framework-level fault handling). The engine
//! owns the transaction while it is open; the sinks are the only way anything
//! flows back to the caller.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RequestSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time copy of an inbound request, handed to observers and exposed
/// by the pending-requests view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    /// HTTP method exactly as the listener reported it.
    pub method: String,
    /// Full request URL as received: path plus query string.
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON body, a string for non-JSON payloads, `null` when empty.
    pub body: Value,
}

// ---------------------------------------------------------------------------
// SerializationFailure
// ---------------------------------------------------------------------------

/// A response body that could not be written. Routed to the failing
/// transaction's error sink, never to whichever registration triggered the
/// delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerializationFailure {
    pub detail: String,
}

impl SerializationFailure {
    pub fn new(detail: impl fmt::Display) -> Self {
        Self {
            detail: detail.to_string(),
        }
    }
}

impl fmt::Display for SerializationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to serialize stub response body: {}", self.detail)
    }
}

impl std::error::Error for SerializationFailure {}

// ---------------------------------------------------------------------------
// Sink traits: the narrow collaborator contract
// ---------------------------------------------------------------------------

/// Write half of one inbound call. Implementations must tolerate at most one
/// `write_json` actually going out; later writes are no-ops (idempotent
/// close).
pub trait ResponseSink: Send + 'static {
    /// Set the response status. `reason` carries the spec's status text;
    /// implementations that cannot transmit a reason phrase drop it.
    fn set_status(&mut self, status: u16, reason: Option<&str>);

    fn insert_header(&mut self, name: &str, value: &str);

    /// Serialize and write the response body, completing the call.
    fn write_json(&mut self, body: &Value) -> Result<(), SerializationFailure>;
}

/// Fault half of one inbound call: hands control to framework-level fault
/// handling for the original caller.
pub trait ErrorSink: Send + 'static {
    fn fail(&mut self, error: SerializationFailure);
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// One inbound HTTP call awaiting resolution.
///
/// Open while it sits in the engine's registry; closed when a respond action
/// consumes it or a flush answers it not-found. An observe match reads the
/// snapshot without closing it.
pub struct Transaction {
    id: Uuid,
    snapshot: RequestSnapshot,
    pub(crate) response: Box<dyn ResponseSink>,
    pub(crate) errors: Box<dyn ErrorSink>,
}

impl Transaction {
    pub fn new(
        snapshot: RequestSnapshot,
        response: Box<dyn ResponseSink>,
        errors: Box<dyn ErrorSink>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            snapshot,
            response,
            errors,
        }
    }

    /// Log-correlation id, assigned on arrival.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn snapshot(&self) -> &RequestSnapshot {
        &self.snapshot
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("snapshot", &self.snapshot)
            .finish_non_exhaustive()
    }
}
