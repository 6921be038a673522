//! Sink doubles for engine scenario tests.
//!
//! Gated behind the `testkit` feature (plus `cfg(test)` for this crate's own
//! unit tests) so production builds never carry them.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use crate::transaction::{
    ErrorSink, RequestSnapshot, ResponseSink, SerializationFailure, Transaction,
};

/// Everything a transaction's sinks saw, for assertions.
#[derive(Clone, Debug, Default)]
pub struct Recorded {
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub writes: usize,
    pub faults: Vec<SerializationFailure>,
}

/// Recording double for both sink halves. Clones share state, so a test can
/// keep one handle while the engine owns the boxed other.
#[derive(Clone, Default)]
pub struct RecordingSink {
    state: Arc<Mutex<Recorded>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Recorded {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn has_written(&self) -> bool {
        self.recorded().writes > 0
    }
}

impl ResponseSink for RecordingSink {
    fn set_status(&mut self, status: u16, reason: Option<&str>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.status = Some(status);
        state.status_text = reason.map(str::to_string);
    }

    fn insert_header(&mut self, name: &str, value: &str) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.headers.push((name.to_string(), value.to_string()));
    }

    fn write_json(&mut self, body: &Value) -> Result<(), SerializationFailure> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.writes += 1;
        state.body = Some(body.clone());
        Ok(())
    }
}

impl ErrorSink for RecordingSink {
    fn fail(&mut self, error: SerializationFailure) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.faults.push(error);
    }
}

/// Response sink whose body write always fails, for serialization-fault
/// scenarios. Status and header calls are accepted and dropped.
pub struct FailingSink;

impl ResponseSink for FailingSink {
    fn set_status(&mut self, _status: u16, _reason: Option<&str>) {}

    fn insert_header(&mut self, _name: &str, _value: &str) {}

    fn write_json(&mut self, _body: &Value) -> Result<(), SerializationFailure> {
        Err(SerializationFailure::new("forced write failure"))
    }
}

/// Bare snapshot with no headers and a null body.
pub fn snapshot_for(method: &str, url: &str) -> RequestSnapshot {
    RequestSnapshot {
        method: method.to_string(),
        url: url.to_string(),
        headers: BTreeMap::new(),
        body: Value::Null,
    }
}

/// Transaction backed by a recording sink pair, plus the test's handle to it.
pub fn transaction_for(method: &str, url: &str) -> (Transaction, RecordingSink) {
    let sink = RecordingSink::new();
    let transaction = Transaction::new(
        snapshot_for(method, url),
        Box::new(sink.clone()),
        Box::new(sink.clone()),
    );
    (transaction, sink)
}
