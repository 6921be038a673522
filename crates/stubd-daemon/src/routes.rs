//! Axum glue: the inbound transaction handler and the channel-backed sinks.
//!
//! `build_router` is the single entry point; `server.rs` calls it and
//! attaches middleware layers. Handlers are `pub(crate)` so the unit tests
//! below can compose the bare router directly.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    body::Bytes,
    extract::{OriginalUri, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde_json::Value;
use stubd_engine::{
    ErrorSink, RequestSnapshot, ResponseSink, SerializationFailure, Transaction, DEFAULT_STATUS,
};
use tokio::sync::oneshot;
use tracing::warn;

use crate::api_types::{FaultResponse, UnmatchedResponse};
use crate::server::Shared;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the stub router wired to the given shared state.
///
/// Each configured prefix is routed at `{prefix}` and `{prefix}/*rest`;
/// anything else falls through to a plain not-found. Middleware layers are
/// **not** applied here; `server.rs` attaches them after this call so tests
/// can use the bare router.
pub(crate) fn build_router(shared: Arc<Shared>, paths: &[String]) -> Router {
    let prefixes: BTreeSet<String> = paths.iter().map(|p| normalize_prefix(p)).collect();

    let mut router = Router::new();
    for prefix in &prefixes {
        if prefix.is_empty() {
            router = router
                .route("/", any(handle_transaction))
                .route("/*rest", any(handle_transaction));
        } else {
            router = router
                .route(prefix, any(handle_transaction))
                .route(&format!("{prefix}/*rest"), any(handle_transaction));
        }
    }
    router.fallback(unconfigured_path).with_state(shared)
}

/// Leading slash, no trailing slash. An empty or "/" prefix stubs the whole
/// listener.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

// ---------------------------------------------------------------------------
// Inbound transaction handler
// ---------------------------------------------------------------------------

/// One inbound call: snapshot it, append it to the engine, and park on the
/// completion channel until a respond action (or a flush) answers.
pub(crate) async fn handle_transaction(
    State(shared): State<Arc<Shared>>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !shared.is_running() {
        // Stale listener reference after stop: answer not-found, never
        // process.
        return not_found(format!("no stub server is running for {} {}", method, uri.path()));
    }

    let url = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let snapshot = RequestSnapshot {
        method: method.as_str().to_string(),
        url,
        headers: header_map(&headers),
        body: parse_body(&body),
    };

    let (outcome_tx, outcome_rx) = oneshot::channel();
    let (response_sink, error_sink) = channel_sinks(outcome_tx);
    {
        // Never held across an await.
        let mut engine = shared.engine();
        engine.accept(Transaction::new(
            snapshot,
            Box::new(response_sink),
            Box::new(error_sink),
        ));
    }

    match outcome_rx.await {
        Ok(SinkOutcome::Response {
            status,
            headers,
            body,
        }) => stub_response(status, headers, body),
        Ok(SinkOutcome::Fault(failure)) => fault_response(failure),
        // Sinks dropped without a write; nothing sane to answer with.
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

pub(crate) async fn unconfigured_path(method: Method, OriginalUri(uri): OriginalUri) -> Response {
    not_found(format!(
        "path not configured for stubbing: {} {}",
        method,
        uri.path()
    ))
}

// ---------------------------------------------------------------------------
// Channel-backed sinks
// ---------------------------------------------------------------------------

/// What the parked handler receives once its transaction is answered.
pub(crate) enum SinkOutcome {
    Response {
        status: u16,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    },
    Fault(SerializationFailure),
}

struct SinkState {
    sender: Option<oneshot::Sender<SinkOutcome>>,
    status: u16,
    headers: Vec<(String, String)>,
}

/// Response half handed to the engine. Buffers status and headers; the first
/// `write_json` completes the call, later writes are no-ops.
pub(crate) struct ChannelResponseSink(Arc<Mutex<SinkState>>);

/// Error half handed to the engine; a fault also completes the call.
pub(crate) struct ChannelErrorSink(Arc<Mutex<SinkState>>);

fn channel_sinks(sender: oneshot::Sender<SinkOutcome>) -> (ChannelResponseSink, ChannelErrorSink) {
    let state = Arc::new(Mutex::new(SinkState {
        sender: Some(sender),
        status: DEFAULT_STATUS,
        headers: Vec::new(),
    }));
    (
        ChannelResponseSink(Arc::clone(&state)),
        ChannelErrorSink(state),
    )
}

fn lock(state: &Arc<Mutex<SinkState>>) -> std::sync::MutexGuard<'_, SinkState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ResponseSink for ChannelResponseSink {
    fn set_status(&mut self, status: u16, _reason: Option<&str>) {
        // hyper does not transmit custom reason phrases; the status text
        // stops at this boundary.
        lock(&self.0).status = status;
    }

    fn insert_header(&mut self, name: &str, value: &str) {
        lock(&self.0)
            .headers
            .push((name.to_string(), value.to_string()));
    }

    fn write_json(&mut self, body: &Value) -> Result<(), SerializationFailure> {
        let bytes = serde_json::to_vec(body).map_err(SerializationFailure::new)?;
        let mut state = lock(&self.0);
        if let Some(sender) = state.sender.take() {
            let headers = std::mem::take(&mut state.headers);
            let _ = sender.send(SinkOutcome::Response {
                status: state.status,
                headers,
                body: bytes,
            });
        }
        Ok(())
    }
}

impl ErrorSink for ChannelErrorSink {
    fn fail(&mut self, error: SerializationFailure) {
        if let Some(sender) = lock(&self.0).sender.take() {
            let _ = sender.send(SinkOutcome::Fault(error));
        }
    }
}

// ---------------------------------------------------------------------------
// Response builders and snapshot helpers
// ---------------------------------------------------------------------------

fn stub_response(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = Response::new(axum::body::Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    for (name, value) in headers {
        match (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => warn!(header = %name, "dropping response header that is not valid HTTP"),
        }
    }
    response
}

fn not_found(error: String) -> Response {
    (StatusCode::NOT_FOUND, Json(UnmatchedResponse { error })).into_response()
}

fn fault_response(failure: SerializationFailure) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(FaultResponse {
            error: failure.to_string(),
        }),
    )
        .into_response()
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        match map.entry(name.as_str().to_string()) {
            Entry::Occupied(mut existing) => {
                let joined = existing.get_mut();
                joined.push_str(", ");
                joined.push_str(&value);
            }
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
        }
    }
    map
}

/// Parsed JSON body, a string for non-JSON payloads, `null` when empty.
fn parse_body(bytes: &Bytes) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

// ---------------------------------------------------------------------------
// Tests: in-process router, no sockets
// ---------------------------------------------------------------------------
