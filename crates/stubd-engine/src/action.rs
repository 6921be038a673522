//! Pending test-author intents: respond to, or merely observe, the next
//! matching transaction.

use std::fmt;

use regex::Regex;
use tokio::sync::oneshot;

use crate::response::{Method, ResponseSpec};
use crate::transaction::RequestSnapshot;

// ---------------------------------------------------------------------------
// AbortReason
// ---------------------------------------------------------------------------

/// Why a pending observe completion was force-resolved instead of fulfilled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbortReason {
    Reset,
    Stopped,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Reset => f.write_str("server was reset"),
            AbortReason::Stopped => f.write_str("server was stopped"),
        }
    }
}

/// Receiver half the caller of an observe registration awaits. Completes with
/// the matched request snapshot, or with the reason the queue was flushed.
pub type ObserveReceiver = oneshot::Receiver<Result<RequestSnapshot, AbortReason>>;

/// Sender half held by a queued observe action until it matches.
pub type ObserveSender = oneshot::Sender<Result<RequestSnapshot, AbortReason>>;

// ---------------------------------------------------------------------------
// PatternError
// ---------------------------------------------------------------------------

/// A spec's pattern is not a valid regular expression. Surfaced from
/// registration, before the action enters the queue; the matcher itself
/// never sees an uncompiled pattern.
#[derive(Clone, Debug)]
pub struct PatternError {
    pub pattern: String,
    pub detail: String,
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid match pattern {:?}: {}", self.pattern, self.detail)
    }
}

impl std::error::Error for PatternError {}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// Payload of a matched action.
pub enum ActionKind {
    /// Answer the matched transaction with this spec and close it.
    Respond(ResponseSpec),
    /// Hand the matched request snapshot to the test author; the transaction
    /// stays open for further matching.
    Observe(ObserveSender),
}

/// One queued intent: a compiled match pattern plus its payload.
///
/// Created on registration, removed from the queue the instant it matches.
pub struct Action {
    pattern: Regex,
    method: Method,
    kind: ActionKind,
}

impl Action {
    /// Build a respond action, compiling the spec's pattern.
    pub fn respond(spec: ResponseSpec) -> Result<Self, PatternError> {
        let pattern = compile(&spec.pattern)?;
        Ok(Self {
            pattern,
            method: spec.method,
            kind: ActionKind::Respond(spec),
        })
    }

    /// Build an observe action for the spec's pattern and method, returning
    /// the receiver the registering caller awaits.
    pub fn observe(spec: &ResponseSpec) -> Result<(Self, ObserveReceiver), PatternError> {
        let pattern = compile(&spec.pattern)?;
        let (sender, receiver) = oneshot::channel();
        let action = Self {
            pattern,
            method: spec.method,
            kind: ActionKind::Observe(sender),
        };
        Ok((action, receiver))
    }

    pub(crate) fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub(crate) fn method(&self) -> Method {
        self.method
    }

    /// The spec this action would answer with, if it is a respond action.
    pub(crate) fn respond_spec(&self) -> Option<&ResponseSpec> {
        match &self.kind {
            ActionKind::Respond(spec) => Some(spec),
            ActionKind::Observe(_) => None,
        }
    }

    pub(crate) fn into_kind(self) -> ActionKind {
        self.kind
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            ActionKind::Respond(_) => "Respond",
            ActionKind::Observe(_) => "Observe",
        };
        f.debug_struct("Action")
            .field("pattern", &self.pattern.as_str())
            .field("method", &self.method)
            .field("kind", &kind)
            .finish()
    }
}

fn compile(pattern: &str) -> Result<Regex, PatternError> {
    Regex::new(pattern).map_err(|err| PatternError {
        pattern: pattern.to_string(),
        detail: err.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
