//! stubd-engine
//!
//! The reconciliation engine behind the stub server: ordered collections of
//! pending test-author actions and open HTTP transactions, plus the
//! synchronous matching pass that pairs them.
//!
//! Architectural decisions:
//! - Arrival order is structural: both collections are FIFO queues.
//! - An action is consumed the instant it matches, exactly once.
//! - Reconciliation is a plain `&mut self` method; a pass runs to completion
//!   with no interleaving and cannot be re-entered.
//! - Delivery side effects go through narrow sink traits; the HTTP glue
//!   implementing them lives in stubd-daemon.
//!
//! Deterministic logic. No sockets.

mod action;
mod engine;
mod matcher;
mod response;
mod transaction;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use action::{AbortReason, Action, ActionKind, ObserveReceiver, ObserveSender, PatternError};
pub use engine::Engine;
pub use response::{Method, ResponseSpec, DEFAULT_STATUS};
pub use transaction::{
    ErrorSink, RequestSnapshot, ResponseSink, SerializationFailure, Transaction,
};
