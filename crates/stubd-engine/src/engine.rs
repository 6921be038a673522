//! Action queue, transaction registry, and the reconciliation pass.
//!
//! The engine is the only place matching, consumption, and delivery side
//! effects happen. Every mutation of either collection runs `reconcile()` to
//! completion before returning; callers never observe a partially reconciled
//! state. The single suspension mechanism on the delivery side is a spawned
//! timer for positive delays, which re-enters delivery only, never
//! reconciliation.

use std::collections::VecDeque;
use std::time::Duration;

use serde_json::json;
use tracing::debug;

use crate::action::{AbortReason, Action, ActionKind};
use crate::matcher;
use crate::response::ResponseSpec;
use crate::transaction::{RequestSnapshot, Transaction};

/// Status answered to transactions that are still open when the server is
/// reset or stopped.
const UNMATCHED_STATUS: u16 = 404;

/// Ordered bookkeeping for pending actions and open transactions.
#[derive(Debug, Default)]
pub struct Engine {
    /// Pending test-author intents, arrival order.
    actions: VecDeque<Action>,
    /// Open transactions, arrival order.
    transactions: VecDeque<Transaction>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a registered action and run a reconciliation pass.
    ///
    /// A matching open transaction is answered (or observed) synchronously
    /// within this call.
    pub fn register(&mut self, action: Action) {
        self.actions.push_back(action);
        self.reconcile();
    }

    /// Append an inbound transaction and run a reconciliation pass.
    ///
    /// A matching pending action fires synchronously within this call.
    pub fn accept(&mut self, transaction: Transaction) {
        debug!(
            id = %transaction.id(),
            method = %transaction.snapshot().method,
            url = %transaction.snapshot().url,
            "transaction accepted"
        );
        self.transactions.push_back(transaction);
        self.reconcile();
    }

    /// Unconsumed respond specs, oldest first. Observe actions are not
    /// response specs and do not appear here.
    pub fn pending_responses(&self) -> Vec<ResponseSpec> {
        self.actions
            .iter()
            .filter_map(Action::respond_spec)
            .cloned()
            .collect()
    }

    /// Open transactions' request snapshots, oldest first.
    pub fn pending_requests(&self) -> Vec<RequestSnapshot> {
        self.transactions
            .iter()
            .map(|tx| tx.snapshot().clone())
            .collect()
    }

    /// Flush all outstanding state: answer every open transaction with a
    /// not-found status, reject every pending observe with `reason`, and drop
    /// every unconsumed respond spec.
    ///
    /// A delayed delivery already scheduled is unaffected: its transaction
    /// left the registry when its action was consumed.
    pub fn flush(&mut self, reason: AbortReason) {
        debug!(
            open_transactions = self.transactions.len(),
            pending_actions = self.actions.len(),
            %reason,
            "flushing engine"
        );
        while let Some(transaction) = self.transactions.pop_front() {
            Self::write_unmatched(transaction);
        }
        while let Some(action) = self.actions.pop_front() {
            if let ActionKind::Observe(sender) = action.into_kind() {
                let _ = sender.send(Err(reason));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// Pair open transactions with pending actions, oldest first on both
    /// axes.
    ///
    /// The oldest open transaction takes priority for the oldest matching
    /// action; a respond match closes the transaction and moves on, an
    /// observe match leaves it open for further pending actions in this same
    /// pass. Taking `&mut self` makes re-entry of a running pass
    /// unrepresentable.
    fn reconcile(&mut self) {
        let mut tx_idx = 0;
        while tx_idx < self.transactions.len() {
            let mut closed = false;
            let mut action_idx = 0;
            while action_idx < self.actions.len() {
                if !matcher::matches(&self.actions[action_idx], self.transactions[tx_idx].snapshot()) {
                    action_idx += 1;
                    continue;
                }
                // Consume the action the instant it matches.
                let Some(action) = self.actions.remove(action_idx) else {
                    break;
                };
                match action.into_kind() {
                    ActionKind::Respond(spec) => {
                        let Some(transaction) = self.transactions.remove(tx_idx) else {
                            break;
                        };
                        debug!(
                            id = %transaction.id(),
                            pattern = %spec.pattern,
                            "respond action matched; transaction closed"
                        );
                        Self::deliver(transaction, spec);
                        // The transaction at tx_idx is gone; the next one
                        // shifted into its slot.
                        closed = true;
                        break;
                    }
                    ActionKind::Observe(sender) => {
                        let transaction = &self.transactions[tx_idx];
                        debug!(id = %transaction.id(), "observe action matched; transaction stays open");
                        let _ = sender.send(Ok(transaction.snapshot().clone()));
                        // The action at action_idx is gone; keep scanning the
                        // remaining actions for this same open transaction.
                    }
                }
            }
            if !closed {
                tx_idx += 1;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------------

    /// Perform response delivery for a closed transaction.
    ///
    /// With a positive delay the write is deferred on a timer; the
    /// transaction already left the registry and the action is already
    /// consumed; the delay only defers the write.
    fn deliver(transaction: Transaction, spec: ResponseSpec) {
        let delay = spec.delay_ms.unwrap_or(0);
        if delay > 0 {
            debug!(id = %transaction.id(), delay_ms = delay, "deferring response delivery");
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Self::write_response(transaction, &spec);
            });
        } else {
            Self::write_response(transaction, &spec);
        }
    }

    fn write_response(mut transaction: Transaction, spec: &ResponseSpec) {
        transaction
            .response
            .set_status(spec.status_or_default(), spec.status_text.as_deref());
        if let Some(headers) = &spec.headers {
            for (name, value) in headers {
                transaction.response.insert_header(name, value);
            }
        }
        let body = spec.data.clone().unwrap_or(serde_json::Value::Null);
        if let Err(err) = transaction.response.write_json(&body) {
            // The failure belongs to this transaction's caller, not to
            // whichever registration or arrival triggered the delivery.
            transaction.errors.fail(err);
        }
    }

    fn write_unmatched(mut transaction: Transaction) {
        let error = format!(
            "no stub response matched {} {}",
            transaction.snapshot().method,
            transaction.snapshot().url
        );
        transaction.response.set_status(UNMATCHED_STATUS, None);
        if let Err(err) = transaction.response.write_json(&json!({ "error": error })) {
            transaction.errors.fail(err);
        }
    }
}
