//! Response bodies stubd-daemon produces on its own behalf.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded by
//! Axum and decoded by tests. No business logic lives here.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Not-found answers
// ---------------------------------------------------------------------------

/// Body answered when no stub is in play: calls reaching a stale listener
/// after stop, calls to unconfigured paths, and transactions still open when
/// the server is reset or stopped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnmatchedResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Delivery faults
// ---------------------------------------------------------------------------

/// Body answered when a matched response could not be written; the original
/// call surfaces the fault instead of the canned body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultResponse {
    pub error: String,
}
