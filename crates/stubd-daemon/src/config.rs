//! Listener configuration accepted by `StubServer::start`.

use serde::{Deserialize, Serialize};

/// Where to bind and which path prefixes to stub.
///
/// Every listed prefix (and everything beneath it) is wired to the inbound
/// transaction handler. Port 0 binds an ephemeral port; see
/// `StubServer::local_addr`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub paths: Vec<String>,
}

impl ServerConfig {
    pub fn new(port: u16, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            port,
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for ServerConfig {
    /// The conventional harness wiring: port 3000, everything under `/api`.
    fn default() -> Self {
        Self::new(3000, ["/api"])
    }
}
