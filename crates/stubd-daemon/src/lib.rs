//! stubd-daemon library target.
//!
//! Exposes the stub server and its configuration for integration tests and
//! embedding. The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod config;
pub(crate) mod routes;
pub mod server;

pub use config::ServerConfig;
pub use server::{ServerError, StubServer};
