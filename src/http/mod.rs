//! HTTP surface of a node.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, trace + timeout layers)
//!         POST /cluster/rpc → ProxyService::handle_rpc → JSON reply or null
//!         /admin/*          → admin module (bearer key)
//! ```

pub mod server;

pub use server::{AppState, HttpServer};
