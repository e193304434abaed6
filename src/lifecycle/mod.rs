//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build service → Register proxies → Serve + status cycle
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → status cycle and HTTP server exit → handler shut down
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
