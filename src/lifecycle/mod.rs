//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (http/server.rs, Gateway::start):
//!     Spawn feed consumer → Wait for cache sync → Bind listener → Serve
//!
//! Shutdown (shutdown.rs):
//!     Gateway::stop / signal → Stop watcher and feed consumer
//!     → Stop accepting → Drain in-flight requests → Return
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Listener binds last: no traffic before routes are loaded
//! - Forwarding calls already in flight are never cancelled by shutdown

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::wait_for_signal;
