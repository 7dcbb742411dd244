//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, dispatch handler)
//!     → routing::RouteState::lookup (host, path)
//!     → proxy.rs (rewrite URI, forward, relay response)
//!     or 404 with an empty body
//!
//! admin.rs serves health, readiness and the route dump on a separate port.
//! ```

pub mod admin;
pub mod proxy;
pub mod server;

pub use server::Gateway;
