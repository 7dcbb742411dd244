//! Ingress subsystem: the configuration-change feed.
//!
//! # Data Flow
//! ```text
//! API server watch (kube::runtime::watcher)
//!     → watcher.rs (ObjectCache: apply/delete → Added/Updated/Deleted)
//!     → decode.rs (Ingress → IngressObject, drop unroutable shapes)
//!     → FeedMessage over an unbounded channel
//!     → Gateway event loop
//! ```

pub mod decode;
pub mod types;
pub mod watcher;

pub use types::{FeedMessage, HostRule, IngressEvent, IngressObject, PathBackend};
pub use watcher::{IngressWatcher, ObjectCache};
