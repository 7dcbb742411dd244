//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Ingress event (Added / Updated / Deleted)
//!     → state.rs (take the lock, retract and/or apply)
//!     → table.rs (replace or drop host entries, set default)
//!
//! Incoming request (host, path)
//!     → state.rs (take the lock)
//!     → table.rs (host entry → rule.rs first match → else default)
//!     → destination URL or miss
//! ```
//!
//! # Design Decisions
//! - Routes change at runtime; the table is mutated in place under one lock
//! - Deterministic: same table and request always give the same destination
//! - First match wins, in descending pattern order

pub mod rule;
pub mod state;
pub mod table;

pub use rule::BackendRule;
pub use state::RouteState;
pub use table::{RouteSnapshot, RouteTable, RuleView};
