//! Shared route state: the single lock around the [`RouteTable`] and the
//! handlers that turn Ingress events into table mutations.
//!
//! # Design Decisions
//! - One exclusive `Mutex` for lookups and mutations alike; table
//!   operations are small map edits, so readers never wait long
//! - Each event is applied under a single lock acquisition, so an update's
//!   retract and re-apply are never observed separately
//! - The table itself is private; callers can only apply events, look up,
//!   or take a snapshot

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use url::Url;

use crate::ingress::{IngressEvent, IngressObject};
use crate::observability::metrics;
use crate::routing::table::{RouteSnapshot, RouteTable};

/// Clonable handle to the gateway's route table.
#[derive(Debug, Clone, Default)]
pub struct RouteState {
    table: Arc<Mutex<RouteTable>>,
}

impl RouteState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one configuration change atomically.
    pub fn apply(&self, event: &IngressEvent) {
        let mut table = self.lock();
        match event {
            IngressEvent::Added(obj) => on_added(&mut table, obj),
            IngressEvent::Updated { old, new } => on_updated(&mut table, old, new),
            IngressEvent::Deleted(obj) => on_deleted(&mut table, obj),
        }

        tracing::debug!(
            kind = event.kind(),
            ingress = %event.key(),
            hosts = table.host_count(),
            rules = table.rule_count(),
            "Applied Ingress event"
        );
        metrics::record_route_event(event.kind(), table.host_count());
    }

    /// Resolve a request to a destination. The lock is released before return.
    pub fn lookup(&self, host: &str, path: &str) -> Option<Url> {
        self.lock().lookup(host, path).cloned()
    }

    pub fn snapshot(&self) -> RouteSnapshot {
        self.lock().snapshot()
    }

    fn lock(&self) -> MutexGuard<'_, RouteTable> {
        // Table operations cannot leave it half-written, so a poisoned lock
        // still guards a consistent table.
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn on_added(table: &mut RouteTable, obj: &IngressObject) {
    for host in obj.hosts() {
        table.apply_rules(host, obj.paths_for(host));
    }
    if let Some(default) = &obj.default_backend {
        table.set_default(Some(default.clone()));
    }
}

fn on_updated(table: &mut RouteTable, old: &IngressObject, new: &IngressObject) {
    on_deleted(table, old);
    on_added(table, new);
}

fn on_deleted(table: &mut RouteTable, obj: &IngressObject) {
    if obj.default_backend.is_some() {
        table.set_default(None);
    }
    for host in obj.hosts() {
        table.remove_host(host);
    }
}
