//! Route table: host → ordered backend rules, plus a default destination.
//!
//! # Responsibilities
//! - Store compiled rules per exact host string
//! - Replace or drop a host's rules wholesale
//! - Resolve (host, path) to a destination
//!
//! # Design Decisions
//! - Rules under one host are stored in descending pattern-string order and
//!   evaluated first-match-wins. This is not longest-prefix matching:
//!   `/ab` is tried before `/a`, but `/b` is also tried before `/api`.
//! - A host entry with no rule matching the path falls through to the
//!   default destination
//! - Plain value with `&mut self` mutators; sharing and locking live in
//!   `routing::state`

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use url::Url;

use crate::routing::rule::BackendRule;

/// In-memory routing decision surface.
#[derive(Debug, Default)]
pub struct RouteTable {
    hosts: HashMap<String, Vec<BackendRule>>,
    default: Option<Url>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rule list for `host` with `rules`.
    ///
    /// Rules are sorted by descending pattern string before being stored.
    /// Patterns that do not compile are skipped; if nothing survives the
    /// host entry is removed.
    pub fn apply_rules(&mut self, host: &str, mut rules: Vec<(String, Url)>) {
        rules.sort_by(|(a, _), (b, _)| b.cmp(a));

        let compiled: Vec<BackendRule> = rules
            .into_iter()
            .filter_map(|(pattern, destination)| {
                match BackendRule::new(&pattern, destination) {
                    Ok(rule) => Some(rule),
                    Err(e) => {
                        tracing::warn!(
                            host = %host,
                            pattern = %pattern,
                            error = %e,
                            "Skipping rule with invalid path pattern"
                        );
                        None
                    }
                }
            })
            .collect();

        if compiled.is_empty() {
            self.hosts.remove(host);
        } else {
            self.hosts.insert(host.to_string(), compiled);
        }
    }

    /// Drop every rule for `host`. No-op if the host is unknown.
    pub fn remove_host(&mut self, host: &str) {
        self.hosts.remove(host);
    }

    /// Replace the process-wide default destination.
    pub fn set_default(&mut self, destination: Option<Url>) {
        self.default = destination;
    }

    /// Resolve a request to its destination.
    pub fn lookup(&self, host: &str, path: &str) -> Option<&Url> {
        self.hosts
            .get(host)
            .and_then(|rules| rules.iter().find(|rule| rule.matches(path)))
            .map(BackendRule::destination)
            .or(self.default.as_ref())
    }

    pub fn default_destination(&self) -> Option<&Url> {
        self.default.as_ref()
    }

    pub fn contains_host(&self, host: &str) -> bool {
        self.hosts.contains_key(host)
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn rule_count(&self) -> usize {
        self.hosts.values().map(Vec::len).sum()
    }

    /// Read-only view of the table, hosts sorted by name.
    pub fn snapshot(&self) -> RouteSnapshot {
        RouteSnapshot {
            default: self.default.as_ref().map(Url::to_string),
            hosts: self
                .hosts
                .iter()
                .map(|(host, rules)| {
                    let rules = rules
                        .iter()
                        .map(|rule| RuleView {
                            pattern: rule.pattern().to_string(),
                            destination: rule.destination().to_string(),
                        })
                        .collect();
                    (host.clone(), rules)
                })
                .collect(),
        }
    }
}

/// Serializable copy of a [`RouteTable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSnapshot {
    pub default: Option<String>,
    pub hosts: BTreeMap<String, Vec<RuleView>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleView {
    pub pattern: String,
    pub destination: String,
}
