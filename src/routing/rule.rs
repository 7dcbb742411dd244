//! Backend rules: one compiled path pattern paired with a destination.
//!
//! # Design Decisions
//! - Patterns are regular expressions with unanchored search semantics,
//!   so `/api` matches `/v1/api/users` as well as `/api`
//! - Compiled once when the rule is built, never on the request path
//! - Immutable after construction

use regex::Regex;
use url::Url;

/// A path pattern and the backend it routes to.
#[derive(Debug, Clone)]
pub struct BackendRule {
    pattern: Regex,
    destination: Url,
}

impl BackendRule {
    /// Compile `pattern` and pair it with `destination`.
    pub fn new(pattern: &str, destination: Url) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            destination,
        })
    }

    /// Returns true if the request path matches this rule's pattern.
    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    /// The pattern source as written in the Ingress.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn destination(&self) -> &Url {
        &self.destination
    }
}
