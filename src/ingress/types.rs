//! Strongly-typed Ingress model and the change events built from it.

use url::Url;

/// Routing content of one Ingress, decoded from the API object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressObject {
    /// `namespace/name`, used only for logging and cache bookkeeping.
    pub key: String,
    pub default_backend: Option<Url>,
    pub rules: Vec<HostRule>,
}

/// Paths routed for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRule {
    pub host: String,
    pub paths: Vec<PathBackend>,
}

/// A path pattern and its resolved backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathBackend {
    pub pattern: String,
    pub destination: Url,
}

impl IngressObject {
    /// Every host this object contributes to, first occurrence order, no
    /// duplicates.
    pub fn hosts(&self) -> Vec<&str> {
        let mut hosts: Vec<&str> = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            if !hosts.contains(&rule.host.as_str()) {
                hosts.push(&rule.host);
            }
        }
        hosts
    }

    /// All path/backend pairs for `host`, across every rule naming it.
    pub fn paths_for(&self, host: &str) -> Vec<(String, Url)> {
        self.rules
            .iter()
            .filter(|rule| rule.host == host)
            .flat_map(|rule| rule.paths.iter())
            .map(|p| (p.pattern.clone(), p.destination.clone()))
            .collect()
    }
}

/// A configuration change, as seen by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressEvent {
    Added(IngressObject),
    Updated {
        old: IngressObject,
        new: IngressObject,
    },
    Deleted(IngressObject),
}

impl IngressEvent {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            IngressEvent::Added(_) => "added",
            IngressEvent::Updated { .. } => "updated",
            IngressEvent::Deleted(_) => "deleted",
        }
    }

    pub fn key(&self) -> &str {
        match self {
            IngressEvent::Added(obj) | IngressEvent::Deleted(obj) => &obj.key,
            IngressEvent::Updated { new, .. } => &new.key,
        }
    }
}

/// Everything the feed can deliver, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    Event(IngressEvent),
    /// The initial snapshot (or a re-list) has been fully delivered.
    Synced,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(pattern: &str, dest: &str) -> PathBackend {
        PathBackend {
            pattern: pattern.into(),
            destination: Url::parse(dest).unwrap(),
        }
    }

    #[test]
    fn test_hosts_and_paths_merge_duplicate_hosts() {
        let obj = IngressObject {
            key: "default/web".into(),
            default_backend: None,
            rules: vec![
                HostRule {
                    host: "a.com".into(),
                    paths: vec![path("/x", "http://x:80")],
                },
                HostRule {
                    host: "b.com".into(),
                    paths: vec![path("/", "http://b:80")],
                },
                HostRule {
                    host: "a.com".into(),
                    paths: vec![path("/y", "http://y:80")],
                },
            ],
        };

        assert_eq!(obj.hosts(), vec!["a.com", "b.com"]);
        let a: Vec<_> = obj.paths_for("a.com").into_iter().map(|(p, _)| p).collect();
        assert_eq!(a, vec!["/x", "/y"]);
        assert!(obj.paths_for("c.com").is_empty());
    }
}
