//! Decoding `networking.k8s.io/v1` Ingress objects into [`IngressObject`].
//!
//! Shapes the gateway cannot route are dropped here, at the boundary, with a
//! warning: a rule without an `http` block, a backend that is not a service,
//! or a service port given by name. The rest of the object still applies.

use k8s_openapi::api::networking::v1::{Ingress, IngressBackend};
use kube::ResourceExt;
use url::Url;

use crate::ingress::types::{HostRule, IngressObject, PathBackend};

/// Cache and log key for an Ingress.
pub fn object_key(ingress: &Ingress) -> String {
    format!(
        "{}/{}",
        ingress.namespace().unwrap_or_else(|| "default".to_string()),
        ingress.name_any()
    )
}

/// Whether this gateway should route `ingress`.
pub fn is_selected(ingress: &Ingress, ingress_class: Option<&str>) -> bool {
    match ingress_class {
        None => true,
        Some(class) => {
            ingress
                .spec
                .as_ref()
                .and_then(|spec| spec.ingress_class_name.as_deref())
                == Some(class)
        }
    }
}

/// Decode the routing content of an Ingress.
pub fn decode_ingress(ingress: &Ingress) -> IngressObject {
    let key = object_key(ingress);
    let Some(spec) = ingress.spec.as_ref() else {
        return IngressObject {
            key,
            default_backend: None,
            rules: Vec::new(),
        };
    };

    let default_backend = spec
        .default_backend
        .as_ref()
        .and_then(|backend| resolve_backend(&key, backend));

    let mut rules = Vec::new();
    for rule in spec.rules.iter().flatten() {
        let Some(http) = rule.http.as_ref() else {
            continue;
        };
        let host = rule.host.clone().unwrap_or_default();

        let paths = http
            .paths
            .iter()
            .filter_map(|path| {
                let destination = resolve_backend(&key, &path.backend)?;
                Some(PathBackend {
                    pattern: path.path.clone().unwrap_or_default(),
                    destination,
                })
            })
            .collect();

        rules.push(HostRule { host, paths });
    }

    IngressObject {
        key,
        default_backend,
        rules,
    }
}

/// Turn a service backend into `http://<service>:<port>`.
fn resolve_backend(key: &str, backend: &IngressBackend) -> Option<Url> {
    let Some(service) = backend.service.as_ref() else {
        tracing::warn!(ingress = %key, "Skipping backend without a service reference");
        return None;
    };

    let Some(number) = service.port.as_ref().and_then(|port| port.number) else {
        tracing::warn!(
            ingress = %key,
            service = %service.name,
            "Skipping backend without a numeric service port"
        );
        return None;
    };

    match Url::parse(&format!("http://{}:{}", service.name, number)) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!(
                ingress = %key,
                service = %service.name,
                port = number,
                error = %e,
                "Skipping backend with unusable address"
            );
            None
        }
    }
}
