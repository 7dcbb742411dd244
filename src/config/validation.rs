//! Configuration validation.
//!
//! Serde handles syntax; this module checks values that parse but cannot
//! work (unparseable socket addresses, clashing listeners, blank names).
//! Every problem is reported, not just the first.

use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listener = check_addr(
        "listener.bind_address",
        &config.listener.bind_address,
        &mut errors,
    );

    if config.admin.enabled {
        let admin = check_addr("admin.bind_address", &config.admin.bind_address, &mut errors);
        if listener.is_some() && listener == admin {
            errors.push(ValidationError::new(
                "admin.bind_address",
                "must differ from listener.bind_address",
            ));
        }
    }

    if config.observability.metrics_enabled {
        check_addr(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }

    let k8s = &config.kubernetes;
    for (field, value) in [
        ("kubernetes.context", &k8s.context),
        ("kubernetes.namespace", &k8s.namespace),
        ("kubernetes.ingress_class", &k8s.ingress_class),
    ] {
        if matches!(value, Some(v) if v.trim().is_empty()) {
            errors.push(ValidationError::new(field, "must not be blank when set"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(
    field: &'static str,
    value: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<SocketAddr> {
    match value.parse::<SocketAddr>() {
        Ok(addr) => Some(addr),
        Err(e) => {
            errors.push(ValidationError::new(field, format!("'{}': {}", value, e)));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-addr".into();
        config.kubernetes.namespace = Some("  ".into());
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = ":9090".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "observability.metrics_address",
                "kubernetes.namespace"
            ]
        );
    }

    #[test]
    fn test_admin_must_not_share_listener() {
        let mut config = GatewayConfig::default();
        config.admin.enabled = true;
        config.admin.bind_address = config.listener.bind_address.clone();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "admin.bind_address");
    }
}
