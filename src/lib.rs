//! Kubernetes Ingress gateway library.

pub mod config;
pub mod error;
pub mod http;
pub mod ingress;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::Gateway;
pub use lifecycle::Shutdown;
