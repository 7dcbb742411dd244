//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! gateway.toml (optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to Gateway::new and IngressWatcher::connect
//! ```
//!
//! # Design Decisions
//! - All fields have defaults so the gateway runs without a file
//! - Validation separates syntactic (serde) from semantic checks
//! - Routing itself is never configured here; it comes from Ingress objects

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{AdminConfig, GatewayConfig, KubernetesConfig, ListenerConfig, ObservabilityConfig};
