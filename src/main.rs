//! Kubernetes Ingress gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────┐
//!   Kubernetes API   │                INGRESS GATEWAY                │
//!   ─────────────────┼─▶ ingress::watcher ──▶ FeedMessage channel    │
//!    (watch Ingress) │                              │                │
//!                    │                              ▼                │
//!                    │                     routing::RouteState       │
//!                    │                  (one lock around RouteTable) │
//!                    │                              ▲                │
//!   Client Request   │                              │ lookup         │
//!   ─────────────────┼─▶ http::server (dispatch) ───┘                │
//!                    │          │                                    │
//!   Client Response  │          ▼                                    │
//!   ◀────────────────┼── http::proxy (forward) ◀──────────────────── ┼── Backend Service
//!                    └───────────────────────────────────────────────┘
//! ```
//!
//! The listener only binds after the watcher's initial list has been applied.

use std::path::PathBuf;

use clap::Parser;
use tokio::sync::mpsc;

use ingress_gateway::config::validation::validate_config;
use ingress_gateway::config::{load_config, ConfigError, GatewayConfig};
use ingress_gateway::ingress::IngressWatcher;
use ingress_gateway::lifecycle::wait_for_signal;
use ingress_gateway::observability::{logging, metrics};
use ingress_gateway::Gateway;

#[derive(Parser)]
#[command(name = "ingress-gateway")]
#[command(about = "Reverse proxy driven by Kubernetes Ingress resources", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!("ingress-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    // The kube client's TLS stack needs a process-wide crypto provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing::info!(
        bind_address = %config.listener.bind_address,
        namespace = config.kubernetes.namespace.as_deref().unwrap_or("*"),
        resync_secs = config.kubernetes.resync_secs,
        admin_enabled = config.admin.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let watcher = IngressWatcher::connect(&config.kubernetes).await?;
    let gateway = Gateway::new(config);
    let shutdown = gateway.shutdown_handle();

    let (feed_tx, feed_rx) = mpsc::unbounded_channel();
    tokio::spawn(watcher.run(feed_tx, shutdown.subscribe()));

    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    gateway.start(feed_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
