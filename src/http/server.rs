//! Gateway server: feed consumption, startup ordering, request dispatch.
//!
//! # Responsibilities
//! - Apply Ingress feed messages to the route table
//! - Hold the listener back until the initial sync is applied
//! - Dispatch every request: route table lookup, then forward or 404
//! - Shut down gracefully, letting in-flight requests finish

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::admin::{admin_router, AdminState};
use crate::http::proxy::{self, HttpClient};
use crate::ingress::FeedMessage;
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::observability::metrics::{self, Outcome};
use crate::routing::RouteState;

/// State injected into the dispatch handler.
#[derive(Clone)]
pub struct AppState {
    pub routes: RouteState,
    pub client: HttpClient,
}

/// The ingress gateway.
pub struct Gateway {
    config: GatewayConfig,
    routes: RouteState,
    client: HttpClient,
    shutdown: Shutdown,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            routes: RouteState::new(),
            client: proxy::build_client(),
            shutdown: Shutdown::new(),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn routes(&self) -> &RouteState {
        &self.routes
    }

    /// Handle that stops this gateway when triggered.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Begin graceful shutdown. `start` returns once in-flight requests drain.
    pub fn stop(&self) {
        tracing::info!("Gateway stop requested");
        self.shutdown.trigger();
    }

    /// The proxy router, without a listener.
    pub fn router(&self) -> Router {
        let state = AppState {
            routes: self.routes.clone(),
            client: self.client.clone(),
        };

        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Consume `feed`, wait for the initial sync, then serve until stopped.
    pub async fn start(
        &self,
        feed: mpsc::UnboundedReceiver<FeedMessage>,
    ) -> Result<(), GatewayError> {
        let addr = parse_addr(&self.config.listener.bind_address)?;
        let (ready_tx, ready_rx) = watch::channel(false);

        if self.config.admin.enabled {
            self.spawn_admin(ready_rx.clone()).await?;
        }

        let consumer = tokio::spawn(consume_feed(
            feed,
            self.routes.clone(),
            ready_tx,
            self.shutdown.subscribe(),
        ));

        let mut ready = ready_rx;
        let mut shutdown = self.shutdown.subscribe();
        tokio::select! {
            // A stop also ends the consumer, which must not read as a closed feed.
            biased;
            _ = shutdown.wait() => {
                tracing::info!("Stopped before the initial Ingress sync");
                let _ = consumer.await;
                return Ok(());
            }
            synced = async { ready.wait_for(|ready| *ready).await.is_ok() } => {
                if !synced {
                    return Err(GatewayError::FeedClosed);
                }
            }
        }

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| GatewayError::Bind { addr, source })?;
        tracing::info!(
            address = %listener.local_addr()?,
            routes = self.routes.snapshot().hosts.len(),
            "Ingress cache synced, accepting traffic"
        );

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();
        let mut signal = self.shutdown.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { signal.wait().await })
            .await?;

        // The listener can only stop via shutdown, but make sure the feed
        // consumer is told either way.
        self.shutdown.trigger();
        let _ = consumer.await;

        tracing::info!("Gateway stopped");
        Ok(())
    }

    async fn spawn_admin(&self, ready: watch::Receiver<bool>) -> Result<(), GatewayError> {
        let addr = parse_addr(&self.config.admin.bind_address)?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| GatewayError::Bind { addr, source })?;
        tracing::info!(address = %addr, "Admin listener bound");

        let app = admin_router(AdminState {
            routes: self.routes.clone(),
            ready,
        });
        let mut signal = self.shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.wait().await })
                .await
            {
                tracing::error!(error = %e, "Admin server error");
            }
        });
        Ok(())
    }
}

fn parse_addr(addr: &str) -> Result<SocketAddr, GatewayError> {
    addr.parse().map_err(|source| GatewayError::Address {
        addr: addr.to_string(),
        source,
    })
}

/// Apply feed messages until shutdown or until the feed closes.
async fn consume_feed(
    mut feed: mpsc::UnboundedReceiver<FeedMessage>,
    routes: RouteState,
    ready: watch::Sender<bool>,
    mut shutdown: ShutdownSignal,
) {
    loop {
        let message = tokio::select! {
            _ = shutdown.wait() => break,
            message = feed.recv() => message,
        };

        match message {
            Some(FeedMessage::Event(event)) => {
                tracing::info!(kind = event.kind(), ingress = %event.key(), "Ingress event");
                routes.apply(&event);
            }
            Some(FeedMessage::Synced) => {
                if !*ready.borrow() {
                    tracing::info!("Initial Ingress sync applied");
                    ready.send_replace(true);
                }
            }
            None => {
                tracing::warn!("Ingress feed closed; routes are frozen");
                break;
            }
        }
    }
}

/// Host used for routing: the `Host` header, else the URI authority.
fn request_host(request: &Request<Body>) -> String {
    request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.as_str().to_string()))
        .unwrap_or_default()
}

/// Route one request: forward to the matched destination, or 404.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let host = request_host(&request);
    let path = request.uri().path().to_string();

    let Some(destination) = state.routes.lookup(&host, &path) else {
        tracing::debug!(method = %method, host = %host, path = %path, "No route matched");
        metrics::record_request(method.as_str(), 404, Outcome::NotFound, start);
        return StatusCode::NOT_FOUND.into_response();
    };

    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    tracing::debug!(
        method = %method,
        host = %host,
        path = %path,
        destination = %destination,
        "Forwarding request"
    );

    match proxy::forward(&state.client, &destination, client_addr, request).await {
        Ok(response) => {
            metrics::record_request(
                method.as_str(),
                response.status().as_u16(),
                Outcome::Forwarded,
                start,
            );
            response
        }
        Err(e) => {
            tracing::warn!(
                host = %host,
                path = %path,
                destination = %destination,
                error = %e,
                "Upstream request failed"
            );
            metrics::record_request(method.as_str(), 502, Outcome::UpstreamError, start);
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingress::{HostRule, IngressEvent, IngressObject, PathBackend};
    use tower::ServiceExt;
    use url::Url;

    fn object(host: &str, pattern: &str, dest: &str) -> IngressObject {
        IngressObject {
            key: format!("default/{}", host),
            default_backend: None,
            rules: vec![HostRule {
                host: host.into(),
                paths: vec![PathBackend {
                    pattern: pattern.into(),
                    destination: Url::parse(dest).unwrap(),
                }],
            }],
        }
    }

    #[tokio::test]
    async fn test_unrouted_request_is_empty_404() {
        let gateway = Gateway::new(GatewayConfig::default());
        let response = gateway
            .router()
            .oneshot(
                Request::get("/anything")
                    .header(header::HOST, "foo.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_502() {
        let gateway = Gateway::new(GatewayConfig::default());
        // Port 9 on loopback: nothing listens there in a test environment.
        gateway
            .routes()
            .apply(&IngressEvent::Added(object("a.com", "/", "http://127.0.0.1:9")));

        let response = gateway
            .router()
            .oneshot(
                Request::get("/x")
                    .header(header::HOST, "a.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_request_host_prefers_header() {
        let request = Request::get("http://authority.com/x")
            .header(header::HOST, "header.com")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_host(&request), "header.com");

        let request = Request::get("http://authority.com:8443/x")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_host(&request), "authority.com:8443");

        let request = Request::get("/x").body(Body::empty()).unwrap();
        assert_eq!(request_host(&request), "");
    }

    #[tokio::test]
    async fn test_feed_sync_flips_ready_after_events() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, mut ready_rx) = watch::channel(false);
        let routes = RouteState::new();
        let shutdown = Shutdown::new();

        tx.send(FeedMessage::Event(IngressEvent::Added(object(
            "a.com",
            "/",
            "http://svc:80",
        )))).unwrap();
        tx.send(FeedMessage::Synced).unwrap();

        let task = tokio::spawn(consume_feed(rx, routes.clone(), ready_tx, shutdown.subscribe()));
        ready_rx.wait_for(|ready| *ready).await.unwrap();

        // Everything before Synced is already applied.
        assert!(routes.lookup("a.com", "/").is_some());

        shutdown.trigger();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_feed_closed_before_sync_fails_start() {
        let (tx, rx) = mpsc::unbounded_channel::<FeedMessage>();
        drop(tx);

        let mut config = GatewayConfig::default();
        config.listener.bind_address = "127.0.0.1:0".into();
        let gateway = Gateway::new(config);

        let result = gateway.start(rx).await;
        assert!(matches!(result, Err(GatewayError::FeedClosed)));
    }

    #[tokio::test]
    async fn test_stop_before_sync_returns() {
        let (_tx, rx) = mpsc::unbounded_channel::<FeedMessage>();

        let mut config = GatewayConfig::default();
        config.listener.bind_address = "127.0.0.1:0".into();
        let gateway = Gateway::new(config);
        gateway.stop();

        let result = tokio::time::timeout(std::time::Duration::from_secs(2), gateway.start(rx))
            .await
            .expect("start should return promptly");
        assert!(result.is_ok());
    }
}
