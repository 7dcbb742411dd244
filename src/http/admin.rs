//! Admin endpoints, served on their own listener so they never shadow
//! proxied paths.
//!
//! - `GET /healthz`: process is up
//! - `GET /readyz`: 200 once the initial Ingress sync is applied, 503 before
//! - `GET /routes`: JSON dump of the route table

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::sync::watch;

use crate::routing::{RouteSnapshot, RouteState};

#[derive(Clone)]
pub struct AdminState {
    pub routes: RouteState,
    pub ready: watch::Receiver<bool>,
}

pub fn admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/routes", get(routes))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(state): State<AdminState>) -> Response {
    if *state.ready.borrow() {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "waiting for Ingress sync").into_response()
    }
}

async fn routes(State(state): State<AdminState>) -> Json<RouteSnapshot> {
    Json(state.routes.snapshot())
}
