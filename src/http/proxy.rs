//! Reverse-proxy forwarding to a resolved destination.
//!
//! # Responsibilities
//! - Rewrite the request URI to the destination, keeping path and query
//! - Keep method, headers (including the client's `Host`) and body
//! - Strip hop-by-hop headers in both directions, append `X-Forwarded-For`
//! - Relay the backend response as-is, streaming the body
//!
//! # Design Decisions
//! - No retries and no timeouts beyond the client defaults
//! - Backends are always spoken to over HTTP/1.1

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Request, Response, Uri, Version};
use hyper::body::Incoming;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use url::Url;

/// Client used for every forwarded request.
pub type HttpClient = Client<HttpConnector, Body>;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("cannot build upstream URI: {0}")]
    Uri(#[from] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

pub fn build_client() -> HttpClient {
    Client::builder(TokioExecutor::new()).build(HttpConnector::new())
}

/// Forward `request` to `destination` and return the backend's response.
pub async fn forward(
    client: &HttpClient,
    destination: &Url,
    client_addr: Option<SocketAddr>,
    request: Request<Body>,
) -> Result<Response<Body>, ProxyError> {
    let (mut parts, body) = request.into_parts();

    // HTTP/2 clients send :authority instead of Host; keep it as the Host.
    if !parts.headers.contains_key(header::HOST) {
        if let Some(value) = parts
            .uri
            .authority()
            .and_then(|authority| HeaderValue::from_str(authority.as_str()).ok())
        {
            parts.headers.insert(header::HOST, value);
        }
    }

    parts.uri = target_uri(destination, &parts.uri)?;
    parts.version = Version::HTTP_11;
    strip_hop_by_hop(&mut parts.headers);
    append_forwarded_for(&mut parts.headers, client_addr);

    let response: Response<Incoming> = client.request(Request::from_parts(parts, body)).await?;

    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Ok(Response::from_parts(parts, Body::new(body)))
}

/// `scheme://host:port` from the destination, path and query from the request.
fn target_uri(destination: &Url, original: &Uri) -> Result<Uri, axum::http::Error> {
    let host = destination.host_str().unwrap_or_default();
    let authority = match destination.port_or_known_default() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    let path_and_query = original
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    Uri::builder()
        .scheme(destination.scheme())
        .authority(authority.as_str())
        .path_and_query(path_and_query)
        .build()
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    for name in &listed {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, client_addr: Option<SocketAddr>) {
    let Some(addr) = client_addr else {
        return;
    };

    let ip = addr.ip().to_string();
    let prior: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    let value = if prior.is_empty() {
        ip
    } else {
        format!("{}, {}", prior.join(", "), ip)
    };

    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(HeaderName::from_static(X_FORWARDED_FOR), value);
    }
}
