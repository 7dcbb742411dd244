//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use ingress_gateway::ingress::{FeedMessage, HostRule, IngressEvent, IngressObject, PathBackend};
use ingress_gateway::{Gateway, GatewayConfig, GatewayError, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

/// Start a mock backend that answers every request with
/// `"<name> <method> <path> host=<host> xff=<x-forwarded-for>"`.
pub async fn start_echo_backend(addr: SocketAddr, name: &'static str) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let head = read_head(&mut socket).await;
                        let mut lines = head.lines();
                        let mut request_line = lines.next().unwrap_or_default().split(' ');
                        let method = request_line.next().unwrap_or_default().to_string();
                        let path = request_line.next().unwrap_or_default().to_string();
                        let mut host = String::new();
                        let mut xff = String::new();
                        for line in lines {
                            if let Some((k, v)) = line.split_once(':') {
                                match k.trim().to_ascii_lowercase().as_str() {
                                    "host" => host = v.trim().to_string(),
                                    "x-forwarded-for" => xff = v.trim().to_string(),
                                    _ => {}
                                }
                            }
                        }

                        let body = format!("{} {} {} host={} xff={}", name, method, path, host, xff);
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nX-Backend: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            name,
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

async fn read_head(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// A gateway running on its own task, fed by the test.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub feed: mpsc::UnboundedSender<FeedMessage>,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), GatewayError>>,
}

impl TestGateway {
    pub fn start(addr: SocketAddr) -> Self {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = addr.to_string();

        let gateway = Gateway::new(config);
        let shutdown = gateway.shutdown_handle();
        let (feed, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move { gateway.start(rx).await });

        Self {
            addr,
            feed,
            shutdown,
            handle,
        }
    }

    pub fn send(&self, event: IngressEvent) {
        self.feed.send(FeedMessage::Event(event)).unwrap();
    }

    /// Deliver the sync barrier and wait for the listener to come up.
    pub async fn sync(&self) {
        self.feed.send(FeedMessage::Synced).unwrap();
        for _ in 0..100 {
            if TcpStream::connect(self.addr).await.is_ok() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("gateway did not start listening on {}", self.addr);
    }

    /// Let queued feed messages be applied.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("gateway did not stop")
            .unwrap();
        assert!(result.is_ok(), "gateway exited with {:?}", result);
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn object(
    name: &str,
    default: Option<SocketAddr>,
    rules: Vec<(&str, Vec<(&str, SocketAddr)>)>,
) -> IngressObject {
    IngressObject {
        key: format!("default/{}", name),
        default_backend: default.map(backend_url),
        rules: rules
            .into_iter()
            .map(|(host, paths)| HostRule {
                host: host.to_string(),
                paths: paths
                    .into_iter()
                    .map(|(pattern, addr)| PathBackend {
                        pattern: pattern.to_string(),
                        destination: backend_url(addr),
                    })
                    .collect(),
            })
            .collect(),
    }
}

pub fn backend_url(addr: SocketAddr) -> Url {
    Url::parse(&format!("http://{}", addr)).unwrap()
}
