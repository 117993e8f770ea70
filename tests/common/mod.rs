//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::Request,
    http::{HeaderMap, Uri},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use authentication_proxy::config::ProxyConfig;
use authentication_proxy::HttpServer;

pub const SECRET: &str = "correct-horse-battery-staple";

/// What a stub upstream saw for one request.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct Observed {
    pub uri: Uri,
    pub headers: HeaderMap,
}

/// Requests recorded by a stub upstream, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Observed>>>);

#[allow(dead_code)]
impl Recorder {
    pub fn record(&self, request: &Request) {
        self.0.lock().unwrap().push(Observed {
            uri: request.uri().clone(),
            headers: request.headers().clone(),
        });
    }

    pub fn all(&self) -> Vec<Observed> {
        self.0.lock().unwrap().clone()
    }

    pub fn last(&self) -> Observed {
        self.all().pop().expect("upstream saw no requests")
    }
}

/// Serve `router` on an ephemeral port and return its address.
pub async fn start_upstream(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Gateway configuration pointing at `upstream` with the shared test secret.
pub fn config_for(upstream: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.upstream = format!("http://{}", upstream);
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.authentication.api_keys = vec![SECRET.to_string()];
    config.admission.max_concurrent_requests = 16;
    config.admission.queue_timeout_ms = 1_000;
    config
}

/// A running gateway; dropping it stops the server.
pub struct Gateway {
    pub addr: SocketAddr,
    _stop: oneshot::Sender<()>,
}

#[allow(dead_code)]
impl Gateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start the gateway on an ephemeral port.
pub async fn start_gateway(config: ProxyConfig) -> Gateway {
    let server = HttpServer::new(config).expect("valid test config");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = server
            .run(listener, async move {
                let _ = stopped.await;
            })
            .await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(20)).await;
    Gateway { addr, _stop: stop }
}

/// HTTP client without pooling or system proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
