//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router mounted at the configured path
//! - Wire up middleware (request ID, tracing)
//! - Hand every matched request to the [`Pipeline`]
//! - Serve until the shutdown signal, then drain in-flight requests

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::{validate_config, ConfigError, ProxyConfig};
use crate::http::request::{request_id, request_id_layer};
use crate::proxy::Pipeline;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

/// HTTP server for the authentication proxy.
pub struct HttpServer {
    router: Router,
    config: Arc<ProxyConfig>,
    pipeline: Arc<Pipeline>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// The configuration is validated first, so an invalid one is an error
    /// rather than a panic while building routes.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let pipeline = Arc::new(Pipeline::from_config(&config)?);
        let state = AppState {
            pipeline: Arc::clone(&pipeline),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config: Arc::new(config),
            pipeline,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let mount = config.mount_prefix();
        let router = if mount == "/" {
            Router::new()
                .route("/", any(proxy_handler))
                .route("/{*path}", any(proxy_handler))
        } else {
            Router::new()
                .route(mount, any(proxy_handler))
                .route(&format!("{mount}/"), any(proxy_handler))
                .route(&format!("{mount}/{{*path}}"), any(proxy_handler))
        };

        let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id(request.headers()),
            )
        });

        router.with_state(state).layer(
            ServiceBuilder::new()
                .layer(request_id_layer())
                .layer(trace),
        )
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` resolves. In-flight requests are allowed to finish.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.pipeline.director().upstream(),
            mount_path = %self.config.mount_prefix(),
            max_concurrent_requests = self.pipeline.admission().capacity(),
            queue_timeout = ?self.pipeline.admission().queue_timeout(),
            "HTTP server starting"
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received, draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Shared handle to the request pipeline.
    pub fn pipeline(&self) -> Arc<Pipeline> {
        Arc::clone(&self.pipeline)
    }
}

/// Every routed request goes through the pipeline.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    state.pipeline.handle(request, remote).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationError;

    fn config() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.upstream = "http://127.0.0.1:3000".to_string();
        config
            .authentication
            .api_keys
            .push("correct-horse-battery-staple".to_string());
        config
    }

    #[test]
    fn builds_router_for_nested_mount() {
        let mut config = config();
        config.mount_path = "/api/v1/".to_string();
        let server = HttpServer::new(config).unwrap();
        assert_eq!(server.config().mount_prefix(), "/api/v1");
    }

    #[test]
    fn parameter_mount_is_a_config_error() {
        let mut config = config();
        config.mount_path = "/:tenant".to_string();

        match HttpServer::new(config) {
            Err(ConfigError::Validation(errors)) => assert_eq!(
                errors,
                vec![ValidationError::InvalidMountPath("/:tenant".to_string())]
            ),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("server built for an invalid mount path"),
        }
    }
}
