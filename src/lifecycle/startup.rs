//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the server from a validated configuration
//! - Start the metrics endpoint when enabled
//! - Bind the listener and serve until a signal arrives
//! - Drain in-flight requests, bounded by the grace period
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener binds last, so traffic only arrives once ready

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::config::ProxyConfig;
use crate::http::HttpServer;
use crate::lifecycle::signals;
use crate::observability::metrics;

/// Run the gateway until SIGINT/SIGTERM, then shut down gracefully.
pub async fn run(config: ProxyConfig) -> Result<(), Box<dyn std::error::Error>> {
    let grace_period = config.shutdown.grace_period();
    let bind_address = config.listener.bind_address.clone();

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let server = HttpServer::new(config)?;
    let pipeline = server.pipeline();

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server_task = tokio::spawn(server.run(listener, async move {
        let _ = stop_rx.await;
    }));

    tokio::select! {
        result = &mut server_task => {
            // The server only stops on its own when accepting fails.
            result??;
            return Ok(());
        }
        _ = signals::wait_for_signal() => {}
    }

    tracing::info!(
        in_flight = pipeline.admission().in_flight(),
        grace_period = ?grace_period,
        "Stopping, waiting for in-flight requests"
    );
    let _ = stop_tx.send(());

    match tokio::time::timeout(grace_period, server_task).await {
        Ok(result) => result??,
        Err(_) => tracing::warn!(
            in_flight = pipeline.admission().in_flight(),
            "Grace period elapsed, abandoning remaining requests"
        ),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
