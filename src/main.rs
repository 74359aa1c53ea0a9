//! Ringgate binary entry point.
//!
//! Wires the replica pool, heartbeat monitor, and control surface
//! together: load configuration from the environment, spawn the initial
//! replica fleet, serve until interrupted, then tear everything down.

use anyhow::{Context, Result};
use ringgate::config::Config;
use ringgate::http::{server, Api};
use ringgate::pool::{DockerRuntime, HeartbeatMonitor, ReplicaPool};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();

    let config = Config::from_env().context("failed to load configuration")?;
    info!(
        listen = %config.listen_addr,
        ring_size = config.ring_size,
        vnodes = config.vnodes_per_replica,
        initial_replicas = config.initial_replicas,
        image = %config.docker_image,
        "starting ringgate"
    );

    let runtime = Arc::new(DockerRuntime::new(
        config.docker_image.clone(),
        config.docker_network.clone(),
        config.backend_port,
        config.stop_timeout,
    ));
    let pool = Arc::new(ReplicaPool::new(
        config.ring_size,
        config.vnodes_per_replica,
        runtime,
    ));

    for _ in 0..config.initial_replicas {
        let replica = pool
            .create_replica(None)
            .await
            .context("failed to spawn initial replica")?;
        info!(identity = %replica.identity, "initial replica started");
    }

    let (monitor_tx, monitor_rx) = mpsc::channel(1);
    let monitor = HeartbeatMonitor::new(
        Arc::clone(&pool),
        config.health_interval,
        config.probe_timeout,
        monitor_rx,
    );
    let monitor_handle = tokio::spawn(monitor.run());

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    let api = Arc::new(Api::new(Arc::clone(&pool), config.proxy_timeout));
    let (server_tx, server_rx) = mpsc::channel(1);
    let server_handle = tokio::spawn(server::serve(listener, api, server_rx));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received, cleaning up");

    let _ = monitor_tx.send(()).await;
    let _ = server_tx.send(()).await;
    let _ = monitor_handle.await;
    let _ = server_handle.await;

    let destroyed = pool.shutdown_all().await;
    info!(destroyed, "ringgate stopped");

    Ok(())
}

/// Initialize the `tracing` subscriber.
///
/// Respects `RUST_LOG` if set, defaulting to info-level output.
fn setup_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
