//! Heartbeat monitoring and auto-healing.
//!
//! The monitor sweeps the registry on a fixed interval. Each sweep probes
//! every registered replica's `/heartbeat` endpoint; replicas that error,
//! time out, or answer with a non-success status are destroyed and
//! replaced with a fresh randomly named replica. Sweeps never overlap:
//! probes within one sweep run concurrently, but the next sweep only
//! starts after the previous one (including replacements) has finished.

use super::manager::{ReplicaInfo, ReplicaPool};
use super::replica::Endpoint;
use crate::http::client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Background task that keeps the pool healthy.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    pool: Arc<ReplicaPool>,
    interval: Duration,
    probe_timeout: Duration,
    shutdown: mpsc::Receiver<()>,
}

impl HeartbeatMonitor {
    /// Create a monitor over the given pool.
    #[must_use]
    pub fn new(
        pool: Arc<ReplicaPool>,
        interval: Duration,
        probe_timeout: Duration,
        shutdown: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            pool,
            interval,
            probe_timeout,
            shutdown,
        }
    }

    /// Run the monitor until the shutdown channel fires.
    pub async fn run(mut self) {
        info!(
            interval_secs = self.interval.as_secs(),
            probe_timeout_secs = self.probe_timeout.as_secs(),
            "heartbeat monitor started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    debug!("heartbeat monitor shutting down");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {
                    let replaced = Self::sweep_once(&self.pool, self.probe_timeout).await;
                    if replaced > 0 {
                        info!(replaced, "heartbeat sweep replaced failed replicas");
                    }
                }
            }
        }
    }

    /// Probe every registered replica once and replace the failures.
    ///
    /// Returns the number of replicas that were destroyed because of a
    /// failed probe. Replacement failures are logged and left for the
    /// next sweep; nothing in here is fatal.
    pub async fn sweep_once(pool: &Arc<ReplicaPool>, probe_timeout: Duration) -> usize {
        let replicas = pool.replica_infos().await;
        if replicas.is_empty() {
            return 0;
        }

        let mut probes: JoinSet<(ReplicaInfo, bool)> = JoinSet::new();
        for replica in replicas {
            probes.spawn(async move {
                let healthy = probe(&replica.endpoint, probe_timeout).await;
                (replica, healthy)
            });
        }

        let mut failed = Vec::new();
        while let Some(result) = probes.join_next().await {
            match result {
                Ok((replica, true)) => {
                    debug!(identity = %replica.identity, "heartbeat ok");
                }
                Ok((replica, false)) => {
                    warn!(identity = %replica.identity, "heartbeat failed");
                    failed.push(replica.identity);
                }
                Err(e) => warn!(error = %e, "heartbeat probe task panicked"),
            }
        }

        let mut replaced = 0;
        for identity in failed {
            match pool.destroy_replica(&identity).await {
                Ok(()) => replaced += 1,
                Err(e) => {
                    // Most likely removed concurrently by a scale-down; in
                    // that case there is nothing to replace.
                    warn!(identity = %identity, error = %e, "failed to destroy unhealthy replica");
                    continue;
                }
            }

            match pool.create_replica(None).await {
                Ok(replacement) => {
                    info!(
                        failed = %identity,
                        replacement = %replacement.identity,
                        "replaced unhealthy replica"
                    );
                }
                Err(e) => {
                    warn!(
                        failed = %identity,
                        error = %e,
                        "failed to create replacement replica"
                    );
                }
            }
        }

        replaced
    }
}

/// Probe a replica's liveness endpoint.
///
/// Any transport error, timeout, or non-success status counts as a
/// failure.
async fn probe(endpoint: &Endpoint, probe_timeout: Duration) -> bool {
    match client::get(&endpoint.host, endpoint.port, "/heartbeat", probe_timeout).await {
        Ok(response) => response.status().is_success(),
        Err(e) => {
            debug!(endpoint = %endpoint, error = %e, "liveness probe failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::error::PoolResult;
    use crate::pool::runtime::{InstanceRuntime, RuntimeFuture};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve minimal HTTP 200 responses on an ephemeral port.
    async fn spawn_backend() -> (std::net::SocketAddr, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = stream.read(&mut buf).await;
                    let _ = stream
                        .write_all(
                            b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{}",
                        )
                        .await;
                });
            }
        });

        (addr, handle)
    }

    /// Runtime whose instances are real local listeners that can be killed.
    #[derive(Default)]
    struct ListenerRuntime {
        instances: Mutex<HashMap<String, JoinHandle<()>>>,
    }

    impl ListenerRuntime {
        fn kill(&self, identity: &str) {
            if let Some(handle) = self.instances.lock().unwrap().get(identity) {
                handle.abort();
            }
        }
    }

    impl InstanceRuntime for ListenerRuntime {
        fn start<'a>(&'a self, identity: &'a str) -> RuntimeFuture<'a, Endpoint> {
            Box::pin(async move {
                let (addr, handle) = spawn_backend().await;
                self.instances
                    .lock()
                    .unwrap()
                    .insert(identity.to_string(), handle);
                PoolResult::Ok(Endpoint {
                    host: addr.ip().to_string(),
                    port: addr.port(),
                })
            })
        }

        fn stop<'a>(&'a self, identity: &'a str) -> RuntimeFuture<'a, ()> {
            Box::pin(async move {
                if let Some(handle) = self.instances.lock().unwrap().remove(identity) {
                    handle.abort();
                }
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_probe_healthy_backend() {
        let (addr, handle) = spawn_backend().await;
        let endpoint = Endpoint {
            host: addr.ip().to_string(),
            port: addr.port(),
        };

        assert!(probe(&endpoint, Duration::from_secs(2)).await);
        handle.abort();
    }

    #[tokio::test]
    async fn test_probe_unreachable_backend() {
        let (addr, handle) = spawn_backend().await;
        handle.abort();
        // Give the abort a moment to release the listener.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let endpoint = Endpoint {
            host: addr.ip().to_string(),
            port: addr.port(),
        };
        assert!(!probe(&endpoint, Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn test_sweep_keeps_healthy_pool_untouched() {
        let runtime = Arc::new(ListenerRuntime::default());
        let pool = Arc::new(ReplicaPool::new(512, 9, runtime.clone()));
        pool.add_replicas(2, vec!["Saaaaa".into(), "Sbbbbb".into()])
            .await
            .unwrap();

        let replaced = HeartbeatMonitor::sweep_once(&pool, Duration::from_secs(2)).await;
        assert_eq!(replaced, 0);
        assert_eq!(pool.list().await.replicas, vec!["Saaaaa", "Sbbbbb"]);
    }

    #[tokio::test]
    async fn test_sweep_replaces_failed_replica() {
        let runtime = Arc::new(ListenerRuntime::default());
        let pool = Arc::new(ReplicaPool::new(512, 9, runtime.clone()));
        pool.add_replicas(3, vec!["Saaaaa".into(), "Sbbbbb".into(), "Sccccc".into()])
            .await
            .unwrap();

        runtime.kill("Sbbbbb");
        tokio::time::sleep(Duration::from_millis(20)).await;

        let replaced = HeartbeatMonitor::sweep_once(&pool, Duration::from_millis(500)).await;
        assert_eq!(replaced, 1);

        // Pool size restored; failed identity gone, replacement is random.
        let listing = pool.list().await;
        assert_eq!(listing.count, 3);
        assert!(!listing.replicas.contains(&"Sbbbbb".to_string()));
        assert!(listing.replicas.contains(&"Saaaaa".to_string()));
        assert!(listing.replicas.contains(&"Sccccc".to_string()));
        assert_eq!(pool.occupied_slots().await, 27);
    }

    #[tokio::test]
    async fn test_sweep_on_empty_pool_is_noop() {
        let runtime = Arc::new(ListenerRuntime::default());
        let pool = Arc::new(ReplicaPool::new(512, 9, runtime));

        let replaced = HeartbeatMonitor::sweep_once(&pool, Duration::from_millis(100)).await;
        assert_eq!(replaced, 0);
    }

    #[tokio::test]
    async fn test_monitor_stops_on_shutdown_signal() {
        let runtime = Arc::new(ListenerRuntime::default());
        let pool = Arc::new(ReplicaPool::new(512, 9, runtime));
        let (tx, rx) = mpsc::channel(1);

        let monitor = HeartbeatMonitor::new(
            pool,
            Duration::from_secs(60),
            Duration::from_secs(2),
            rx,
        );
        let handle = tokio::spawn(monitor.run());

        tx.send(()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor should exit promptly")
            .unwrap();
    }
}
