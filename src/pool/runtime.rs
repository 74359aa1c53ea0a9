//! Instance runtime abstraction.
//!
//! The pool does not know how backend instances come to exist; it talks to
//! an [`InstanceRuntime`] that can start and stop an instance by identity.
//! Production uses [`DockerRuntime`]; tests inject fakes.

use super::error::{PoolError, PoolResult};
use super::replica::Endpoint;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Boxed future returned by runtime operations.
pub type RuntimeFuture<'a, T> = Pin<Box<dyn Future<Output = PoolResult<T>> + Send + 'a>>;

/// Capability to start and stop backend instances by identity.
pub trait InstanceRuntime: Send + Sync {
    /// Start an instance tagged with `identity`.
    ///
    /// Returns the endpoint the instance answers on, or
    /// [`PoolError::Spawn`] if it could not be started.
    fn start<'a>(&'a self, identity: &'a str) -> RuntimeFuture<'a, Endpoint>;

    /// Stop the instance tagged with `identity`.
    ///
    /// Callers treat failure as best-effort: it is reported but must not
    /// block registry cleanup.
    fn stop<'a>(&'a self, identity: &'a str) -> RuntimeFuture<'a, ()>;
}

/// Instance runtime backed by the local docker daemon.
///
/// Instances are containers named after their identity, attached to a
/// shared network so the balancer can reach them by container name, with
/// the identity injected via the `SERVER_ID` environment variable.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    image: String,
    network: String,
    backend_port: u16,
    command_timeout: Duration,
}

impl DockerRuntime {
    /// Create a docker runtime.
    #[must_use]
    pub fn new(
        image: impl Into<String>,
        network: impl Into<String>,
        backend_port: u16,
        command_timeout: Duration,
    ) -> Self {
        Self {
            image: image.into(),
            network: network.into(),
            backend_port,
            command_timeout,
        }
    }

    /// Arguments for `docker` to start an instance.
    fn run_args(&self, identity: &str) -> Vec<String> {
        vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            identity.to_string(),
            "--network".to_string(),
            self.network.clone(),
            "-e".to_string(),
            format!("SERVER_ID={identity}"),
            self.image.clone(),
        ]
    }

    /// Arguments for `docker` to stop and remove an instance.
    fn remove_args(identity: &str) -> Vec<String> {
        vec!["rm".to_string(), "-f".to_string(), identity.to_string()]
    }

    /// Run a docker command with a bounded timeout, reporting stderr on
    /// failure.
    async fn run_docker(&self, args: &[String]) -> Result<(), String> {
        let result = timeout(self.command_timeout, Command::new("docker").args(args).output()).await;

        match result {
            Ok(Ok(output)) if output.status.success() => Ok(()),
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(format!(
                    "docker exited with {}: {}",
                    output.status,
                    stderr.trim()
                ))
            }
            Ok(Err(e)) => Err(format!("failed to execute docker: {e}")),
            Err(_) => Err(format!(
                "docker command timed out after {:?}",
                self.command_timeout
            )),
        }
    }
}

impl InstanceRuntime for DockerRuntime {
    fn start<'a>(&'a self, identity: &'a str) -> RuntimeFuture<'a, Endpoint> {
        Box::pin(async move {
            let args = self.run_args(identity);
            debug!(identity = %identity, image = %self.image, "starting container");

            self.run_docker(&args)
                .await
                .map_err(|reason| PoolError::Spawn {
                    identity: identity.to_string(),
                    reason,
                })?;

            Ok(Endpoint {
                host: identity.to_string(),
                port: self.backend_port,
            })
        })
    }

    fn stop<'a>(&'a self, identity: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(async move {
            let args = Self::remove_args(identity);
            debug!(identity = %identity, "removing container");

            self.run_docker(&args)
                .await
                .map_err(|reason| PoolError::Stop {
                    identity: identity.to_string(),
                    reason,
                })
        })
    }
}
