//! Balancer configuration.
//!
//! All settings are supplied through `RINGGATE_*` environment variables at
//! startup and are immutable afterwards. Missing variables fall back to
//! defaults matching a local docker deployment; present-but-invalid values
//! fail startup rather than being silently replaced.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Errors produced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable was present but could not be parsed or failed validation.
    #[error("invalid value for {name}: {reason}")]
    Invalid {
        /// Environment variable name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Immutable runtime settings for the balancer process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the control/proxy surface binds to.
    pub listen_addr: SocketAddr,
    /// Replicas spawned at startup.
    pub initial_replicas: usize,
    /// Total slots in the hash ring.
    pub ring_size: usize,
    /// Virtual nodes placed per replica.
    pub vnodes_per_replica: u16,
    /// Interval between heartbeat sweeps.
    pub health_interval: Duration,
    /// Timeout for a single liveness probe.
    pub probe_timeout: Duration,
    /// Client-facing timeout for proxied backend calls.
    pub proxy_timeout: Duration,
    /// Timeout for instance start/stop commands.
    pub stop_timeout: Duration,
    /// Port backend replicas serve on.
    pub backend_port: u16,
    /// Docker image used for backend replicas.
    pub docker_image: String,
    /// Docker network replicas are attached to.
    pub docker_network: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".parse().expect("valid default address"),
            initial_replicas: 3,
            ring_size: 512,
            vnodes_per_replica: 9,
            health_interval: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(2),
            proxy_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(10),
            backend_port: 5000,
            docker_image: "ringgate-backend:latest".to_string(),
            docker_network: "ringgate-net".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a variable is present but
    /// unparseable, or when the combination fails validation.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Exposed so tests can drive parsing without touching the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            listen_addr: parse_var(&lookup, "RINGGATE_LISTEN", defaults.listen_addr)?,
            initial_replicas: parse_var(
                &lookup,
                "RINGGATE_INITIAL_REPLICAS",
                defaults.initial_replicas,
            )?,
            ring_size: parse_var(&lookup, "RINGGATE_RING_SIZE", defaults.ring_size)?,
            vnodes_per_replica: parse_var(&lookup, "RINGGATE_VNODES", defaults.vnodes_per_replica)?,
            health_interval: parse_secs(
                &lookup,
                "RINGGATE_HEALTH_INTERVAL_SECS",
                defaults.health_interval,
            )?,
            probe_timeout: parse_secs(
                &lookup,
                "RINGGATE_PROBE_TIMEOUT_SECS",
                defaults.probe_timeout,
            )?,
            proxy_timeout: parse_secs(
                &lookup,
                "RINGGATE_PROXY_TIMEOUT_SECS",
                defaults.proxy_timeout,
            )?,
            stop_timeout: parse_secs(&lookup, "RINGGATE_STOP_TIMEOUT_SECS", defaults.stop_timeout)?,
            backend_port: parse_var(&lookup, "RINGGATE_BACKEND_PORT", defaults.backend_port)?,
            docker_image: lookup("RINGGATE_DOCKER_IMAGE").unwrap_or(defaults.docker_image),
            docker_network: lookup("RINGGATE_DOCKER_NETWORK").unwrap_or(defaults.docker_network),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    fn validate(&self) -> ConfigResult<()> {
        if self.ring_size == 0 {
            return Err(invalid("RINGGATE_RING_SIZE", "must be at least 1"));
        }
        if self.vnodes_per_replica == 0 {
            return Err(invalid("RINGGATE_VNODES", "must be at least 1"));
        }
        if usize::from(self.vnodes_per_replica) > self.ring_size {
            return Err(invalid(
                "RINGGATE_VNODES",
                "must not exceed RINGGATE_RING_SIZE",
            ));
        }
        if self.health_interval.is_zero() {
            return Err(invalid("RINGGATE_HEALTH_INTERVAL_SECS", "must be nonzero"));
        }
        if self.probe_timeout.is_zero() {
            return Err(invalid("RINGGATE_PROBE_TIMEOUT_SECS", "must be nonzero"));
        }
        if self.proxy_timeout.is_zero() {
            return Err(invalid("RINGGATE_PROXY_TIMEOUT_SECS", "must be nonzero"));
        }
        if self.stop_timeout.is_zero() {
            return Err(invalid("RINGGATE_STOP_TIMEOUT_SECS", "must be nonzero"));
        }
        Ok(())
    }
}

fn invalid(name: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> ConfigResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
            name: name.to_string(),
            reason: format!("{e} (got {raw:?})"),
        }),
        None => Ok(default),
    }
}

fn parse_secs<F>(lookup: &F, name: &str, default: Duration) -> ConfigResult<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse_var(lookup, name, default.as_secs())?;
    Ok(Duration::from_secs(secs))
}
