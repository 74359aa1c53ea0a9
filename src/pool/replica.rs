//! Replica records and identity generation.

use crate::hash;
use rand::distr::Alphanumeric;
use rand::Rng;
use std::fmt;

/// Network address a replica answers on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Hostname or IP the replica is reachable at.
    pub host: String,
    /// Port the replica serves on.
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A registered backend replica.
#[derive(Debug, Clone)]
pub struct Replica {
    pub(crate) identity: String,
    pub(crate) server_id: u64,
    pub(crate) virtual_indices: Vec<u16>,
    pub(crate) endpoint: Endpoint,
}

impl Replica {
    /// Create a replica record.
    #[must_use]
    pub fn new(
        identity: String,
        server_id: u64,
        virtual_indices: Vec<u16>,
        endpoint: Endpoint,
    ) -> Self {
        Self {
            identity,
            server_id,
            virtual_indices,
            endpoint,
        }
    }

    /// Unique identity string.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Stable hashed server id.
    #[must_use]
    pub fn server_id(&self) -> u64 {
        self.server_id
    }

    /// Virtual indices successfully placed in the ring.
    #[must_use]
    pub fn virtual_indices(&self) -> &[u16] {
        &self.virtual_indices
    }

    /// Network endpoint reported by the instance runtime.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

/// Generate a fresh random replica identity.
///
/// Format matches the deployment convention: `S` followed by five
/// alphanumeric characters. Uniqueness against the registry is the
/// caller's job.
#[must_use]
pub fn random_identity() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(char::from)
        .collect();
    format!("S{suffix}")
}

/// Derive the server id for an identity.
#[must_use]
pub fn derive_server_id(identity: &str) -> u64 {
    hash::server_id(identity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_identity_format() {
        for _ in 0..20 {
            let identity = random_identity();
            assert_eq!(identity.len(), 6);
            assert!(identity.starts_with('S'));
            assert!(identity.chars().skip(1).all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_server_id_stable_for_identity() {
        let identity = random_identity();
        assert_eq!(derive_server_id(&identity), derive_server_id(&identity));
        assert!(derive_server_id(&identity) < crate::hash::SERVER_ID_SPACE);
    }

    #[test]
    fn test_endpoint_display() {
        let endpoint = Endpoint {
            host: "Sabc12".to_string(),
            port: 5000,
        };
        assert_eq!(endpoint.to_string(), "Sabc12:5000");
    }

    #[test]
    fn test_replica_accessors() {
        let replica = Replica::new(
            "Sabc12".to_string(),
            42,
            vec![0, 1, 2],
            Endpoint {
                host: "Sabc12".to_string(),
                port: 5000,
            },
        );

        assert_eq!(replica.identity(), "Sabc12");
        assert_eq!(replica.server_id(), 42);
        assert_eq!(replica.virtual_indices(), &[0, 1, 2]);
        assert_eq!(replica.endpoint().port, 5000);
    }
}
