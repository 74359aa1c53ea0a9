//! Replica registry and lifecycle management.
//!
//! [`ReplicaPool`] owns the hash ring and the identity registry behind a
//! single lock, so every mutation (virtual node placement plus registry
//! update) is atomic from the point of view of concurrent lookups. A
//! lookup can never observe a ring slot whose owner is missing from the
//! registry, nor a registered replica whose virtual nodes are absent from
//! the ring.

use super::error::{PoolError, PoolResult};
use super::replica::{derive_server_id, random_identity, Endpoint, Replica};
use super::runtime::InstanceRuntime;
use crate::ring::HashRing;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Read-only snapshot of the registry for the control surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaListing {
    /// Number of registered replicas.
    pub count: usize,
    /// Their identities, sorted for stable output.
    pub replicas: Vec<String>,
}

/// Identity and endpoint of a single replica, as handed to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaInfo {
    /// Unique identity string.
    pub identity: String,
    /// Network endpoint the replica answers on.
    pub endpoint: Endpoint,
}

/// Ring and registry, mutated together under the pool's lock.
#[derive(Debug)]
struct PoolState {
    ring: HashRing,
    replicas: HashMap<String, Replica>,
}

/// Authoritative replica pool: creates, destroys, and locates replicas,
/// keeping ring and registry in lockstep.
pub struct ReplicaPool {
    state: RwLock<PoolState>,
    runtime: Arc<dyn InstanceRuntime>,
    vnodes_per_replica: u16,
}

impl std::fmt::Debug for ReplicaPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicaPool")
            .field("vnodes_per_replica", &self.vnodes_per_replica)
            .finish_non_exhaustive()
    }
}

impl ReplicaPool {
    /// Create an empty pool with the given ring size and virtual node
    /// count per replica.
    #[must_use]
    pub fn new(ring_size: usize, vnodes_per_replica: u16, runtime: Arc<dyn InstanceRuntime>) -> Self {
        Self {
            state: RwLock::new(PoolState {
                ring: HashRing::with_capacity(ring_size),
                replicas: HashMap::new(),
            }),
            runtime,
            vnodes_per_replica,
        }
    }

    /// Create and register a replica.
    ///
    /// When `identity` is absent a fresh random one is generated. The
    /// replica's virtual nodes are placed first; if any placement fails or
    /// the instance cannot be started, everything already placed is rolled
    /// back, so a replica is either fully registered or not at all.
    ///
    /// # Errors
    ///
    /// [`PoolError::AlreadyRegistered`] for a duplicate identity,
    /// [`PoolError::Ring`] when the ring is full, or [`PoolError::Spawn`]
    /// when the instance runtime fails.
    pub async fn create_replica(&self, identity: Option<String>) -> PoolResult<ReplicaInfo> {
        let mut state = self.state.write().await;

        let identity = match identity {
            Some(identity) => {
                if state.replicas.contains_key(&identity) {
                    return Err(PoolError::AlreadyRegistered(identity));
                }
                identity
            }
            None => loop {
                let candidate = random_identity();
                if !state.replicas.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        let server_id = derive_server_id(&identity);
        let mut placed: Vec<u16> = Vec::with_capacity(usize::from(self.vnodes_per_replica));

        for virtual_index in 0..self.vnodes_per_replica {
            match state.ring.insert(server_id, virtual_index) {
                Ok(slot) => {
                    debug!(identity = %identity, virtual_index, slot, "virtual node placed");
                    placed.push(virtual_index);
                }
                Err(e) => {
                    for &rollback in &placed {
                        state.ring.remove(server_id, rollback);
                    }
                    return Err(e.into());
                }
            }
        }

        let endpoint = match self.runtime.start(&identity).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                for &rollback in &placed {
                    state.ring.remove(server_id, rollback);
                }
                return Err(e);
            }
        };

        let replica = Replica::new(identity.clone(), server_id, placed, endpoint.clone());
        state.replicas.insert(identity.clone(), replica);
        info!(identity = %identity, server_id, endpoint = %endpoint, "replica registered");

        Ok(ReplicaInfo { identity, endpoint })
    }

    /// Destroy a registered replica.
    ///
    /// The instance stop is best-effort: a stop failure is logged and
    /// cleanup proceeds, so a replica can never end up unreachable but
    /// still registered. Ring slots are always released.
    ///
    /// # Errors
    ///
    /// [`PoolError::NotFound`] when no replica has this identity.
    pub async fn destroy_replica(&self, identity: &str) -> PoolResult<()> {
        let mut state = self.state.write().await;

        let replica = state
            .replicas
            .get(identity)
            .cloned()
            .ok_or_else(|| PoolError::NotFound(identity.to_string()))?;

        if let Err(e) = self.runtime.stop(identity).await {
            warn!(identity = %identity, error = %e, "instance stop failed, cleaning up anyway");
        }

        for &virtual_index in replica.virtual_indices() {
            if !state.ring.remove(replica.server_id(), virtual_index) {
                warn!(
                    identity = %identity,
                    virtual_index,
                    "virtual node was already missing from ring"
                );
            }
        }
        state.replicas.remove(identity);
        info!(identity = %identity, "replica deregistered");

        Ok(())
    }

    /// Add `count` replicas with the given identities.
    ///
    /// Validation is all-or-nothing: a count mismatch, duplicate
    /// hostname, or already-registered hostname rejects the request before
    /// any replica is created. Creation then proceeds one at a time and
    /// the first hard failure (ring full, spawn failure) is surfaced.
    ///
    /// # Errors
    ///
    /// [`PoolError::Validation`] for a malformed request, otherwise
    /// whatever [`ReplicaPool::create_replica`] reports.
    pub async fn add_replicas(
        &self,
        count: usize,
        identities: Vec<String>,
    ) -> PoolResult<ReplicaListing> {
        if identities.len() != count {
            return Err(PoolError::Validation(
                "length of hostname list is not equal to newly added instances".to_string(),
            ));
        }

        {
            let state = self.state.read().await;
            let mut seen = HashSet::new();
            for identity in &identities {
                if !seen.insert(identity.as_str()) {
                    return Err(PoolError::Validation(format!(
                        "duplicate hostname '{identity}' in request"
                    )));
                }
                if state.replicas.contains_key(identity) {
                    return Err(PoolError::Validation(format!(
                        "hostname '{identity}' is already a replica"
                    )));
                }
            }
        }

        for identity in identities {
            self.create_replica(Some(identity)).await?;
        }

        Ok(self.list().await)
    }

    /// Remove `count` replicas by identity.
    ///
    /// Every listed identity must currently be registered and the count
    /// must match, or the request is rejected before any replica is
    /// destroyed.
    ///
    /// # Errors
    ///
    /// [`PoolError::Validation`] for a malformed request, otherwise
    /// whatever [`ReplicaPool::destroy_replica`] reports.
    pub async fn remove_replicas(
        &self,
        count: usize,
        identities: Vec<String>,
    ) -> PoolResult<ReplicaListing> {
        if identities.len() != count {
            return Err(PoolError::Validation(
                "hostnames provided not equal to specified 'n'".to_string(),
            ));
        }

        {
            let state = self.state.read().await;
            let mut seen = HashSet::new();
            for identity in &identities {
                if !seen.insert(identity.as_str()) {
                    return Err(PoolError::Validation(format!(
                        "duplicate hostname '{identity}' in request"
                    )));
                }
                if !state.replicas.contains_key(identity) {
                    return Err(PoolError::Validation(format!(
                        "hostname '{identity}' not found among current replicas"
                    )));
                }
            }
        }

        for identity in &identities {
            self.destroy_replica(identity).await?;
        }

        Ok(self.list().await)
    }

    /// Snapshot of the current replica listing.
    pub async fn list(&self) -> ReplicaListing {
        let state = self.state.read().await;
        let mut replicas: Vec<String> = state.replicas.keys().cloned().collect();
        replicas.sort();
        ReplicaListing {
            count: replicas.len(),
            replicas,
        }
    }

    /// Identity and endpoint of every registered replica.
    pub async fn replica_infos(&self) -> Vec<ReplicaInfo> {
        let state = self.state.read().await;
        state
            .replicas
            .values()
            .map(|replica| ReplicaInfo {
                identity: replica.identity().to_string(),
                endpoint: replica.endpoint().clone(),
            })
            .collect()
    }

    /// Resolve a request key to the replica owning its ring territory.
    ///
    /// # Errors
    ///
    /// [`RingError::Empty`](crate::ring::RingError::Empty) when no replica
    /// is registered, or [`PoolError::MappedReplicaMissing`] when the ring
    /// and registry have diverged.
    pub async fn locate(&self, request_key: &str) -> PoolResult<ReplicaInfo> {
        let state = self.state.read().await;
        let node = state.ring.resolve(request_key)?;

        let replica = state
            .replicas
            .values()
            .find(|replica| {
                replica.server_id() == node.server_id
                    && replica.virtual_indices().contains(&node.virtual_index)
            })
            .ok_or(PoolError::MappedReplicaMissing {
                server_id: node.server_id,
                virtual_index: node.virtual_index,
            })?;

        Ok(ReplicaInfo {
            identity: replica.identity().to_string(),
            endpoint: replica.endpoint().clone(),
        })
    }

    /// Destroy every registered replica, tolerating individual failures.
    ///
    /// Returns how many replicas were destroyed.
    pub async fn shutdown_all(&self) -> usize {
        let identities = self.list().await.replicas;
        let total = identities.len();
        let mut destroyed = 0;

        for identity in identities {
            match self.destroy_replica(&identity).await {
                Ok(()) => destroyed += 1,
                Err(e) => warn!(identity = %identity, error = %e, "failed to destroy replica"),
            }
        }

        info!(destroyed, total, "pool shut down");
        destroyed
    }

    /// Number of registered replicas.
    pub async fn len(&self) -> usize {
        self.state.read().await.replicas.len()
    }

    /// Check whether no replica is registered.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of occupied ring slots.
    pub async fn occupied_slots(&self) -> usize {
        self.state.read().await.ring.occupied()
    }
}
