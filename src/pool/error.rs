//! Replica pool error types.

use crate::ring::RingError;
use thiserror::Error;

/// Errors that can occur while managing the replica pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Ring capacity exhausted or ring empty.
    #[error(transparent)]
    Ring(#[from] RingError),

    /// The instance runtime could not start a backend instance.
    #[error("failed to start instance '{identity}': {reason}")]
    Spawn {
        /// Identity the instance was to be tagged with.
        identity: String,
        /// Runtime-reported reason.
        reason: String,
    },

    /// The instance runtime could not stop a backend instance.
    #[error("failed to stop instance '{identity}': {reason}")]
    Stop {
        /// Identity of the instance.
        identity: String,
        /// Runtime-reported reason.
        reason: String,
    },

    /// No replica is registered under this identity.
    #[error("replica '{0}' not found")]
    NotFound(String),

    /// A replica is already registered under this identity.
    #[error("replica '{0}' is already registered")]
    AlreadyRegistered(String),

    /// A scale request was malformed; nothing was changed.
    #[error("{0}")]
    Validation(String),

    /// The ring resolved to a virtual node with no registered owner.
    ///
    /// Observable symptom of ring/registry desynchronization; reported,
    /// never masked.
    #[error("mapped replica not found for server {server_id} (virtual index {virtual_index})")]
    MappedReplicaMissing {
        /// Server id the ring slot pointed at.
        server_id: u64,
        /// Virtual index held by the slot.
        virtual_index: u16,
    },
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
