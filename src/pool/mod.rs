//! # Replica Pool Module
//!
//! This module owns the backend replica fleet: the authoritative registry
//! of live replicas, their virtual node placement in the hash ring, the
//! instance runtime that starts and stops backend processes, and the
//! heartbeat loop that replaces replicas which stop answering.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │         ReplicaPool          │
//! │                              │
//! │  ┌──────────┐  ┌──────────┐  │      ┌─────────────┐
//! │  │ HashRing │  │ Registry │──┼────▶│  Instance   │
//! │  └──────────┘  └──────────┘  │      │  Runtime    │
//! │        ▲             ▲       │      └─────────────┘
//! └────────┼─────────────┼───────┘
//!          │             │
//!    ┌───────────┐ ┌───────────┐
//!    │  Routing  │ │ Heartbeat │
//!    │  lookups  │ │  monitor  │
//!    └───────────┘ └───────────┘
//! ```
//!
//! Ring and registry are mutated together under one lock; see
//! [`manager::ReplicaPool`] for the consistency guarantees.

pub mod error;
pub mod health;
pub mod manager;
pub mod replica;
pub mod runtime;

pub use error::{PoolError, PoolResult};
pub use health::HeartbeatMonitor;
pub use manager::{ReplicaInfo, ReplicaListing, ReplicaPool};
pub use replica::{random_identity, Endpoint, Replica};
pub use runtime::{DockerRuntime, InstanceRuntime, RuntimeFuture};
