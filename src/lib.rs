//! # Ringgate
//!
//! A self-managing HTTP load balancer built on a fixed-capacity
//! consistent-hash ring with virtual nodes.
//!
//! ## Features
//!
//! - Consistent hashing with linear probing and per-replica virtual nodes
//! - Dynamic scale-up/scale-down through a JSON control surface
//! - Heartbeat monitoring with automatic destroy-and-replace healing
//! - Pluggable instance runtime (docker in production, fakes in tests)
//!
//! ## Architecture
//!
//! A request entering the catch-all proxy is resolved on the
//! [`ring::HashRing`] to a virtual node, mapped through the
//! [`pool::ReplicaPool`] registry to a live replica, and forwarded to
//! that replica's endpoint. Scale operations and the heartbeat loop
//! mutate ring and registry together under the pool's lock, so routing
//! never observes the two out of sync.

pub mod config;
pub mod hash;
pub mod http;
pub mod pool;
pub mod ring;
