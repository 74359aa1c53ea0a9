//! Deterministic bounded hashing.
//!
//! Every placement decision in the balancer goes through [`hash_to_range`]:
//! virtual node positions, request lookups, and server id derivation. The
//! function digests the UTF-8 bytes of its input with SHA-256, interprets
//! the leading 16 bytes as a big-endian integer, and reduces it modulo the
//! requested range. Identical inputs produce identical outputs across
//! process restarts.

use sha2::{Digest, Sha256};

/// Modulus for server ids derived from replica identities.
///
/// Wide enough that collisions between a handful of replicas are
/// vanishingly unlikely, small enough to stay readable in logs.
pub const SERVER_ID_SPACE: u64 = 1_000_000;

/// Hash an arbitrary string into `[0, modulus)`.
///
/// # Panics
///
/// Panics if `modulus` is zero.
#[must_use]
pub fn hash_to_range(input: &str, modulus: u64) -> u64 {
    assert!(modulus > 0, "modulus must be nonzero");

    let digest = Sha256::digest(input.as_bytes());
    let head: [u8; 16] = digest[..16].try_into().expect("SHA-256 digest is 32 bytes");
    let wide = u128::from_be_bytes(head);

    (wide % u128::from(modulus)) as u64
}

/// Derive the stable server id for a replica identity.
#[must_use]
pub fn server_id(identity: &str) -> u64 {
    hash_to_range(identity, SERVER_ID_SPACE)
}
