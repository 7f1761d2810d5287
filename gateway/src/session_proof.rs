//! Keyed-hash session proof, gateway side.
//!
//! The digest layout is fixed by the client: account name bytes, a four-byte
//! zero field (reserved, must stay zero for wire compatibility), the
//! client seed, the server seed, then the full session key, all hashed with
//! SHA-1. Seeds are hashed in their little-endian byte order.

use sha1::{Digest, Sha1};
use shared::{SessionKey, PROOF_LENGTH};
use subtle::ConstantTimeEq;

/// Recomputes the session digest for the given inputs.
pub fn compute_session_digest(
    session_key: &SessionKey,
    username: &str,
    client_seed: u32,
    server_seed: u32,
) -> [u8; PROOF_LENGTH] {
    let mut hasher = Sha1::new();
    hasher.update(username.as_bytes());
    hasher.update([0u8; 4]);
    hasher.update(client_seed.to_le_bytes());
    hasher.update(server_seed.to_le_bytes());
    hasher.update(session_key.as_bytes());
    hasher.finalize().into()
}

/// Checks a submitted digest against the recomputed one in constant time.
pub fn verify_session_proof(
    session_key: &SessionKey,
    username: &str,
    client_seed: u32,
    server_seed: u32,
    submitted: &[u8; PROOF_LENGTH],
) -> bool {
    let expected = compute_session_digest(session_key, username, client_seed, server_seed);
    bool::from(expected[..].ct_eq(&submitted[..]))
}
