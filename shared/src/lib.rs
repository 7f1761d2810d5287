//! Common protocol definitions shared between the login and gateway tiers.
//!
//! This crate carries everything both tiers (and their tests) need to agree
//! on: the wire packet enums and their bincode framing, the fixed result-code
//! values the game client expects, the SRP6 exchange math, and the
//! collaborator traits (credential store, session key directory, character
//! service) that the tiers are wired together through.

pub mod framing;
pub mod protocol;
pub mod results;
pub mod services;
pub mod srp;

/// Salt length issued with every password challenge, in bytes.
pub const SALT_LENGTH: usize = 16;

/// Length of every proof digest exchanged during authentication (SHA-1).
pub const PROOF_LENGTH: usize = 20;

/// Wire length of a public ephemeral value, zero-padded little-endian.
pub const EPHEMERAL_LENGTH: usize = 32;

/// Length of the interleaved session key derived from a completed exchange.
pub const SESSION_KEY_LENGTH: usize = 40;

/// The shared secret established by a completed login exchange.
///
/// It never crosses the wire after creation; only keyed hashes of it do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKey(pub [u8; SESSION_KEY_LENGTH]);

impl SessionKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Normalizes a username the way the client does for proof calculations.
///
/// Usernames are stored case-preserving but compared and hashed uppercase.
pub fn normalize_username(username: &str) -> String {
    username.to_uppercase()
}
