//! Wire packet definitions for both tiers.
//!
//! Packets are serde enums encoded with bincode, the codec both ends already
//! agree on. Big-integer fields (`public_ephemeral`, `prime`) travel
//! little-endian and must be byte-reversed before any arithmetic; the
//! conversion helpers live in [`crate::srp`].

use crate::results::{LoginResult, ResponseCode};
use crate::{EPHEMERAL_LENGTH, PROOF_LENGTH, SALT_LENGTH};
use serde::{Deserialize, Serialize};

/// Packets the game client sends to the login tier.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum LoginClientPacket {
    LogonChallenge {
        username: String,
    },
    LogonProof {
        /// Client public ephemeral A, little-endian.
        public_ephemeral: [u8; EPHEMERAL_LENGTH],
        /// Client proof M1.
        proof: [u8; PROOF_LENGTH],
    },
}

/// Packets the login tier sends back to the game client.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum LoginServerPacket {
    LogonChallengeReply {
        result: LoginResult,
        /// Server public ephemeral B, little-endian.
        public_ephemeral: [u8; EPHEMERAL_LENGTH],
        salt: [u8; SALT_LENGTH],
        /// Group safe prime N, little-endian.
        prime: [u8; EPHEMERAL_LENGTH],
        generator: u8,
    },
    LogonProofReply {
        result: LoginResult,
        /// Server proof M2, sent on success and failure alike so the client
        /// can tell a genuine server from an impostor.
        server_proof: [u8; PROOF_LENGTH],
    },
}

/// Packets the game client sends to the gateway tier.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum ClientPacket {
    Ping {
        sequence: u32,
        latency: u32,
    },
    KeepAlive,
    AuthSession {
        build: u32,
        username: String,
        /// Client-chosen seed mixed into the session proof.
        seed: u32,
        /// SHA-1 over username, padding, both seeds and the session key.
        digest: [u8; PROOF_LENGTH],
    },
    CharEnum,
    CharCreate {
        name: String,
    },
    CharDelete {
        id: u64,
    },
    PlayerLogin {
        id: u64,
    },
}

/// A character entry as presented on the character-select screen.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Character {
    pub id: u64,
    pub name: String,
    pub level: u8,
}

/// Packets the gateway tier sends to the game client.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum ServerPacket {
    /// First packet on every connection, carrying the server-issued seed.
    AuthChallenge {
        seed: u32,
    },
    Pong {
        sequence: u32,
    },
    AuthResponse {
        result: ResponseCode,
    },
    QueuePosition {
        position: u32,
    },
    CharEnumReply {
        characters: Vec<Character>,
    },
    CharCreateReply {
        result: ResponseCode,
    },
    CharDeleteReply {
        result: ResponseCode,
    },
}
