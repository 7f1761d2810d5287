//! # Gateway Tier Library
//!
//! The gateway is the world-entry tier. A client that already holds a session
//! key from the login tier connects here, proves possession of that key with
//! a keyed hash (the key itself never crosses the wire), and is advanced
//! through the per-connection lifecycle toward the character-select screen,
//! possibly via an admission queue.
//!
//! ## Module Organization
//!
//! ### Session Module (`session`)
//! The per-connection state machine. Owns the lifecycle state, routes each
//! inbound packet by (state, opcode), enforces ordering during the
//! authentication phase and drives queue admission. All of its collaborators
//! are injected so tests can substitute fakes.
//!
//! ### Session Proof Module (`session_proof`)
//! The pure keyed-hash check that ties a connection to a directory-supplied
//! session key. Byte-for-byte wire compatible with existing clients.
//!
//! ### Queue Module (`queue`)
//! World occupancy accounting and the admission queue: waiting connections
//! hold a continuation that fires when a slot frees up.
//!
//! ### Patch Module (`patch`)
//! Classifies the build number a client declares during authentication
//! against the allowed list, so outdated clients are turned away before any
//! directory traffic happens on their behalf.
//!
//! ### Network Module (`network`)
//! TCP accept loop and the per-connection task that serializes packet and
//! event handling onto a single execution context.

pub mod network;
pub mod patch;
pub mod queue;
pub mod session;
pub mod session_proof;
