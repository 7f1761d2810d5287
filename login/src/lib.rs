//! # Login Tier Library
//!
//! The login tier runs the zero-knowledge password exchange. A client proves
//! knowledge of its password-derived secret without the password (or any
//! equivalent) crossing the wire; on success the derived session key is
//! published to the session key directory for the gateway tier to consume.
//!
//! ## Module Organization
//!
//! ### Authenticator Module (`authenticator`)
//! One SRP6 exchange per login attempt: issues the challenge, verifies the
//! client proof, applies account-status gates and classifies the outcome.
//! The exchange session is consumed by verification and can never be reused.
//!
//! ### Network Module (`network`)
//! TCP accept loop and the per-connection protocol driver: challenge out,
//! proof in, result out. Malformed frames close the connection without a
//! reply; every completed proof attempt is answered, success or not.

pub mod authenticator;
pub mod network;
