//! One complete password-proof round per login attempt.

use log::{debug, warn};
use num_bigint::BigUint;
use shared::results::LoginResult;
use shared::services::{AccountRecord, CredentialStore};
use shared::srp::{ephemeral_from_wire, ephemeral_to_wire, group_prime, SrpServer, GENERATOR};
use shared::{SessionKey, EPHEMERAL_LENGTH, PROOF_LENGTH, SALT_LENGTH};
use std::sync::Arc;

/// Outcome of starting an exchange for a username.
pub enum BeginOutcome {
    /// Credentials found; the challenge is ready to send.
    Challenge(LoginExchange),
    /// No such account. Whether to reveal this to the client is the caller's
    /// policy; the wire driver reports it the way the client expects.
    AccountNotFound,
    /// The credential store failed; reported as a generic busy error.
    StoreError,
}

/// Outcome of a verified proof.
pub struct ProofOutcome {
    pub result: LoginResult,
    /// Always sent back, even on failure, so the client can verify it is
    /// talking to a genuine server.
    pub server_proof: [u8; PROOF_LENGTH],
    /// Present only on success; the caller publishes it to the directory.
    pub session_key: Option<SessionKey>,
}

/// A single in-flight exchange. Created by [`Authenticator::begin_exchange`],
/// consumed exactly once by [`LoginExchange::verify_proof`].
pub struct LoginExchange {
    account: AccountRecord,
    srp: SrpServer,
}

impl LoginExchange {
    /// Server public ephemeral B in wire (little-endian) form.
    pub fn public_ephemeral_wire(&self) -> [u8; EPHEMERAL_LENGTH] {
        ephemeral_to_wire(self.srp.public_ephemeral())
    }

    pub fn salt(&self) -> [u8; SALT_LENGTH] {
        *self.srp.salt()
    }

    /// Group prime in wire (little-endian) form.
    pub fn prime_wire(&self) -> [u8; EPHEMERAL_LENGTH] {
        ephemeral_to_wire(&group_prime())
    }

    pub fn generator(&self) -> u8 {
        GENERATOR
    }

    /// Verifies the submitted proof, consuming the exchange.
    ///
    /// The two wire values arrive little-endian and are reversed before any
    /// arithmetic. On a proof match the account-status gates run in fixed
    /// order: banned, then suspended, then success.
    pub fn verify_proof(
        self,
        client_ephemeral_wire: &[u8; EPHEMERAL_LENGTH],
        client_proof: &[u8; PROOF_LENGTH],
    ) -> ProofOutcome {
        let client_public: BigUint = ephemeral_from_wire(client_ephemeral_wire);
        let proof = self
            .srp
            .verify(&self.account.username, &client_public, client_proof);

        if !proof.matched {
            debug!("proof mismatch for {}", self.account.username);
            return ProofOutcome {
                result: LoginResult::FailIncorrectPassword,
                server_proof: proof.server_proof,
                session_key: None,
            };
        }

        let result = if self.account.banned {
            LoginResult::FailBanned
        } else if self.account.suspended {
            LoginResult::FailSuspended
        } else {
            LoginResult::Success
        };

        let session_key = match result {
            LoginResult::Success => Some(proof.session_key),
            _ => None,
        };

        ProofOutcome {
            result,
            server_proof: proof.server_proof,
            session_key,
        }
    }
}

/// Stateless entry point into the exchange; per-attempt state lives in the
/// [`LoginExchange`] it hands out.
pub struct Authenticator<S> {
    store: Arc<S>,
}

impl<S: CredentialStore> Authenticator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Looks up the credential record and allocates a fresh exchange with a
    /// new private ephemeral.
    pub async fn begin_exchange(&self, username: &str) -> BeginOutcome {
        let record = match self.store.lookup(username).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("unknown account {}", username);
                return BeginOutcome::AccountNotFound;
            }
            Err(e) => {
                warn!("credential lookup failed for {}: {}", username, e);
                return BeginOutcome::StoreError;
            }
        };

        let srp = SrpServer::new(record.verifier.clone(), record.salt);
        BeginOutcome::Challenge(LoginExchange { account: record, srp })
    }

    /// Records a successful login against the account.
    pub async fn record_login(&self, username: &str, ip: std::net::IpAddr) {
        if let Err(e) = self.store.record_last_login(username, ip).await {
            warn!("failed to record last login for {}: {}", username, e);
        }
    }
}
