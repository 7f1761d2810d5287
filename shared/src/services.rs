//! Collaborator boundaries between the tiers and their backing services.
//!
//! The login and gateway tiers never talk to storage directly; they are
//! handed these traits at construction so tests can substitute fakes. The
//! in-memory implementations back the binaries and the integration tests.

use crate::protocol::Character;
use crate::srp::{generate_salt, generate_verifier};
use crate::{SessionKey, SALT_LENGTH};
use num_bigint::BigUint;
use std::collections::HashMap;
use std::future::Future;
use std::net::IpAddr;
use thiserror::Error;
use tokio::sync::RwLock;

/// One account's credential record: salt and verifier, never the password.
#[derive(Debug, Clone)]
pub struct AccountRecord {
    /// Case-preserving form as registered.
    pub username: String,
    pub salt: [u8; SALT_LENGTH],
    pub verifier: BigUint,
    pub banned: bool,
    pub suspended: bool,
}

#[derive(Debug, Error)]
pub enum CredentialStoreError {
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

/// Read-mostly credential lookup, keyed case-insensitively by username.
pub trait CredentialStore: Send + Sync + 'static {
    fn lookup(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<AccountRecord>, CredentialStoreError>> + Send;

    fn record_last_login(
        &self,
        username: &str,
        ip: IpAddr,
    ) -> impl Future<Output = Result<(), CredentialStoreError>> + Send;
}

/// In-memory credential store used by the binaries and tests.
#[derive(Default)]
pub struct MemoryCredentialStore {
    accounts: RwLock<HashMap<String, AccountRecord>>,
    last_logins: RwLock<HashMap<String, IpAddr>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account, deriving salt and verifier from the password.
    pub async fn register(&self, username: &str, password: &str) {
        let salt = generate_salt();
        let record = AccountRecord {
            username: username.to_string(),
            verifier: generate_verifier(username, password, &salt),
            salt,
            banned: false,
            suspended: false,
        };
        self.accounts
            .write()
            .await
            .insert(crate::normalize_username(username), record);
    }

    pub async fn set_banned(&self, username: &str, banned: bool) {
        if let Some(record) = self
            .accounts
            .write()
            .await
            .get_mut(&crate::normalize_username(username))
        {
            record.banned = banned;
        }
    }

    pub async fn set_suspended(&self, username: &str, suspended: bool) {
        if let Some(record) = self
            .accounts
            .write()
            .await
            .get_mut(&crate::normalize_username(username))
        {
            record.suspended = suspended;
        }
    }

    pub async fn last_login(&self, username: &str) -> Option<IpAddr> {
        self.last_logins
            .read()
            .await
            .get(&crate::normalize_username(username))
            .copied()
    }
}

impl CredentialStore for MemoryCredentialStore {
    async fn lookup(&self, username: &str) -> Result<Option<AccountRecord>, CredentialStoreError> {
        Ok(self
            .accounts
            .read()
            .await
            .get(&crate::normalize_username(username))
            .cloned())
    }

    async fn record_last_login(
        &self,
        username: &str,
        ip: IpAddr,
    ) -> Result<(), CredentialStoreError> {
        self.last_logins
            .write()
            .await
            .insert(crate::normalize_username(username), ip);
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("account already has an active session")]
    AlreadyLoggedIn,
    #[error("no session key for account")]
    NotFound,
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Lookup service for session keys established by the login tier.
///
/// The gateway only ever borrows a key for one verification; the directory
/// owns it and invalidates it on logout or expiry.
pub trait SessionDirectory: Send + Sync + 'static {
    fn publish(
        &self,
        username: &str,
        key: SessionKey,
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send;

    fn locate(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<SessionKey, DirectoryError>> + Send;

    fn remove(&self, username: &str) -> impl Future<Output = ()> + Send;
}

struct DirectoryEntry {
    key: SessionKey,
    claimed: bool,
}

/// In-memory session key directory.
///
/// A key can be located once per publication; a second locate while the
/// first session is live reports `AlreadyLoggedIn`.
#[derive(Default)]
pub struct MemoryDirectory {
    sessions: RwLock<HashMap<String, DirectoryEntry>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionDirectory for MemoryDirectory {
    async fn publish(&self, username: &str, key: SessionKey) -> Result<(), DirectoryError> {
        self.sessions.write().await.insert(
            crate::normalize_username(username),
            DirectoryEntry {
                key,
                claimed: false,
            },
        );
        Ok(())
    }

    async fn locate(&self, username: &str) -> Result<SessionKey, DirectoryError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&crate::normalize_username(username))
            .ok_or(DirectoryError::NotFound)?;

        if entry.claimed {
            return Err(DirectoryError::AlreadyLoggedIn);
        }

        entry.claimed = true;
        Ok(entry.key.clone())
    }

    async fn remove(&self, username: &str) {
        self.sessions
            .write()
            .await
            .remove(&crate::normalize_username(username));
    }
}

#[derive(Debug, Error)]
pub enum CharacterServiceError {
    #[error("character service unavailable: {0}")]
    Unavailable(String),
    #[error("no such character")]
    NotFound,
}

/// Character roster operations dispatched from the character-select screen.
pub trait CharacterService: Send + Sync + 'static {
    fn list(
        &self,
        account: &str,
    ) -> impl Future<Output = Result<Vec<Character>, CharacterServiceError>> + Send;

    fn create(
        &self,
        account: &str,
        name: &str,
    ) -> impl Future<Output = Result<Character, CharacterServiceError>> + Send;

    fn delete(
        &self,
        account: &str,
        id: u64,
    ) -> impl Future<Output = Result<(), CharacterServiceError>> + Send;
}

/// In-memory character roster.
#[derive(Default)]
pub struct MemoryCharacterService {
    rosters: RwLock<HashMap<String, Vec<Character>>>,
    next_id: RwLock<u64>,
}

impl MemoryCharacterService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CharacterService for MemoryCharacterService {
    async fn list(&self, account: &str) -> Result<Vec<Character>, CharacterServiceError> {
        Ok(self
            .rosters
            .read()
            .await
            .get(&crate::normalize_username(account))
            .cloned()
            .unwrap_or_default())
    }

    async fn create(&self, account: &str, name: &str) -> Result<Character, CharacterServiceError> {
        let id = {
            let mut next = self.next_id.write().await;
            *next += 1;
            *next
        };

        let character = Character {
            id,
            name: name.to_string(),
            level: 1,
        };

        self.rosters
            .write()
            .await
            .entry(crate::normalize_username(account))
            .or_default()
            .push(character.clone());

        Ok(character)
    }

    async fn delete(&self, account: &str, id: u64) -> Result<(), CharacterServiceError> {
        let mut rosters = self.rosters.write().await;
        let roster = rosters
            .get_mut(&crate::normalize_username(account))
            .ok_or(CharacterServiceError::NotFound)?;

        let before = roster.len();
        roster.retain(|c| c.id != id);

        if roster.len() == before {
            return Err(CharacterServiceError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SESSION_KEY_LENGTH;

    fn key(fill: u8) -> SessionKey {
        SessionKey([fill; SESSION_KEY_LENGTH])
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let store = MemoryCredentialStore::new();
        store.register("MixedCase", "secret").await;

        let record = store.lookup("MIXEDCASE").await.unwrap().unwrap();
        assert_eq!(record.username, "MixedCase");

        assert!(store.lookup("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn last_login_is_recorded() {
        let store = MemoryCredentialStore::new();
        store.register("alice", "secret").await;

        let ip: IpAddr = "10.0.0.7".parse().unwrap();
        store.record_last_login("ALICE", ip).await.unwrap();

        assert_eq!(store.last_login("alice").await, Some(ip));
    }

    #[tokio::test]
    async fn directory_locate_consumes_the_session() {
        let directory = MemoryDirectory::new();
        directory.publish("alice", key(1)).await.unwrap();

        assert_eq!(directory.locate("ALICE").await.unwrap(), key(1));
        assert_eq!(
            directory.locate("alice").await,
            Err(DirectoryError::AlreadyLoggedIn)
        );

        directory.remove("alice").await;
        assert_eq!(directory.locate("alice").await, Err(DirectoryError::NotFound));
    }

    #[tokio::test]
    async fn directory_unknown_account_not_found() {
        let directory = MemoryDirectory::new();
        assert_eq!(
            directory.locate("nobody").await,
            Err(DirectoryError::NotFound)
        );
    }

    #[tokio::test]
    async fn republish_resets_the_claim() {
        let directory = MemoryDirectory::new();
        directory.publish("alice", key(1)).await.unwrap();
        directory.locate("alice").await.unwrap();

        directory.publish("alice", key(2)).await.unwrap();
        assert_eq!(directory.locate("alice").await.unwrap(), key(2));
    }

    #[tokio::test]
    async fn character_roster_lifecycle() {
        let service = MemoryCharacterService::new();

        let created = service.create("alice", "Thrall").await.unwrap();
        assert_eq!(created.level, 1);

        let roster = service.list("ALICE").await.unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].name, "Thrall");

        service.delete("alice", created.id).await.unwrap();
        assert!(service.list("alice").await.unwrap().is_empty());

        assert!(matches!(
            service.delete("alice", 999).await,
            Err(CharacterServiceError::NotFound)
        ));
    }
}
