//! # Credential Store
//!
//! The Basic verifier only needs one capability from wherever accounts live:
//! "is this the right password for this user". [`CredentialStore`] is that
//! seam. The in-memory implementation backs the bundled server and the tests;
//! a database-backed store plugs in the same way.

use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::core::config::UserEntry;
use crate::core::error::{GateError, GateResult};

/// Password check capability consumed by the Basic verifier
///
/// Implementations receive attacker-controlled input and are responsible
/// for their own secure comparison and any I/O timeouts.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn check_password(&self, username: &str, password: &str) -> bool;
}

type PasswordDigest = [u8; 32];

/// Accounts held in memory as SHA-256 password digests
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    users: DashMap<String, PasswordDigest>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from configured user entries
    pub fn from_entries(entries: &[UserEntry]) -> GateResult<Self> {
        let store = Self::new();
        for entry in entries {
            let bytes = hex::decode(&entry.password_sha256).map_err(|e| {
                GateError::config(format!("Invalid password digest for {}: {}", entry.username, e))
            })?;
            let digest: PasswordDigest = bytes.try_into().map_err(|_| {
                GateError::config(format!("Password digest for {} is not 32 bytes", entry.username))
            })?;
            store.users.insert(entry.username.clone(), digest);
        }
        Ok(store)
    }

    /// Add or replace a user with a plaintext password
    pub fn insert_user(&self, username: impl Into<String>, password: &str) {
        self.users.insert(username.into(), digest(password));
    }

    pub fn remove_user(&self, username: &str) -> bool {
        self.users.remove(username).is_some()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

fn digest(password: &str) -> PasswordDigest {
    Sha256::digest(password.as_bytes()).into()
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn check_password(&self, username: &str, password: &str) -> bool {
        let candidate = digest(password);
        // Unknown users still pay for a comparison.
        let stored = self.users.get(username).map(|entry| *entry.value());
        let known = stored.is_some();
        let expected = stored.unwrap_or([0u8; 32]);

        let matches: bool = expected[..].ct_eq(&candidate[..]).into();
        if !known {
            debug!(username, "credential check for unknown user");
        }
        known && matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_check_password() {
        let store = InMemoryCredentialStore::new();
        store.insert_user("alice", "wonderland");

        assert!(store.check_password("alice", "wonderland").await);
        assert!(!store.check_password("alice", "Wonderland").await);
        assert!(!store.check_password("bob", "wonderland").await);
    }

    #[tokio::test]
    async fn test_from_entries() {
        let entries = vec![UserEntry {
            username: "alice".to_string(),
            password_sha256: hex::encode(Sha256::digest(b"password")),
        }];
        let store = InMemoryCredentialStore::from_entries(&entries).unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.check_password("alice", "password").await);
    }

    #[test]
    fn test_from_entries_rejects_bad_digest() {
        let entries = vec![UserEntry {
            username: "alice".to_string(),
            password_sha256: "zz".repeat(32),
        }];
        assert!(InMemoryCredentialStore::from_entries(&entries).is_err());
    }

    #[tokio::test]
    async fn test_remove_user() {
        let store = InMemoryCredentialStore::new();
        store.insert_user("alice", "pw");
        assert!(store.remove_user("alice"));
        assert!(!store.check_password("alice", "pw").await);
        assert!(store.is_empty());
    }
}
