use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::storage::{keys, load_json, save_json, KeyValueStore};

use super::AuthError;

/// A registered user. The secret is the user's catalog API key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(alias = "id")]
    pub identity: String,
    #[serde(alias = "password")]
    pub secret: String,
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Local registry of users, persisted as one collection under `users`.
///
/// No network access: checking a key against the catalog service is the
/// session layer's job.
#[derive(Clone)]
pub struct CredentialStore {
    kv: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    fn load_users(&self) -> Result<Vec<UserRecord>> {
        Ok(load_json(self.kv.as_ref(), keys::USERS)?.unwrap_or_default())
    }

    /// Add a user. Fails without writing if the identity is taken.
    pub fn register(&self, identity: &str, secret: &str) -> Result<(), AuthError> {
        let mut users = self.load_users()?;
        if users.iter().any(|u| u.identity == identity) {
            return Err(AuthError::DuplicateIdentity(identity.to_string()));
        }

        users.push(UserRecord {
            identity: identity.to_string(),
            secret: secret.to_string(),
        });
        save_json(self.kv.as_ref(), keys::USERS, &users)?;

        debug!(identity = %identity, total = users.len(), "User stored");
        Ok(())
    }

    /// Exact match on both identity and secret.
    pub fn find_match(&self, identity: &str, secret: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .load_users()?
            .into_iter()
            .find(|u| u.identity == identity && u.secret == secret))
    }

    pub fn exists(&self, identity: &str) -> Result<bool> {
        Ok(self.load_users()?.iter().any(|u| u.identity == identity))
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.load_users()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn store() -> (Arc<MemoryStore>, CredentialStore) {
        let kv = Arc::new(MemoryStore::new());
        (kv.clone(), CredentialStore::new(kv))
    }

    #[test]
    fn test_register_then_find() {
        let (_, credentials) = store();
        credentials.register("a@x.com", "key-a").unwrap();

        let found = credentials.find_match("a@x.com", "key-a").unwrap();
        assert_eq!(found.map(|u| u.identity).as_deref(), Some("a@x.com"));
        assert!(credentials.find_match("a@x.com", "key-b").unwrap().is_none());
        assert!(credentials.find_match("b@x.com", "key-a").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_identity_rejected_regardless_of_secret() {
        let (kv, credentials) = store();
        credentials.register("a@x.com", "key-a").unwrap();
        let before = kv.get(keys::USERS).unwrap();

        for secret in ["key-a", "key-b", ""] {
            let err = credentials.register("a@x.com", secret).unwrap_err();
            assert!(matches!(err, AuthError::DuplicateIdentity(ref id) if id == "a@x.com"));
        }

        // Nothing written by the failed attempts
        assert_eq!(kv.get(keys::USERS).unwrap(), before);
        assert_eq!(credentials.count().unwrap(), 1);
    }

    #[test]
    fn test_exists_on_empty_store() {
        let (_, credentials) = store();
        assert!(!credentials.exists("a@x.com").unwrap());
    }

    #[test]
    fn test_reads_legacy_field_names() {
        let (kv, credentials) = store();
        kv.set(keys::USERS, r#"[{"id": "old@x.com", "password": "legacy-key"}]"#)
            .unwrap();

        assert!(credentials.exists("old@x.com").unwrap());
        assert!(credentials.find_match("old@x.com", "legacy-key").unwrap().is_some());
    }

    #[test]
    fn test_corrupt_collection_is_an_error_not_empty() {
        let (kv, credentials) = store();
        kv.set(keys::USERS, "{oops").unwrap();

        assert!(credentials.exists("a@x.com").is_err());
        assert!(matches!(
            credentials.register("a@x.com", "k"),
            Err(AuthError::Storage(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let record = UserRecord {
            identity: "a@x.com".into(),
            secret: "super-secret".into(),
        };
        let debug = format!("{:?}", record);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("a@x.com"));
    }
}
