//! Origin-scoped key/value persistence.
//!
//! This module provides the `KeyValueStore` trait, the single durable
//! primitive every other component persists through, plus two backends:
//!
//! - `MemoryStore`: process-local map, used by tests and ephemeral sessions
//! - `FileStore`: one JSON document on disk, rewritten atomically
//!
//! Each component owns a disjoint set of keys (see the `keys` module).

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};

/// Persisted key names.
///
/// These match the names the browser client used in `localStorage`, so an
/// exported origin dump can be dropped into a `FileStore` unchanged.
pub mod keys {
    /// Registered users, a JSON array of `{identity, secret}`.
    pub const USERS: &str = "users";
    /// Secret of the active session.
    pub const ACTIVE_TOKEN: &str = "TMDb-Key";
    /// Identity of the active session.
    pub const ACTIVE_IDENTITY: &str = "loginUser";
    /// Last identity logged in with "remember me".
    pub const REMEMBERED_IDENTITY: &str = "rememberedId";
    /// Saved catalog items, a JSON array of wishlist entries.
    pub const WISHLIST: &str = "movieWishlist";
}

/// String-valued durable store.
///
/// Mirrors the browser storage contract: values are opaque strings, a
/// missing key reads as `None`, and removing a missing key is not an error.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// Read a JSON-encoded value, treating an absent key as `None`.
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(raw) => {
            let value = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse stored value: {}", key))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Serialize a value to JSON and write it under `key`.
pub fn save_json<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let encoded = serde_json::to_string(value)
        .with_context(|| format!("Failed to serialize value for: {}", key))?;
    store.set(key, &encoded)
}
