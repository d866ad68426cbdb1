use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::storage::{keys, load_json, save_json, KeyValueStore};

use super::WishlistEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WishlistChange {
    Added,
    Removed,
}

/// Persisted, observable wishlist.
///
/// Hydrated once when opened. Each mutation writes the whole collection
/// before it becomes visible to readers; if the write fails the
/// collection is left as it was.
pub struct WishlistStore {
    kv: Arc<dyn KeyValueStore>,
    tx: watch::Sender<Vec<WishlistEntry>>,
}

impl WishlistStore {
    pub fn open(kv: Arc<dyn KeyValueStore>) -> Result<Self> {
        let entries = match load_json::<Vec<WishlistEntry>>(kv.as_ref(), keys::WISHLIST) {
            Ok(entries) => entries.unwrap_or_default(),
            Err(e) => {
                // Rebuildable by the user, so start over rather than refuse to open
                warn!(error = %e, "Stored wishlist unreadable, starting empty");
                Vec::new()
            }
        };
        debug!(count = entries.len(), "Wishlist loaded");

        let (tx, _rx) = watch::channel(entries);
        Ok(Self { kv, tx })
    }

    /// Remove the item if saved, otherwise save a copy of it.
    pub fn toggle(&self, item: impl Into<WishlistEntry>) -> Result<WishlistChange> {
        let item = item.into();
        let mut outcome = Ok(WishlistChange::Added);

        self.tx.send_if_modified(|entries| {
            let mut next = entries.clone();
            let change = match next.iter().position(|e| e.id == item.id) {
                Some(index) => {
                    next.remove(index);
                    WishlistChange::Removed
                }
                None => {
                    next.push(item.clone());
                    WishlistChange::Added
                }
            };

            match save_json(self.kv.as_ref(), keys::WISHLIST, &next) {
                Ok(()) => {
                    *entries = next;
                    outcome = Ok(change);
                    true
                }
                Err(e) => {
                    outcome = Err(e);
                    false
                }
            }
        });

        if let Ok(change) = &outcome {
            debug!(movie_id = item.id, ?change, "Wishlist toggled");
        }
        outcome
    }

    pub fn is_member(&self, id: i64) -> bool {
        self.tx.borrow().iter().any(|e| e.id == id)
    }

    /// Saved entries in the order they were added.
    pub fn entries(&self) -> Vec<WishlistEntry> {
        self.tx.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    /// Read-only feed of the collection, updated after every successful change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<WishlistEntry>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use crate::models::Movie;
    use crate::storage::MemoryStore;

    fn movie(id: i64, title: &str) -> Movie {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "title": title,
            "poster_path": format!("/{}.jpg", id),
            "release_date": "2020-01-01",
            "vote_average": 7.5
        }))
        .unwrap()
    }

    fn ids(store: &WishlistStore) -> BTreeSet<i64> {
        store.entries().iter().map(|e| e.id).collect()
    }

    /// Store that refuses every write.
    struct ReadOnly(MemoryStore);

    impl KeyValueStore for ReadOnly {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.0.get(key)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            anyhow::bail!("read-only")
        }

        fn remove(&self, _key: &str) -> Result<()> {
            anyhow::bail!("read-only")
        }
    }

    #[test]
    fn test_toggle_twice_restores_state() {
        let store = WishlistStore::open(Arc::new(MemoryStore::new())).unwrap();
        store.toggle(&movie(1, "One")).unwrap();
        let before = ids(&store);

        assert_eq!(store.toggle(&movie(2, "Two")).unwrap(), WishlistChange::Added);
        assert!(store.is_member(2));
        assert_eq!(store.toggle(&movie(2, "Two")).unwrap(), WishlistChange::Removed);
        assert!(!store.is_member(2));

        assert_eq!(ids(&store), before);
    }

    #[test]
    fn test_ids_stay_unique_and_ordered() {
        let store = WishlistStore::open(Arc::new(MemoryStore::new())).unwrap();
        for id in [3, 1, 2] {
            store.toggle(&movie(id, "x")).unwrap();
        }
        store.toggle(&movie(1, "x")).unwrap();
        store.toggle(&movie(1, "x")).unwrap();

        let order: Vec<i64> = store.entries().iter().map(|e| e.id).collect();
        assert_eq!(order, vec![3, 2, 1]);
    }

    #[test]
    fn test_survives_reload() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let store = WishlistStore::open(kv.clone()).unwrap();
        for id in [10, 20, 30] {
            store.toggle(&movie(id, "saved")).unwrap();
        }
        drop(store);

        let reloaded = WishlistStore::open(kv).unwrap();
        assert_eq!(reloaded.len(), 3);
        for id in [10, 20, 30] {
            assert!(reloaded.is_member(id));
        }
        assert_eq!(reloaded.entries()[0].poster_path.as_deref(), Some("/10.jpg"));
    }

    #[test]
    fn test_missing_and_corrupt_storage_open_empty() {
        let store = WishlistStore::open(Arc::new(MemoryStore::new())).unwrap();
        assert!(store.is_empty());

        let kv = Arc::new(MemoryStore::new());
        kv.set(keys::WISHLIST, "[{broken").unwrap();
        let store = WishlistStore::open(kv).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_failed_write_changes_nothing() {
        let inner = MemoryStore::new();
        inner
            .set(keys::WISHLIST, r#"[{"id": 1, "title": "Kept"}]"#)
            .unwrap();
        let store = WishlistStore::open(Arc::new(ReadOnly(inner))).unwrap();
        let feed = store.subscribe();

        assert!(store.toggle(&movie(2, "New")).is_err());
        assert!(store.toggle(&movie(1, "Kept")).is_err());

        assert_eq!(ids(&store), BTreeSet::from([1]));
        assert!(!feed.has_changed().unwrap());
    }

    #[test]
    fn test_subscribers_see_changes() {
        let store = WishlistStore::open(Arc::new(MemoryStore::new())).unwrap();
        let mut feed = store.subscribe();

        store.toggle(&movie(5, "Five")).unwrap();
        assert!(feed.has_changed().unwrap());
        assert_eq!(feed.borrow_and_update().len(), 1);
    }
}
