use crate::errors::StoreError;
use crate::store::KvStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// Expired entries are swept once the map reaches this size, and after that
// whenever it doubles since the last sweep.
const MIN_PURGE_LEN: usize = 64;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

struct Entries {
    map: HashMap<String, Entry>,
    purge_at: usize,
}

/// Process-local backend for development setups without a hosted database.
///
/// Counts every command it serves so rotation behaves as it would against a
/// real backend.
pub struct MemoryStore {
    name: String,
    entries: Mutex<Entries>,
    commands: AtomicU64,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryStore::with_commands_processed(name, 0)
    }

    /// A store that reports `commands` already served before its first use.
    pub fn with_commands_processed(name: impl Into<String>, commands: u64) -> Self {
        MemoryStore {
            name: name.into(),
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                purge_at: MIN_PURGE_LEN,
            }),
            commands: AtomicU64::new(commands),
        }
    }

    /// Number of stored keys, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn count(&self) -> u64 {
        self.commands.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.count();
        let mut entries = self.entries.lock();

        let expired = entries
            .map
            .get(key)
            .is_some_and(|entry| entry.is_expired(Instant::now()));
        if expired {
            entries.map.remove(key);
        }

        Ok(entries.map.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.count();
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| now + ttl),
            },
        );

        if entries.map.len() >= entries.purge_at {
            entries.map.retain(|_, entry| !entry.is_expired(now));
            entries.purge_at = (entries.map.len() * 2).max(MIN_PURGE_LEN);
        }
        Ok(())
    }

    async fn commands_processed(&self) -> Result<u64, StoreError> {
        Ok(self.count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set() {
        let store = MemoryStore::new("mem");
        assert_eq!(store.get("a").await.unwrap(), None);

        store.set("a", "1", None).await.unwrap();
        store.set("a", "2", None).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_expiry() {
        let store = MemoryStore::new("mem");
        store
            .set("short", "v", Some(Duration::from_millis(20)))
            .await
            .unwrap();
        store
            .set("long", "v", Some(Duration::from_secs(3600)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get("short").await.unwrap(), None);
        assert_eq!(store.get("long").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_expired_entries_are_purged_on_growth() {
        let store = MemoryStore::new("mem");
        store
            .set("stale", "v", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Never read again, so only a sweep can drop it
        for i in 1..MIN_PURGE_LEN {
            store.set(&format!("k{i}"), "v", None).await.unwrap();
        }
        assert_eq!(store.len(), MIN_PURGE_LEN - 1);
        assert_eq!(store.get("k1").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_command_count() {
        let store = MemoryStore::with_commands_processed("mem", 100);
        store.get("a").await.unwrap();
        assert_eq!(store.commands_processed().await.unwrap(), 102);
    }
}
