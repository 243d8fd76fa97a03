use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use coursedesk_storage::{KeyValueStore, KvError};

/// A stored value with its absolute expiry.
#[derive(Clone, Debug)]
struct StoredValue {
    data: Vec<u8>,
    expires_at: Instant,
}

impl StoredValue {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Process-local key-value store backed by `DashMap`.
///
/// Mirrors the Redis semantics the server relies on: values expire lazily on
/// access, counters are stored as decimal strings, and `increment` is atomic
/// because it runs under the shard lock of its key.
///
/// The connectivity flag can be flipped to exercise the "store unavailable"
/// paths without a real network dependency.
#[derive(Debug)]
pub struct InMemoryKeyValueStore {
    entries: DashMap<String, StoredValue>,
    connected: AtomicBool,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            connected: AtomicBool::new(true),
        }
    }

    /// Marks the store as (dis)connected. While disconnected every command fails.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops expired entries. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, value| !value.is_expired());
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, "expired key-value entries purged");
        }
        removed
    }

    fn ensure_connected(&self) -> Result<(), KvError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(KvError::unavailable("in-memory store marked disconnected"))
        }
    }
}

impl Default for InMemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        self.ensure_connected()?;
        if let Some(value) = self.entries.get(key) {
            if !value.is_expired() {
                return Ok(Some(value.data.clone()));
            }
            drop(value);
            self.entries.remove_if(key, |_, v| v.is_expired());
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), KvError> {
        self.ensure_connected()?;
        self.entries
            .insert(key.to_string(), StoredValue::new(value.to_vec(), ttl));
        Ok(())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<i64, KvError> {
        self.ensure_connected()?;
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let current = if occupied.get().is_expired() {
                    0
                } else {
                    std::str::from_utf8(&occupied.get().data)
                        .ok()
                        .and_then(|s| s.parse::<i64>().ok())
                        .ok_or_else(|| KvError::wrong_type(key))?
                };
                let next = current
                    .checked_add(1)
                    .ok_or_else(|| KvError::command("increment would overflow"))?;
                occupied.insert(StoredValue::new(next.to_string().into_bytes(), ttl));
                Ok(next)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue::new(b"1".to_vec(), ttl));
                Ok(1)
            }
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.ensure_connected()?;
        self.entries.remove(key);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
