//! In-memory `CacheStore`.
//!
//! Backs tests and the server when no database path is configured.
//! Uses a HashMap per partition with tokio RwLock for concurrent access;
//! insertion order is tracked with a per-partition sequence number.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::store::CacheStore;
use crate::Error;
use crate::model::{CachedResponse, RequestKey};

struct Slot {
    seq: u64,
    response: CachedResponse,
}

struct Partition {
    created: u64,
    next_seq: u64,
    entries: HashMap<RequestKey, Slot>,
}

#[derive(Default)]
struct Partitions {
    next_created: u64,
    by_name: HashMap<String, Partition>,
}

impl Partitions {
    fn get_or_create(&mut self, name: &str) -> (&mut Partition, bool) {
        let order = self.next_created;
        let mut created = false;
        let partition = self.by_name.entry(name.to_string()).or_insert_with(|| {
            created = true;
            Partition { created: order, next_seq: 0, entries: HashMap::new() }
        });
        if created {
            self.next_created += 1;
        }
        (partition, created)
    }
}

/// Process-local store. Clones share the same partitions.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Partitions>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in a partition (0 when missing).
    pub async fn len(&self, partition: &str) -> usize {
        self.inner
            .read()
            .await
            .by_name
            .get(partition)
            .map(|p| p.entries.len())
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryStore {
    async fn open(&self, partition: &str) -> Result<bool, Error> {
        let mut inner = self.inner.write().await;
        Ok(inner.get_or_create(partition).1)
    }

    async fn match_entry(&self, partition: &str, key: &RequestKey) -> Result<Option<CachedResponse>, Error> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_name
            .get(partition)
            .and_then(|p| p.entries.get(key))
            .map(|slot| slot.response.clone()))
    }

    async fn put(&self, partition: &str, key: &RequestKey, response: CachedResponse) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        let (partition, _) = inner.get_or_create(partition);
        let seq = partition.next_seq;
        partition.next_seq += 1;
        partition.entries.insert(key.clone(), Slot { seq, response });
        Ok(())
    }

    async fn delete(&self, partition: &str, key: &RequestKey) -> Result<bool, Error> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .by_name
            .get_mut(partition)
            .map(|p| p.entries.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn keys(&self, partition: &str) -> Result<Vec<RequestKey>, Error> {
        let inner = self.inner.read().await;
        let Some(partition) = inner.by_name.get(partition) else {
            return Ok(Vec::new());
        };
        let mut keyed: Vec<(u64, &RequestKey)> = partition.entries.iter().map(|(k, s)| (s.seq, k)).collect();
        keyed.sort_unstable_by_key(|(seq, _)| *seq);
        Ok(keyed.into_iter().map(|(_, k)| k.clone()).collect())
    }

    async fn partitions(&self) -> Result<Vec<String>, Error> {
        let inner = self.inner.read().await;
        let mut names: Vec<(u64, &String)> = inner.by_name.iter().map(|(n, p)| (p.created, n)).collect();
        names.sort_unstable_by_key(|(created, _)| *created);
        Ok(names.into_iter().map(|(_, n)| n.clone()).collect())
    }

    async fn delete_partition(&self, partition: &str) -> Result<bool, Error> {
        let mut inner = self.inner.write().await;
        Ok(inner.by_name.remove(partition).is_some())
    }
}
