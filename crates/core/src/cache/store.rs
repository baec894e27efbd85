//! The `CacheStore` capability.
//!
//! A store holds named partitions, each an insertion-ordered map from
//! [`RequestKey`] to [`CachedResponse`]. Individual key operations are atomic;
//! there are no multi-key transactions.

use crate::Error;
use crate::model::{CachedResponse, RequestKey};

/// Key-addressed persistent store over named partitions.
///
/// Writing to a partition that does not exist creates it. Overwriting a key
/// replaces the entry wholesale and moves it to the end of the insertion order.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Create the partition if it is absent. Returns `true` if it was created.
    async fn open(&self, partition: &str) -> Result<bool, Error>;

    /// Look up an entry.
    async fn match_entry(&self, partition: &str, key: &RequestKey) -> Result<Option<CachedResponse>, Error>;

    /// Insert or overwrite an entry.
    async fn put(&self, partition: &str, key: &RequestKey, response: CachedResponse) -> Result<(), Error>;

    /// Remove an entry. Returns `true` if it existed.
    async fn delete(&self, partition: &str, key: &RequestKey) -> Result<bool, Error>;

    /// Keys of a partition, oldest-inserted first. Empty for a missing partition.
    async fn keys(&self, partition: &str) -> Result<Vec<RequestKey>, Error>;

    /// Names of all existing partitions, in creation order.
    async fn partitions(&self) -> Result<Vec<String>, Error>;

    /// Drop a partition and all of its entries. Returns `true` if it existed.
    async fn delete_partition(&self, partition: &str) -> Result<bool, Error>;
}
