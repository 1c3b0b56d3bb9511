//! The datastore contract consumed by host systems.
//!
//! Hosts depend on these traits rather than on
//! [`ObjectDatastore`](crate::ObjectDatastore), so any backend satisfying
//! them can be swapped in.

use crate::error::DsResult;
use crate::key::Key;
use crate::query::{Query, Results};

/// A hierarchical key-value store.
///
/// Implementations must be thread-safe (`Send + Sync`). No ordering is
/// guaranteed between concurrent calls on the same key.
pub trait Datastore: Send + Sync {
    /// Store `value` under `key`, replacing any existing value.
    fn put(&self, key: &Key, value: &[u8]) -> DsResult<()>;

    /// Read the value stored under `key`.
    ///
    /// Returns `Err(DatastoreError::NotFound)` if nothing is stored there.
    fn get(&self, key: &Key) -> DsResult<Vec<u8>>;

    /// Returns `Ok(false)` if nothing is stored under `key`.
    fn has(&self, key: &Key) -> DsResult<bool>;

    /// Size in bytes of the value under `key`.
    ///
    /// Unlike [`has`](Datastore::has), a missing key is an error:
    /// `Err(DatastoreError::NotFound)`.
    fn get_size(&self, key: &Key) -> DsResult<u64>;

    /// Remove the value under `key`. Removing a missing key succeeds.
    fn delete(&self, key: &Key) -> DsResult<()>;

    /// Make writes under `prefix` durable.
    fn sync(&self, prefix: &Key) -> DsResult<()>;

    /// Start a query. Invalid descriptors fail here, before any I/O.
    fn query(&self, query: Query) -> DsResult<Results<'_>>;
}

/// A datastore that can group mutations into batches.
pub trait Batching: Datastore {
    fn batch(&self) -> DsResult<Box<dyn Batch + '_>>;
}

/// Pending mutations applied together on [`commit`](Batch::commit).
///
/// Only the last operation recorded for a key is applied. Commit is not
/// atomic across keys: on failure, operations already applied stay applied
/// and the rest are dropped.
pub trait Batch {
    fn put(&mut self, key: Key, value: Vec<u8>) -> DsResult<()>;

    fn delete(&mut self, key: Key) -> DsResult<()>;

    fn commit(self: Box<Self>) -> DsResult<()>;
}
