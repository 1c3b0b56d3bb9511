use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{self, Cursor, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::SystemTime;

use crate::error::{StoreError, StoreResult};
use crate::listing::paginate;
use crate::traits::{Download, ObjectClient, Upload};
use crate::types::{ListOptions, ObjectInfo, ObjectPage, SystemMetadata};

/// Client operations, as recorded in the call log and targeted by faults.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClientOp {
    Upload,
    Download,
    Stat,
    Delete,
    List,
}

/// One recorded client call. For listings `key` holds the prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientCall {
    pub op: ClientOp,
    pub key: String,
}

#[derive(Clone, Debug)]
struct StoredObject {
    data: Vec<u8>,
    created: SystemTime,
}

type Buckets = HashMap<String, BTreeMap<String, StoredObject>>;

/// In-memory, `BTreeMap`-based object client.
///
/// Intended for tests and embedding. Buckets live behind an `Arc<RwLock>`
/// so pending uploads can commit after the call that opened them returns.
/// Every call is appended to a call log, and faults can be injected per
/// operation and key.
pub struct InMemoryObjectClient {
    buckets: Arc<RwLock<Buckets>>,
    faults: Mutex<HashSet<(ClientOp, String)>>,
    nth_faults: Mutex<HashSet<(ClientOp, usize)>>,
    calls: Mutex<Vec<ClientCall>>,
    closed: AtomicBool,
}

impl InMemoryObjectClient {
    /// Create a client with no buckets.
    pub fn new() -> Self {
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            faults: Mutex::new(HashSet::new()),
            nth_faults: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Create a client with a single empty bucket.
    pub fn with_bucket(bucket: &str) -> Self {
        let client = Self::new();
        client
            .buckets
            .write()
            .expect("lock poisoned")
            .insert(bucket.to_string(), BTreeMap::new());
        client
    }

    /// Store an object directly, bypassing the upload path and call log.
    pub fn insert(&self, bucket: &str, key: &str, data: Vec<u8>) -> StoreResult<()> {
        let mut buckets = self.buckets.write().expect("lock poisoned");
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        objects.insert(
            key.to_string(),
            StoredObject {
                data,
                created: SystemTime::now(),
            },
        );
        Ok(())
    }

    /// Make every future `op` on `key` fail with a backend error.
    ///
    /// For [`ClientOp::List`] the key is matched against the listing prefix.
    pub fn fail_on(&self, op: ClientOp, key: &str) {
        self.faults
            .lock()
            .expect("lock poisoned")
            .insert((op, key.to_string()));
    }

    /// Make the `n`-th call of `op` (1-based, counted over the client's
    /// lifetime) fail with a backend error, whatever its key.
    pub fn fail_on_call(&self, op: ClientOp, n: usize) {
        self.nth_faults
            .lock()
            .expect("lock poisoned")
            .insert((op, n));
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        self.faults.lock().expect("lock poisoned").clear();
        self.nth_faults.lock().expect("lock poisoned").clear();
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<ClientCall> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    /// Number of calls made for `op`.
    pub fn count_calls(&self, op: ClientOp) -> usize {
        self.calls
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|c| c.op == op)
            .count()
    }

    /// Sorted keys currently stored in `bucket`.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .read()
            .expect("lock poisoned")
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of objects in `bucket`.
    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets
            .read()
            .expect("lock poisoned")
            .get(bucket)
            .map_or(0, BTreeMap::len)
    }

    /// Returns `true` once `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Record the call, then fail if the client is closed or a fault matches.
    fn enter(&self, op: ClientOp, key: &str) -> StoreResult<()> {
        let nth = {
            let mut calls = self.calls.lock().expect("lock poisoned");
            calls.push(ClientCall {
                op,
                key: key.to_string(),
            });
            calls.iter().filter(|c| c.op == op).count()
        };
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        let faulted = self
            .faults
            .lock()
            .expect("lock poisoned")
            .contains(&(op, key.to_string()))
            || self
                .nth_faults
                .lock()
                .expect("lock poisoned")
                .contains(&(op, nth));
        if faulted {
            return Err(StoreError::Backend(format!("injected fault: {op:?} {key}")));
        }
        Ok(())
    }

    fn with_object<T>(
        &self,
        bucket: &str,
        key: &str,
        f: impl FnOnce(&StoredObject) -> T,
    ) -> StoreResult<T> {
        let buckets = self.buckets.read().expect("lock poisoned");
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        objects
            .get(key)
            .map(f)
            .ok_or_else(|| StoreError::not_found(bucket, key))
    }
}

impl Default for InMemoryObjectClient {
    fn default() -> Self {
        Self::new()
    }
}

struct MemoryUpload {
    buckets: Arc<RwLock<Buckets>>,
    bucket: String,
    key: String,
    buf: Vec<u8>,
}

impl Write for MemoryUpload {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Upload for MemoryUpload {
    fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        let mut buckets = this.buckets.write().expect("lock poisoned");
        let objects = buckets
            .get_mut(&this.bucket)
            .ok_or_else(|| StoreError::BucketNotFound(this.bucket.clone()))?;
        objects.insert(
            this.key,
            StoredObject {
                data: this.buf,
                created: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn abort(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

impl ObjectClient for InMemoryObjectClient {
    fn upload_object(&self, bucket: &str, key: &str) -> StoreResult<Box<dyn Upload>> {
        self.enter(ClientOp::Upload, key)?;
        if !self.buckets.read().expect("lock poisoned").contains_key(bucket) {
            return Err(StoreError::BucketNotFound(bucket.to_string()));
        }
        Ok(Box::new(MemoryUpload {
            buckets: Arc::clone(&self.buckets),
            bucket: bucket.to_string(),
            key: key.to_string(),
            buf: Vec::new(),
        }))
    }

    fn download_object(&self, bucket: &str, key: &str) -> StoreResult<Download> {
        self.enter(ClientOp::Download, key)?;
        let data = self.with_object(bucket, key, |obj| obj.data.clone())?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn stat_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectInfo> {
        self.enter(ClientOp::Stat, key)?;
        self.with_object(bucket, key, |obj| {
            ObjectInfo::object(
                key,
                SystemMetadata {
                    created: Some(obj.created),
                    content_length: obj.data.len() as u64,
                },
            )
        })
    }

    fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.enter(ClientOp::Delete, key)?;
        let mut buckets = self.buckets.write().expect("lock poisoned");
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(bucket, key))
    }

    fn list_objects_page(
        &self,
        bucket: &str,
        options: &ListOptions,
        cursor: Option<&str>,
    ) -> StoreResult<ObjectPage> {
        self.enter(ClientOp::List, &options.prefix)?;
        let buckets = self.buckets.read().expect("lock poisoned");
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        let entries = objects
            .range(options.prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(options.prefix.as_str()))
            .map(|(key, obj)| {
                (
                    key.as_str(),
                    SystemMetadata {
                        created: Some(obj.created),
                        content_length: obj.data.len() as u64,
                    },
                )
            });
        Ok(paginate(entries, options, cursor))
    }

    fn ensure_bucket(&self, bucket: &str) -> StoreResult<()> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        self.buckets
            .write()
            .expect("lock poisoned")
            .entry(bucket.to_string())
            .or_default();
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryObjectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let buckets = self.buckets.read().expect("lock poisoned").len();
        f.debug_struct("InMemoryObjectClient")
            .field("bucket_count", &buckets)
            .field("closed", &self.is_closed())
            .finish()
    }
}
