use std::collections::HashMap;

use tracing::warn;

use crate::diagnostics::{diag, DiagnosticSink};
use crate::error::DsResult;
use crate::key::Key;
use crate::traits::{Batch, Datastore};

/// A pending batch operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchOp {
    Put(Vec<u8>),
    Delete,
}

/// Accumulates the last operation per key and applies them on commit.
///
/// Operations are applied one at a time through the owning [`Datastore`],
/// in no particular order. The first failure stops the commit; operations
/// already applied are not rolled back. A batch is single-owner scratch
/// state and is consumed by [`commit`](Batch::commit).
pub struct ObjectBatch<'a> {
    store: &'a dyn Datastore,
    sink: &'a dyn DiagnosticSink,
    ops: HashMap<Key, BatchOp>,
}

impl<'a> ObjectBatch<'a> {
    pub fn new(store: &'a dyn Datastore, sink: &'a dyn DiagnosticSink) -> Self {
        Self {
            store,
            sink,
            ops: HashMap::new(),
        }
    }

    /// Number of keys with a pending operation.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The operation pending for `key`, if any.
    pub fn pending(&self, key: &Key) -> Option<&BatchOp> {
        self.ops.get(key)
    }
}

impl Batch for ObjectBatch<'_> {
    fn put(&mut self, key: Key, value: Vec<u8>) -> DsResult<()> {
        diag!(self.sink, "BatchPut --- key: {} --- bytes: {}", key, value.len());
        self.ops.insert(key, BatchOp::Put(value));
        Ok(())
    }

    fn delete(&mut self, key: Key) -> DsResult<()> {
        diag!(self.sink, "BatchDelete --- key: {}", key);
        self.ops.insert(key, BatchOp::Delete);
        Ok(())
    }

    fn commit(self: Box<Self>) -> DsResult<()> {
        let ObjectBatch { store, sink, ops } = *self;
        diag!(sink, "BatchCommit");
        let total = ops.len();
        for (applied, (key, op)) in ops.into_iter().enumerate() {
            let result = match &op {
                BatchOp::Put(value) => store.put(&key, value),
                BatchOp::Delete => store.delete(&key),
            };
            if let Err(e) = result {
                warn!(
                    key = %key,
                    applied,
                    skipped = total - applied - 1,
                    error = %e,
                    "batch commit aborted"
                );
                return Err(e);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ObjectBatch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBatch")
            .field("pending", &self.ops.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiscardSink;
    use crate::{DatastoreError, ObjectDatastore, Operation};
    use objds_store::{ClientOp, InMemoryObjectClient};
    use std::sync::Arc;

    fn store() -> (Arc<InMemoryObjectClient>, ObjectDatastore) {
        let client = Arc::new(InMemoryObjectClient::with_bucket("bkt"));
        let ds = ObjectDatastore::with_client(client.clone(), "bkt", Arc::new(DiscardSink));
        (client, ds)
    }

    #[test]
    fn last_write_wins_per_key() {
        let (client, ds) = store();
        let key = Key::new("/k1");
        let mut batch = ObjectBatch::new(&ds, &DiscardSink);
        batch.put(key.clone(), b"v1".to_vec()).unwrap();
        batch.delete(key.clone()).unwrap();
        batch.put(key.clone(), b"v2".to_vec()).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.pending(&key), Some(&BatchOp::Put(b"v2".to_vec())));

        Box::new(batch).commit().unwrap();
        assert_eq!(ds.get(&key).unwrap(), b"v2");
        assert_eq!(client.count_calls(ClientOp::Upload), 1);
        assert_eq!(client.count_calls(ClientOp::Delete), 0);
    }

    #[test]
    fn later_delete_replaces_put() {
        let (_client, ds) = store();
        let key = Key::new("/k");
        ds.put(&key, b"old").unwrap();
        let mut batch = ObjectBatch::new(&ds, &DiscardSink);
        batch.put(key.clone(), b"new".to_vec()).unwrap();
        batch.delete(key.clone()).unwrap();
        Box::new(batch).commit().unwrap();
        assert!(!ds.has(&key).unwrap());
    }

    #[test]
    fn nothing_applied_before_commit() {
        let (client, ds) = store();
        let mut batch = ObjectBatch::new(&ds, &DiscardSink);
        batch.put(Key::new("/a"), b"1".to_vec()).unwrap();
        batch.delete(Key::new("/b")).unwrap();
        assert!(client.calls().is_empty());
        drop(batch);
        assert!(client.calls().is_empty());
    }

    #[test]
    fn failed_commit_keeps_applied_ops_and_drops_the_rest() {
        let (client, ds) = store();
        let mut batch = ObjectBatch::new(&ds, &DiscardSink);
        for name in ["k1", "k2", "k3"] {
            batch.put(Key::new(name), name.as_bytes().to_vec()).unwrap();
        }
        // Whatever order the batch picks, its second upload fails.
        client.fail_on_call(ClientOp::Upload, 2);

        let err = Box::new(batch).commit().unwrap_err();
        assert!(matches!(err, DatastoreError::Backend { op: Operation::Put, .. }));

        let attempted: Vec<String> = client
            .calls()
            .into_iter()
            .filter(|c| c.op == ClientOp::Upload)
            .map(|c| c.key)
            .collect();
        assert_eq!(attempted.len(), 2);
        let (applied, failed) = (&attempted[0], &attempted[1]);
        let untouched = ["k1", "k2", "k3"]
            .into_iter()
            .find(|name| !attempted.iter().any(|k| k == name))
            .unwrap();

        assert!(ds.has(&Key::new(applied)).unwrap());
        assert_eq!(ds.get(&Key::new(applied)).unwrap(), applied.as_bytes());
        assert!(!ds.has(&Key::new(failed)).unwrap());
        assert!(!ds.has(&Key::new(untouched)).unwrap());
        assert_eq!(client.object_count("bkt"), 1);
    }

    #[test]
    fn delete_of_missing_key_commits() {
        let (_client, ds) = store();
        let mut batch = ObjectBatch::new(&ds, &DiscardSink);
        batch.delete(Key::new("/missing")).unwrap();
        Box::new(batch).commit().unwrap();
    }
}
