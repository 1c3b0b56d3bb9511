use std::io::{Read, Write};
use std::sync::Arc;

use objds_store::{AccessGrant, Connector, ObjectClient, StoreError};
use tracing::info;

use crate::batch::ObjectBatch;
use crate::config::DatastoreConfig;
use crate::diagnostics::{diag, DiagnosticSink, DiscardSink, FileSink};
use crate::error::{DatastoreError, DsResult, Operation};
use crate::key::{to_storage_key, Key};
use crate::query::{self, Query, Results};
use crate::traits::{Batch, Batching, Datastore};
use crate::translate;

/// Datastore backed by one bucket of an object store.
///
/// Every operation is a blocking call through the shared [`ObjectClient`];
/// nothing is cached or buffered locally.
pub struct ObjectDatastore {
    client: Arc<dyn ObjectClient>,
    bucket: String,
    sink: Arc<dyn DiagnosticSink>,
}

impl ObjectDatastore {
    /// Open a datastore from configuration.
    ///
    /// Validates the configuration, opens the diagnostic log file if one is
    /// set, parses the access grant and opens the project, failing with the
    /// matching startup error at the first step that goes wrong.
    pub fn open(config: DatastoreConfig, connector: &dyn Connector) -> DsResult<Self> {
        config.validate()?;

        let sink: Arc<dyn DiagnosticSink> = match &config.log_file {
            Some(path) => Arc::new(FileSink::open(path).map_err(|source| {
                DatastoreError::LogFile {
                    path: path.clone(),
                    source,
                }
            })?),
            None => Arc::new(DiscardSink),
        };
        diag!(sink, "Open --- bucket: {}", config.bucket);

        let access =
            AccessGrant::parse(&config.access_grant).map_err(DatastoreError::ParseAccess)?;
        let client = connector
            .open_project(&access)
            .map_err(DatastoreError::OpenProject)?;

        info!(bucket = %config.bucket, scheme = access.scheme(), "datastore opened");
        Ok(Self::with_client(client, config.bucket, sink))
    }

    /// Build a datastore over a client that is already open.
    pub fn with_client(
        client: Arc<dyn ObjectClient>,
        bucket: impl Into<String>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            sink,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The shared object client.
    pub fn client(&self) -> &dyn ObjectClient {
        self.client.as_ref()
    }

    /// Create the bucket if it does not exist yet.
    pub fn ensure_bucket(&self) -> DsResult<()> {
        diag!(self.sink, "EnsureBucket --- bucket: {}", self.bucket);
        self.client
            .ensure_bucket(&self.bucket)
            .map_err(|e| translate::failure(Operation::EnsureBucket, &Key::root(), e))
    }

    /// Release the project and flush diagnostics.
    ///
    /// Both steps always run; the first failure is returned.
    pub fn close(self) -> DsResult<()> {
        diag!(self.sink, "Close");
        let project = self
            .client
            .close()
            .map_err(|e| translate::failure(Operation::Close, &Key::root(), e));
        let diagnostics = self.sink.flush().map_err(DatastoreError::Diagnostics);
        info!(bucket = %self.bucket, "datastore closed");
        project.and(diagnostics)
    }
}

impl Datastore for ObjectDatastore {
    fn put(&self, key: &Key, value: &[u8]) -> DsResult<()> {
        diag!(self.sink, "Put --- key: {} --- bytes: {}", key, value.len());
        let fail = |e: StoreError| translate::failure(Operation::Put, key, e);

        let mut upload = self
            .client
            .upload_object(&self.bucket, to_storage_key(key))
            .map_err(fail)?;
        if let Err(e) = upload.write_all(value) {
            let _ = upload.abort();
            return Err(fail(e.into()));
        }
        upload.commit().map_err(fail)
    }

    fn get(&self, key: &Key) -> DsResult<Vec<u8>> {
        diag!(self.sink, "Get --- key: {}", key);
        let mut download = self
            .client
            .download_object(&self.bucket, to_storage_key(key))
            .map_err(|e| translate::read_failure(Operation::Get, key, e))?;

        let mut value = Vec::new();
        download
            .read_to_end(&mut value)
            .map_err(|e| translate::failure(Operation::Get, key, e.into()))?;
        Ok(value)
    }

    fn has(&self, key: &Key) -> DsResult<bool> {
        diag!(self.sink, "Has --- key: {}", key);
        translate::existence(self.client.stat_object(&self.bucket, to_storage_key(key)), key)
    }

    // Called very often; no diagnostic line.
    fn get_size(&self, key: &Key) -> DsResult<u64> {
        self.client
            .stat_object(&self.bucket, to_storage_key(key))
            .map(|info| info.system.content_length)
            .map_err(|e| translate::read_failure(Operation::GetSize, key, e))
    }

    fn delete(&self, key: &Key) -> DsResult<()> {
        diag!(self.sink, "Delete --- key: {}", key);
        translate::deletion(
            self.client.delete_object(&self.bucket, to_storage_key(key)),
            key,
        )
    }

    fn sync(&self, prefix: &Key) -> DsResult<()> {
        diag!(self.sink, "Sync --- prefix: {}", prefix);
        Ok(())
    }

    fn query(&self, query: Query) -> DsResult<Results<'_>> {
        diag!(self.sink, "Query --- {}", query);
        query::run(self.client.as_ref(), &self.bucket, query, |key| self.get(key))
    }
}

impl Batching for ObjectDatastore {
    fn batch(&self) -> DsResult<Box<dyn Batch + '_>> {
        diag!(self.sink, "Batch");
        Ok(Box::new(ObjectBatch::new(self, self.sink.as_ref())))
    }
}

impl std::fmt::Debug for ObjectDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectDatastore")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}
