use std::io::{Read, Write};
use std::sync::Arc;

use crate::access::AccessGrant;
use crate::error::StoreResult;
use crate::listing::ObjectListing;
use crate::types::{ListOptions, ObjectInfo, ObjectPage};

/// A pending upload. Bytes written are not visible until [`Upload::commit`].
pub trait Upload: Write + Send {
    /// Make the written bytes visible under the upload's key.
    fn commit(self: Box<Self>) -> StoreResult<()>;

    /// Discard the written bytes.
    fn abort(self: Box<Self>) -> StoreResult<()>;
}

/// A streamed object download.
pub type Download = Box<dyn Read + Send>;

/// Client for a flat, bucket-oriented object store.
///
/// One client is shared by every datastore operation, so implementations
/// must be safe for concurrent use (`Send + Sync`). All implementations must
/// satisfy these invariants:
/// - A missing object is reported as `StoreError::ObjectNotFound`, never as
///   a generic failure.
/// - Uploads become visible atomically on commit.
/// - Listing pages are in ascending key order and resume strictly after the
///   cursor key.
pub trait ObjectClient: Send + Sync {
    /// Start an upload for `key` in `bucket`.
    fn upload_object(&self, bucket: &str, key: &str) -> StoreResult<Box<dyn Upload>>;

    /// Open a download stream for `key` in `bucket`.
    ///
    /// Fails with `ObjectNotFound` if the object does not exist.
    fn download_object(&self, bucket: &str, key: &str) -> StoreResult<Download>;

    /// Probe an object's metadata without reading its payload.
    fn stat_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectInfo>;

    /// Delete an object. Fails with `ObjectNotFound` if it does not exist.
    fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()>;

    /// Fetch one page of a prefix listing.
    ///
    /// `cursor` is the key of the last item already seen; the page starts
    /// strictly after it. At most `options.page_size` items are returned.
    fn list_objects_page(
        &self,
        bucket: &str,
        options: &ListOptions,
        cursor: Option<&str>,
    ) -> StoreResult<ObjectPage>;

    /// Create `bucket` if it does not exist.
    fn ensure_bucket(&self, bucket: &str) -> StoreResult<()>;

    /// Release the project. Later calls fail with `StoreError::Closed`.
    fn close(&self) -> StoreResult<()>;
}

impl<'c> dyn ObjectClient + 'c {
    /// Lazily walk every page of a listing.
    ///
    /// No call is made until the first item is pulled. Each page resumes
    /// after the last key of the previous one.
    pub fn list_objects(
        &self,
        bucket: impl Into<String>,
        options: ListOptions,
    ) -> ObjectListing<'_> {
        ObjectListing::new(self, bucket, options)
    }
}

/// Opens a project (a connected [`ObjectClient`]) from an access grant.
pub trait Connector: Send + Sync {
    fn open_project(&self, access: &AccessGrant) -> StoreResult<Arc<dyn ObjectClient>>;
}
