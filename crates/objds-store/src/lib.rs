//! Object-store client contract for objds.
//!
//! The datastore adapter never talks to a storage service directly. It goes
//! through the [`ObjectClient`] trait defined here, which models a flat,
//! bucket-oriented object store: whole-object uploads committed in one step,
//! streamed downloads, metadata probes, deletes, and a paginated prefix
//! listing.
//!
//! # Backends
//!
//! - [`InMemoryObjectClient`] -- `BTreeMap`-based client for tests and
//!   embedding, with fault injection and a call log
//! - [`FsObjectClient`] -- a bucket is a directory, an object is a file
//!
//! Backends are opened from an [`AccessGrant`] through a [`Connector`];
//! [`LocalConnector`] understands `mem://` and `file://` grants.
//!
//! # Contract Rules
//!
//! 1. Uploads are invisible until committed.
//! 2. A missing object is always reported as [`StoreError::ObjectNotFound`].
//! 3. Listings are returned in ascending key order, one page at a time.
//! 4. After `close()` every call fails with [`StoreError::Closed`].

pub mod access;
pub mod error;
pub mod listing;
pub mod localfs;
pub mod memory;
pub mod traits;
pub mod types;

pub use access::{AccessGrant, LocalConnector};
pub use error::{StoreError, StoreResult};
pub use listing::ObjectListing;
pub use localfs::FsObjectClient;
pub use memory::{ClientCall, ClientOp, InMemoryObjectClient};
pub use traits::{Connector, Download, ObjectClient, Upload};
pub use types::{ListOptions, ObjectInfo, ObjectPage, SystemMetadata, DEFAULT_PAGE_SIZE};
