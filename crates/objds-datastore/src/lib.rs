//! Key-value datastore over a bucket-oriented object store.
//!
//! [`ObjectDatastore`] exposes a remote object store (reached through an
//! [`objds_store::ObjectClient`]) as a hierarchical key-value datastore with
//! get/put/delete, prefix queries, and batched mutation.
//!
//! # Architecture
//!
//! - **Keys** are hierarchical and always start with `/` (`/a/b`). Objects
//!   are stored under the same path with the leading `/` removed (`a/b`).
//! - **Errors** from the client are translated once: a missing object
//!   becomes [`DatastoreError::NotFound`] for reads, `false` for
//!   [`Datastore::has`], and success for [`Datastore::delete`]. Everything
//!   else is reported as [`DatastoreError::Backend`] with the failing
//!   operation attached.
//! - **Queries** stream a recursive prefix listing page by page, optionally
//!   fetching each value. Ordering and filters are rejected up front.
//! - **Batches** collect the last operation per key and apply them one by
//!   one on commit. A failed commit leaves earlier operations applied.
//!
//! Every call is synchronous and blocks for the remote round-trip.
//!
//! # Modules
//!
//! - [`key`] — [`Key`] and the storage key codec
//! - [`error`] — [`DatastoreError`] and [`Operation`]
//! - [`translate`] — client error translation
//! - [`traits`] — the [`Datastore`], [`Batching`] and [`Batch`] contract
//! - [`query`] — [`Query`] descriptors and lazy [`Results`]
//! - [`batch`] — the [`ObjectBatch`] accumulator
//! - [`config`] — [`DatastoreConfig`] loading and validation
//! - [`diagnostics`] — injectable diagnostic sinks
//! - [`datastore`] — the [`ObjectDatastore`] facade

pub mod batch;
pub mod config;
pub mod datastore;
pub mod diagnostics;
pub mod error;
pub mod key;
pub mod query;
pub mod traits;
pub mod translate;

pub use batch::{BatchOp, ObjectBatch};
pub use config::DatastoreConfig;
pub use datastore::ObjectDatastore;
pub use diagnostics::{DiagnosticSink, DiscardSink, FileSink, TracingSink};
pub use error::{DatastoreError, DsResult, Operation};
pub use key::{to_datastore_key, to_storage_key, Key, SEPARATOR};
pub use query::{CompareOp, Entry, Filter, Order, Query, Results, ResultsState};
pub use traits::{Batch, Batching, Datastore};
