//! Translation of object-store errors into datastore errors.
//!
//! Reads (`get`, `get_size`, value hydration) surface a missing object as
//! [`DatastoreError::NotFound`]. `has` turns it into `false`. `delete`
//! swallows it. Anything else passes through as [`DatastoreError::Backend`].

use objds_store::StoreError;

use crate::error::{DatastoreError, DsResult, Operation};
use crate::key::Key;

/// Returns `true` if `err` means the object does not exist.
pub fn is_not_found(err: &StoreError) -> bool {
    err.is_object_not_found()
}

/// Wrap a client error with the failing operation and key.
pub fn failure(op: Operation, key: &Key, err: StoreError) -> DatastoreError {
    DatastoreError::Backend {
        op,
        key: key.to_string(),
        source: err,
    }
}

/// Read path: a missing object becomes the not-found sentinel.
pub fn read_failure(op: Operation, key: &Key, err: StoreError) -> DatastoreError {
    if is_not_found(&err) {
        DatastoreError::NotFound
    } else {
        failure(op, key, err)
    }
}

/// Existence probe: a missing object is `false`, not an error.
pub fn existence<T>(probe: Result<T, StoreError>, key: &Key) -> DsResult<bool> {
    match probe {
        Ok(_) => Ok(true),
        Err(e) if is_not_found(&e) => Ok(false),
        Err(e) => Err(failure(Operation::Has, key, e)),
    }
}

/// Delete: a missing object counts as deleted.
pub fn deletion(result: Result<(), StoreError>, key: &Key) -> DsResult<()> {
    match result {
        Err(e) if !is_not_found(&e) => Err(failure(Operation::Delete, key, e)),
        _ => Ok(()),
    }
}
