/// Errors from object-store client operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No object exists at the requested key.
    #[error("object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    /// The bucket does not exist in this project.
    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    /// The access grant could not be parsed or names an unknown backend.
    #[error("invalid access grant: {0}")]
    InvalidAccess(String),

    /// The object key cannot be represented by this backend.
    #[error("invalid object key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// The project has been closed.
    #[error("project is closed")]
    Closed,

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other failure reported by the backend.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub(crate) fn not_found(bucket: &str, key: &str) -> Self {
        Self::ObjectNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    /// Returns `true` if this error means "no object exists at this key".
    pub fn is_object_not_found(&self) -> bool {
        matches!(self, Self::ObjectNotFound { .. })
    }
}

/// Result alias for object-store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_object_not_found_is_not_found() {
        assert!(StoreError::not_found("b", "k").is_object_not_found());
        assert!(!StoreError::BucketNotFound("b".into()).is_object_not_found());
        assert!(!StoreError::Closed.is_object_not_found());
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(!StoreError::from(io).is_object_not_found());
    }

    #[test]
    fn display_names_bucket_and_key() {
        let err = StoreError::not_found("photos", "a/b");
        assert_eq!(err.to_string(), "object not found: photos/a/b");
    }
}
