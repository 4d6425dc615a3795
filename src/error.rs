// Error types for the blob store and the task store

/// Failures reported by a [`BlobStore`](crate::blob::BlobStore) implementation
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("blob store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("blob store unavailable: {0}")]
    Unavailable(String),
}

/// Failures reported by [`Store`](crate::store::Store) and
/// [`TaskManager`](crate::manager::TaskManager)
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading the stored document from the blob store failed
    #[error("failed to read task document: {0}")]
    StorageRead(#[source] BlobError),

    /// The stored document could not be decoded
    #[error("task document is malformed: {0}")]
    MalformedDocument(#[source] serde_json::Error),

    /// Writing or removing the stored document failed
    #[error("failed to write task document: {0}")]
    StorageWrite(#[source] BlobError),

    #[error("failed to encode task document: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("task id already exists: {0}")]
    DuplicateId(String),

    #[error("invalid task: {0}")]
    Validation(String),
}

impl StoreError {
    /// True for the read-side failures that `load_tasks` recovers from
    pub fn is_read_error(&self) -> bool {
        matches!(self, StoreError::StorageRead(_) | StoreError::MalformedDocument(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_error_classification() {
        let read = StoreError::StorageRead(BlobError::Unavailable("offline".to_string()));
        let write = StoreError::StorageWrite(BlobError::Unavailable("offline".to_string()));
        let bad_json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();

        assert!(read.is_read_error());
        assert!(StoreError::MalformedDocument(bad_json).is_read_error());
        assert!(!write.is_read_error());
        assert!(!StoreError::Validation("blank".to_string()).is_read_error());
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::StorageWrite(BlobError::InvalidKey("a/b".to_string()));
        assert_eq!(
            err.to_string(),
            "failed to write task document: invalid storage key: a/b"
        );
        assert_eq!(
            StoreError::DuplicateId("t1".to_string()).to_string(),
            "task id already exists: t1"
        );
    }
}
