//! Storage error types.

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to initialize the storage backend.
    #[error("storage initialization failed: {0}")]
    Init(String),

    /// Object not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Permission denied by the store.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Requested byte range cannot be satisfied against the object.
    #[error("range not satisfiable: {0}")]
    RangeNotSatisfied(String),

    /// Read operation failed.
    #[error("read failed: {0}")]
    Read(String),

    /// Write operation failed.
    #[error("write failed: {0}")]
    Write(String),

    /// List operation failed.
    #[error("list failed: {0}")]
    List(String),

    /// Presigned URL generation failed.
    #[error("presign failed: {0}")]
    Presign(String),

    /// Operation not supported by the configured backend.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Backend-specific error.
    #[error("backend error: {0}")]
    Backend(opendal::Error),
}

impl StorageError {
    /// Creates a new initialization error.
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init(msg.into())
    }

    /// Creates a new not found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    /// Creates a new range-not-satisfiable error.
    pub fn range_not_satisfied(msg: impl Into<String>) -> Self {
        Self::RangeNotSatisfied(msg.into())
    }

    /// Creates a new read error.
    pub fn read(msg: impl Into<String>) -> Self {
        Self::Read(msg.into())
    }

    /// Creates a new write error.
    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }

    /// Creates a new list error.
    pub fn list(msg: impl Into<String>) -> Self {
        Self::List(msg.into())
    }

    /// Creates a new presign error.
    pub fn presign(msg: impl Into<String>) -> Self {
        Self::Presign(msg.into())
    }

    /// Creates a new unsupported-operation error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}

impl From<opendal::Error> for StorageError {
    fn from(err: opendal::Error) -> Self {
        use opendal::ErrorKind;

        match err.kind() {
            ErrorKind::NotFound => Self::NotFound(err.to_string()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(err.to_string()),
            ErrorKind::RangeNotSatisfied => Self::RangeNotSatisfied(err.to_string()),
            ErrorKind::Unsupported => Self::Unsupported(err.to_string()),
            _ => Self::Backend(err),
        }
    }
}
