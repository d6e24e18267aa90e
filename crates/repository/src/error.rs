//! Repository error types.

use tidemark_storage::StorageError;

/// Result type alias for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors surfaced by the repository layer.
///
/// `InvalidState` marks caller misuse (e.g. updating an entity with no id)
/// and is raised before any store round trip. The remaining variants are
/// infrastructure failures propagated from serialization or the store.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The operation was called with arguments that can never succeed.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Failed to serialize or deserialize a stored record.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Connection or communication error with the store.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A store operation timed out.
    #[error("Operation timed out")]
    Timeout,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RepositoryError {
    /// Construct an `InvalidState` error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Construct a `Serialization` error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Returns true for caller-misuse errors, as opposed to infrastructure
    /// failures a caller might retry.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState(_))
    }
}

impl From<StorageError> for RepositoryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::WrongType { key } => {
                Self::Internal(format!("Wrong collection kind for key {key}"))
            },
            StorageError::Connection { message } => Self::Connection(message),
            StorageError::Timeout => Self::Timeout,
            StorageError::Internal { message } => Self::Internal(message),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_classification() {
        let err = RepositoryError::invalid_state("Missing id");
        assert!(err.is_invalid_state());
        assert_eq!(err.to_string(), "Invalid state: Missing id");

        let err = RepositoryError::from(StorageError::timeout());
        assert!(!err.is_invalid_state());
    }

    #[test]
    fn test_storage_error_conversion() {
        let err = RepositoryError::from(StorageError::connection("refused"));
        assert!(matches!(err, RepositoryError::Connection(_)));

        let err = RepositoryError::from(StorageError::wrong_type("token"));
        assert!(matches!(err, RepositoryError::Internal(_)));
        assert!(err.to_string().contains("token"));
    }
}
