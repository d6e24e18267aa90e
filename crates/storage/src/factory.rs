//! Backend selection and construction.

use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::memory::MemoryBackend;
use crate::{KvStore, StorageError, StorageResult};

/// Supported storage backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendType {
    /// In-memory backend. State is lost on process exit.
    #[default]
    Memory,
}

impl BackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
        }
    }
}

impl FromStr for BackendType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(StorageError::internal(format!("Unknown backend type: {other}"))),
        }
    }
}

/// Configuration for constructing a storage backend.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub backend: BackendType,
}

impl StorageConfig {
    pub fn memory() -> Self {
        Self { backend: BackendType::Memory }
    }
}

/// Builds [`KvStore`] handles from configuration.
pub struct StorageFactory;

impl StorageFactory {
    /// Construct the backend described by `config`.
    pub fn create(config: &StorageConfig) -> StorageResult<Arc<dyn KvStore>> {
        debug!(backend = config.backend.as_str(), "Creating storage backend");
        match config.backend {
            BackendType::Memory => Ok(Arc::new(MemoryBackend::new())),
        }
    }
}
