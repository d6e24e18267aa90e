//! # Tidemark Storage - Key-Value Abstraction Layer
//!
//! Provides the abstract key-value command interface the repository layer is
//! built on, plus an in-memory backend for testing and development.
//!
//! ## Data model
//!
//! The command set is deliberately Redis-shaped. A key holds one of three
//! collection kinds:
//!
//! - **hash**: field → bytes (the primary store of an entity type)
//! - **set**: unordered string members (membership indexes)
//! - **sorted set**: string member → `i64` score (temporal indexes and
//!   transient query results)
//!
//! Missing keys behave as empty collections; accessing a key as the wrong
//! collection kind is a [`StorageError::WrongType`]. Collections that become
//! empty are removed.
//!
//! ## Write batching
//!
//! Mutations are recorded into a [`Batch`] and applied with
//! [`KvStore::apply`]. A backend must apply the commands of one batch in
//! order under a single exclusive acquisition, so the batch becomes visible
//! as a unit from this client's perspective. No all-or-nothing guarantee
//! across a batch is required beyond that ordering.

#![deny(unsafe_code)]

use async_trait::async_trait;

pub mod factory;
pub mod memory;

pub use factory::{BackendType, StorageConfig, StorageFactory};
pub use memory::MemoryBackend;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while communicating with the key-value store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The key exists but holds a different collection kind.
    #[error("Wrong collection kind for key {key}")]
    WrongType { key: String },

    /// Connection or communication error with the backend.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Operation timed out.
    #[error("Operation timed out")]
    Timeout,

    /// Internal backend error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StorageError {
    /// Construct a `WrongType` error for the given key.
    pub fn wrong_type(key: impl Into<String>) -> Self {
        Self::WrongType { key: key.into() }
    }

    /// Construct a `Connection` error with the given message.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into() }
    }

    /// Construct a `Timeout` error.
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Construct an `Internal` error with the given message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }
}

/// A single recorded mutation, applied as part of a [`Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Set a hash field to a value, creating the hash if needed.
    HashSet { key: String, field: String, value: Vec<u8> },
    /// Remove a hash field.
    HashDelete { key: String, field: String },
    /// Add a member to a set, creating the set if needed.
    SetAdd { key: String, member: String },
    /// Remove a member from a set.
    SetRemove { key: String, member: String },
    /// Add a member with a score to a sorted set, overwriting any
    /// existing score for that member.
    ZSetPut { key: String, member: String, score: i64 },
    /// Remove a member from a sorted set.
    ZSetRemove { key: String, member: String },
    /// Remove an entire key regardless of collection kind.
    RemoveKey { key: String },
}

/// An ordered list of mutations applied as a unit via [`KvStore::apply`].
#[derive(Debug, Clone, Default)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a hash field write.
    pub fn hash_set(&mut self, key: impl Into<String>, field: impl Into<String>, value: Vec<u8>) {
        self.ops.push(BatchOp::HashSet { key: key.into(), field: field.into(), value });
    }

    /// Record a hash field removal.
    pub fn hash_delete(&mut self, key: impl Into<String>, field: impl Into<String>) {
        self.ops.push(BatchOp::HashDelete { key: key.into(), field: field.into() });
    }

    /// Record a set member addition.
    pub fn set_add(&mut self, key: impl Into<String>, member: impl Into<String>) {
        self.ops.push(BatchOp::SetAdd { key: key.into(), member: member.into() });
    }

    /// Record a set member removal.
    pub fn set_remove(&mut self, key: impl Into<String>, member: impl Into<String>) {
        self.ops.push(BatchOp::SetRemove { key: key.into(), member: member.into() });
    }

    /// Record a sorted-set member write.
    pub fn zset_put(&mut self, key: impl Into<String>, member: impl Into<String>, score: i64) {
        self.ops.push(BatchOp::ZSetPut { key: key.into(), member: member.into(), score });
    }

    /// Record a sorted-set member removal.
    pub fn zset_remove(&mut self, key: impl Into<String>, member: impl Into<String>) {
        self.ops.push(BatchOp::ZSetRemove { key: key.into(), member: member.into() });
    }

    /// Record a whole-key removal.
    pub fn remove_key(&mut self, key: impl Into<String>) {
        self.ops.push(BatchOp::RemoveKey { key: key.into() });
    }

    /// Returns true if no mutations have been recorded.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of recorded mutations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Consume the batch, yielding its ordered operations.
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// The abstract key-value store interface.
///
/// The handle is a shared, stateless dependency: implementations must be safe
/// for concurrent use by multiple callers without application-level locking.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read one hash field. Returns `None` for a missing key or field.
    async fn hash_get(&self, key: &str, field: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Read several hash fields, preserving the requested field order.
    /// Missing fields yield `None` at their position.
    async fn hash_get_many(
        &self,
        key: &str,
        fields: &[String],
    ) -> StorageResult<Vec<Option<Vec<u8>>>>;

    /// Read every value stored in a hash, in unspecified order.
    async fn hash_values(&self, key: &str) -> StorageResult<Vec<Vec<u8>>>;

    /// Read every member of a set, in unspecified order.
    async fn set_members(&self, key: &str) -> StorageResult<Vec<String>>;

    /// Read the score of one sorted-set member.
    async fn zset_score(&self, key: &str, member: &str) -> StorageResult<Option<i64>>;

    /// Count sorted-set members with `min <= score <= max` (inclusive bounds).
    async fn zset_count(&self, key: &str, min: i64, max: i64) -> StorageResult<usize>;

    /// Read sorted-set members with `min <= score <= max`, ordered by
    /// descending score (ties broken by descending member), skipping
    /// `offset` members and returning at most `limit` when given.
    async fn zset_rev_range_by_score(
        &self,
        key: &str,
        min: i64,
        max: i64,
        offset: usize,
        limit: Option<usize>,
    ) -> StorageResult<Vec<String>>;

    /// Intersect the given source keys into `dest`, replacing it.
    ///
    /// Sources may mix sets and sorted sets. A member survives only if it is
    /// present in every source; its resulting score is the sum of its scores
    /// in the sorted-set sources (plain sets contribute membership only).
    /// Returns the number of members stored. An empty result removes `dest`.
    async fn zset_intersect_into(&self, dest: &str, sources: &[String]) -> StorageResult<usize>;

    /// Remove an entire key. Returns true if the key existed.
    async fn remove_key(&self, key: &str) -> StorageResult<bool>;

    /// Apply a recorded batch of mutations in order, as a unit.
    async fn apply(&self, batch: Batch) -> StorageResult<()>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_records_ops_in_order() {
        let mut batch = Batch::new();
        batch.hash_set("h", "f", b"v".to_vec());
        batch.set_add("s", "m");
        batch.zset_put("z", "m", 42);

        let ops = batch.into_ops();
        assert_eq!(ops.len(), 3);
        assert!(matches!(&ops[0], BatchOp::HashSet { key, .. } if key == "h"));
        assert!(matches!(&ops[1], BatchOp::SetAdd { key, .. } if key == "s"));
        assert!(matches!(&ops[2], BatchOp::ZSetPut { score: 42, .. }));
    }

    #[test]
    fn test_empty_batch() {
        let batch = Batch::new();
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }

    #[test]
    fn test_error_display() {
        let err = StorageError::wrong_type("alert_events");
        assert_eq!(err.to_string(), "Wrong collection kind for key alert_events");

        let err = StorageError::connection("refused");
        assert_eq!(err.to_string(), "Connection error: refused");

        let err = StorageError::timeout();
        assert_eq!(err.to_string(), "Operation timed out");
    }
}
