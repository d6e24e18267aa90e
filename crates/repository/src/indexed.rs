//! Index-maintaining persistence core.
//!
//! [`IndexedRepository`] keeps three structures consistent for one entity
//! kind:
//!
//! - the primary hash `{kind}`, field = id, value = serialized record
//! - one membership set per group key, holding the ids of that group
//! - the temporal index `{kind}:created_at`, scored by creation time
//!
//! Writes touching more than one structure are issued as a single batch so
//! they apply as a unit from this client's perspective. Removal reads the
//! record first to learn its group key for membership cleanup.

use std::marker::PhantomData;

use tidemark_storage::{Batch, KvStore};
use tracing::{debug, warn};

use crate::error::{RepositoryError, RepositoryResult};
use crate::keys;
use crate::record::StoredRecord;

/// Indexed persistence for one entity kind over a shared store handle.
pub struct IndexedRepository<S, R> {
    storage: S,
    temporal_key: String,
    _record: PhantomData<R>,
}

impl<S: Clone, R> Clone for IndexedRepository<S, R> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            temporal_key: self.temporal_key.clone(),
            _record: PhantomData,
        }
    }
}

impl<S, R> IndexedRepository<S, R>
where
    S: KvStore,
    R: StoredRecord,
{
    /// Create a repository over the given store handle.
    pub fn new(storage: S) -> Self {
        Self { storage, temporal_key: keys::temporal(R::KIND), _record: PhantomData }
    }

    pub(crate) fn storage(&self) -> &S {
        &self.storage
    }

    pub(crate) fn temporal_key(&self) -> &str {
        &self.temporal_key
    }

    fn encode(record: &R) -> RepositoryResult<Vec<u8>> {
        serde_json::to_vec(record).map_err(|e| RepositoryError::serialization(e.to_string()))
    }

    pub(crate) fn decode(bytes: &[u8]) -> RepositoryResult<R> {
        serde_json::from_slice(bytes).map_err(|e| RepositoryError::serialization(e.to_string()))
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Fetch one record by id. A missing id is `Ok(None)`, not an error.
    pub async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<R>> {
        match self.storage.hash_get(R::KIND, id).await? {
            None => Ok(None),
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
        }
    }

    /// Fetch every record of this kind, in unspecified order.
    pub async fn find_all(&self) -> RepositoryResult<Vec<R>> {
        let values = self.storage.hash_values(R::KIND).await?;
        values.iter().map(|bytes| Self::decode(bytes)).collect()
    }

    /// Fetch every record belonging to a group, in unspecified order.
    ///
    /// Ids in the membership set without a primary record (a partially
    /// applied write or delete) are skipped.
    pub async fn find_by_group(&self, group: &str) -> RepositoryResult<Vec<R>> {
        let ids = self.storage.set_members(group).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let values = self.storage.hash_get_many(R::KIND, &ids).await?;

        let mut records = Vec::with_capacity(values.len());
        for (id, value) in ids.iter().zip(values) {
            match value {
                Some(bytes) => records.push(Self::decode(&bytes)?),
                None => {
                    warn!(kind = R::KIND, id = %id, group = %group, "Indexed id has no record");
                },
            }
        }
        Ok(records)
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Write a record and its index entries as one batch.
    ///
    /// Re-using an id overwrites the primary record and replaces its index
    /// entries. A group is not expected to change after creation, but if a
    /// caller does change it, the stale membership entry is removed in the
    /// same batch.
    pub async fn upsert(&self, record: &R) -> RepositoryResult<()> {
        let id = record.id();
        let group = record.group_key();

        let previous_group = match self.storage.hash_get(R::KIND, id).await? {
            None => None,
            Some(bytes) => match Self::decode(&bytes) {
                Ok(previous) => Some(previous.group_key()),
                Err(_) => {
                    warn!(kind = R::KIND, id = %id, "Overwriting undecodable record");
                    None
                },
            },
        };

        let mut batch = Batch::new();
        if let Some(previous) = previous_group.filter(|p| *p != group) {
            batch.set_remove(previous, id);
        }
        batch.hash_set(R::KIND, id, Self::encode(record)?);
        batch.set_add(&group, id);
        batch.zset_put(&self.temporal_key, id, record.created_at_millis());

        self.storage.apply(batch).await?;
        debug!(kind = R::KIND, id = %id, group = %group, "Upserted record");
        Ok(())
    }

    /// Remove a record and its index entries.
    ///
    /// An absent id is a no-op. The pre-read recovers the group key for
    /// membership cleanup; when the stored record cannot be decoded, the
    /// group is unknown and cleanup degrades to the primary record and the
    /// temporal entry only.
    pub async fn remove(&self, id: &str) -> RepositoryResult<()> {
        let bytes = match self.storage.hash_get(R::KIND, id).await? {
            None => return Ok(()),
            Some(bytes) => bytes,
        };

        let mut batch = Batch::new();
        batch.hash_delete(R::KIND, id);
        batch.zset_remove(&self.temporal_key, id);
        match Self::decode(&bytes) {
            Ok(record) => batch.set_remove(record.group_key(), id),
            Err(_) => {
                warn!(kind = R::KIND, id = %id, "Removing undecodable record, membership entry left behind");
            },
        }

        self.storage.apply(batch).await?;
        debug!(kind = R::KIND, id = %id, "Removed record");
        Ok(())
    }

    /// Remove every record of a group, one record at a time. Returns the
    /// number of ids enumerated.
    ///
    /// Not a single batch. An interruption can leave the group partially
    /// removed; re-running converges.
    pub async fn remove_by_group(&self, group: &str) -> RepositoryResult<usize> {
        let ids = self.storage.set_members(group).await?;
        debug!(kind = R::KIND, group = %group, count = ids.len(), "Removing group");
        for id in &ids {
            self.remove(id).await?;
        }
        Ok(ids.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use tidemark_storage::MemoryBackend;

    use super::*;
    use crate::record::EventRecord;

    fn record(id: &str, alert: &str, created_at: i64) -> EventRecord {
        EventRecord {
            id: id.to_string(),
            alert: alert.to_string(),
            message: format!("event {id}"),
            created_at,
            updated_at: None,
        }
    }

    fn repo(backend: &MemoryBackend) -> IndexedRepository<MemoryBackend, EventRecord> {
        IndexedRepository::new(backend.clone())
    }

    #[tokio::test]
    async fn test_upsert_then_find_by_id() {
        let backend = MemoryBackend::new();
        let repo = repo(&backend);
        let rec = record("e1", "alert-1", 100);

        repo.upsert(&rec).await.unwrap();

        let found = repo.find_by_id("e1").await.unwrap();
        assert_eq!(found, Some(rec));
        assert_eq!(repo.find_by_id("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_upsert_maintains_both_indexes() {
        let backend = MemoryBackend::new();
        let repo = repo(&backend);

        repo.upsert(&record("e1", "alert-1", 100)).await.unwrap();

        assert_eq!(backend.set_members("alert-1").await.unwrap(), vec!["e1"]);
        assert_eq!(backend.zset_score("alert_events:created_at", "e1").await.unwrap(), Some(100));
    }

    #[tokio::test]
    async fn test_upsert_same_id_replaces_index_entries() {
        let backend = MemoryBackend::new();
        let repo = repo(&backend);

        repo.upsert(&record("e1", "alert-1", 100)).await.unwrap();
        repo.upsert(&record("e1", "alert-1", 100)).await.unwrap();

        assert_eq!(backend.set_members("alert-1").await.unwrap().len(), 1);
        assert_eq!(backend.zset_count("alert_events:created_at", i64::MIN, i64::MAX).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_group_change_removes_stale_membership() {
        let backend = MemoryBackend::new();
        let repo = repo(&backend);

        repo.upsert(&record("e1", "alert-1", 100)).await.unwrap();
        repo.upsert(&record("e1", "alert-2", 100)).await.unwrap();

        assert!(backend.set_members("alert-1").await.unwrap().is_empty());
        assert_eq!(backend.set_members("alert-2").await.unwrap(), vec!["e1"]);
    }

    #[tokio::test]
    async fn test_remove_cleans_all_structures() {
        let backend = MemoryBackend::new();
        let repo = repo(&backend);

        repo.upsert(&record("e1", "alert-1", 100)).await.unwrap();
        repo.remove("e1").await.unwrap();

        assert_eq!(repo.find_by_id("e1").await.unwrap(), None);
        assert!(backend.set_members("alert-1").await.unwrap().is_empty());
        assert_eq!(backend.zset_score("alert_events:created_at", "e1").await.unwrap(), None);
        assert_eq!(backend.key_count().await, 0);
    }

    #[tokio::test]
    async fn test_remove_absent_id_is_noop() {
        let backend = MemoryBackend::new();
        let repo = repo(&backend);

        repo.remove("missing").await.unwrap();
        assert_eq!(backend.key_count().await, 0);
    }

    #[tokio::test]
    async fn test_remove_by_group_leaves_other_groups() {
        let backend = MemoryBackend::new();
        let repo = repo(&backend);

        repo.upsert(&record("a", "g1", 100)).await.unwrap();
        repo.upsert(&record("b", "g1", 200)).await.unwrap();
        repo.upsert(&record("c", "g2", 150)).await.unwrap();

        let removed = repo.remove_by_group("g1").await.unwrap();
        assert_eq!(removed, 2);

        assert_eq!(repo.find_by_id("a").await.unwrap(), None);
        assert_eq!(repo.find_by_id("b").await.unwrap(), None);
        assert!(repo.find_by_id("c").await.unwrap().is_some());
        assert!(backend.set_members("g1").await.unwrap().is_empty());
        assert_eq!(backend.set_members("g2").await.unwrap(), vec!["c"]);
    }

    #[tokio::test]
    async fn test_find_by_group_skips_dangling_ids() {
        let backend = MemoryBackend::new();
        let repo = repo(&backend);

        repo.upsert(&record("a", "g1", 100)).await.unwrap();
        repo.upsert(&record("b", "g1", 200)).await.unwrap();

        // Simulate a partially applied delete leaving a dangling member.
        let mut batch = tidemark_storage::Batch::new();
        batch.hash_delete("alert_events", "b");
        backend.apply(batch).await.unwrap();

        let records = repo.find_by_group("g1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "a");
    }

    #[tokio::test]
    async fn test_find_all() {
        let backend = MemoryBackend::new();
        let repo = repo(&backend);

        repo.upsert(&record("a", "g1", 100)).await.unwrap();
        repo.upsert(&record("b", "g2", 200)).await.unwrap();

        let mut ids: Vec<String> =
            repo.find_all().await.unwrap().into_iter().map(|r| r.id).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_find_by_id_malformed_record_fails() {
        let backend = MemoryBackend::new();
        let repo = repo(&backend);

        let mut batch = tidemark_storage::Batch::new();
        batch.hash_set("alert_events", "bad", b"not json".to_vec());
        backend.apply(batch).await.unwrap();

        let result = repo.find_by_id("bad").await;
        assert!(matches!(result, Err(RepositoryError::Serialization(_))));
    }
}
