//! Criteria search over the temporal and membership indexes.
//!
//! A search compiles its criteria into a set of index keys, intersects them
//! into a transient sorted set, pages over it in descending score order, and
//! removes the transient key before returning, whether or not the page fetch
//! succeeded.

use tidemark_storage::KvStore;
use tidemark_types::{Page, Pageable, SearchCriteria};
use tracing::{debug, warn};

use crate::error::RepositoryResult;
use crate::indexed::IndexedRepository;
use crate::keys;
use crate::record::StoredRecord;

impl<S, R> IndexedRepository<S, R>
where
    S: KvStore,
    R: StoredRecord,
{
    /// Search records by criteria, most recent first.
    ///
    /// With a [`Pageable`], returns the requested page; without one, returns
    /// every match. `total_elements` counts all matches regardless of
    /// pagination. Page ids whose primary record is missing or undecodable
    /// are skipped without failing the page, so `content` can be shorter
    /// than `page_elements`.
    pub async fn search(
        &self,
        criteria: &SearchCriteria,
        pageable: Option<&Pageable>,
    ) -> RepositoryResult<Page<R>> {
        let mut sources = vec![self.temporal_key().to_string()];
        if let Some(group) = criteria.group_filter() {
            sources.push(group.to_string());
        }

        let tmp = keys::temp_result(criteria);
        let matched = self.storage().zset_intersect_into(&tmp, &sources).await?;
        debug!(
            kind = R::KIND,
            group = criteria.group_filter().unwrap_or("<none>"),
            matched,
            "Compiled search working set"
        );

        // The transient key must not outlive this call, so the page is
        // selected before the first early return and the key removed even
        // when selection failed.
        let (min, max) = criteria.window();
        let selected = self.select_page(&tmp, min, max, pageable).await;
        let cleanup = self.storage().remove_key(&tmp).await;
        let (ids, total) = selected?;
        cleanup?;

        let content = self.fetch_page(&ids).await?;
        Ok(Page {
            content,
            page_number: pageable.map_or(0, |p| p.page_number),
            page_elements: ids.len(),
            total_elements: total,
        })
    }

    /// Total plus the selected page of ids from the intersection result.
    async fn select_page(
        &self,
        tmp: &str,
        min: i64,
        max: i64,
        pageable: Option<&Pageable>,
    ) -> RepositoryResult<(Vec<String>, usize)> {
        let total = self.storage().zset_count(tmp, min, max).await?;
        let ids = match pageable {
            Some(page) => {
                self.storage()
                    .zset_rev_range_by_score(tmp, min, max, page.offset(), Some(page.page_size as usize))
                    .await?
            },
            None => self.storage().zset_rev_range_by_score(tmp, min, max, 0, None).await?,
        };
        Ok((ids, total))
    }

    /// Batch-fetch the records for a page of ids, preserving id order.
    async fn fetch_page(&self, ids: &[String]) -> RepositoryResult<Vec<R>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let values = self.storage().hash_get_many(R::KIND, ids).await?;

        let mut records = Vec::with_capacity(values.len());
        for (id, value) in ids.iter().zip(values) {
            match value {
                None => warn!(kind = R::KIND, id = %id, "Page id has no record"),
                Some(bytes) => match Self::decode(&bytes) {
                    Ok(record) => records.push(record),
                    Err(err) => {
                        warn!(kind = R::KIND, id = %id, %err, "Skipping undecodable page record");
                    },
                },
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use tidemark_storage::{Batch, MemoryBackend};

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

    async fn seeded_repo(
        backend: &MemoryBackend,
    ) -> IndexedRepository<MemoryBackend, EventRecord> {
        let repo = IndexedRepository::new(backend.clone());
        repo.upsert(&record("a", "g1", 100)).await.unwrap();
        repo.upsert(&record("b", "g1", 200)).await.unwrap();
        repo.upsert(&record("c", "g2", 150)).await.unwrap();
        repo
    }

    fn ids(page: &Page<EventRecord>) -> Vec<&str> {
        page.content.iter().map(|r| r.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_search_by_group_most_recent_first() {
        let backend = MemoryBackend::new();
        let repo = seeded_repo(&backend).await;

        let page = repo.search(&SearchCriteria::for_group("g1"), None).await.unwrap();

        assert_eq!(ids(&page), vec!["b", "a"]);
        assert_eq!(page.total_elements, 2);
        assert_eq!(page.page_elements, 2);
    }

    #[tokio::test]
    async fn test_search_window_is_inclusive() {
        let backend = MemoryBackend::new();
        let repo = seeded_repo(&backend).await;

        let criteria = SearchCriteria::builder().from(120).to(300).build();
        let page = repo.search(&criteria, None).await.unwrap();
        assert_eq!(ids(&page), vec!["b", "c"]);
        assert_eq!(page.total_elements, 2);

        // Bounds themselves match.
        let criteria = SearchCriteria::builder().from(100).to(150).build();
        let page = repo.search(&criteria, None).await.unwrap();
        assert_eq!(ids(&page), vec!["c", "a"]);
    }

    #[tokio::test]
    async fn test_search_empty_criteria_returns_everything() {
        let backend = MemoryBackend::new();
        let repo = seeded_repo(&backend).await;

        let page = repo.search(&SearchCriteria::any(), None).await.unwrap();

        assert_eq!(ids(&page), vec!["b", "c", "a"]);
        assert_eq!(page.total_elements, 3);
    }

    #[tokio::test]
    async fn test_search_unknown_group_is_empty() {
        let backend = MemoryBackend::new();
        let repo = seeded_repo(&backend).await;

        let page = repo.search(&SearchCriteria::for_group("nope"), None).await.unwrap();

        assert!(page.content.is_empty());
        assert_eq!(page.total_elements, 0);
    }

    #[tokio::test]
    async fn test_search_pagination_reconstructs_sequence() {
        let backend = MemoryBackend::new();
        let repo = IndexedRepository::<_, EventRecord>::new(backend.clone());
        for i in 0..7 {
            repo.upsert(&record(&format!("e{i}"), "g1", 100 + i64::from(i))).await.unwrap();
        }

        let criteria = SearchCriteria::for_group("g1");
        let mut collected = Vec::new();
        for page_number in 0..3 {
            let page =
                repo.search(&criteria, Some(&Pageable::new(page_number, 3))).await.unwrap();
            assert_eq!(page.page_number, page_number);
            assert_eq!(page.total_elements, 7);
            collected.extend(page.content.into_iter().map(|r| r.id));
        }

        assert_eq!(collected, vec!["e6", "e5", "e4", "e3", "e2", "e1", "e0"]);
    }

    #[tokio::test]
    async fn test_search_page_past_end_is_empty_with_total() {
        let backend = MemoryBackend::new();
        let repo = seeded_repo(&backend).await;

        let page = repo
            .search(&SearchCriteria::for_group("g1"), Some(&Pageable::new(5, 10)))
            .await
            .unwrap();

        assert!(page.content.is_empty());
        assert_eq!(page.page_number, 5);
        assert_eq!(page.total_elements, 2);
    }

    #[tokio::test]
    async fn test_search_cleans_up_transient_keys() {
        let backend = MemoryBackend::new();
        let repo = seeded_repo(&backend).await;

        repo.search(&SearchCriteria::any(), None).await.unwrap();
        repo.search(&SearchCriteria::for_group("g1"), Some(&Pageable::new(0, 1))).await.unwrap();
        repo.search(&SearchCriteria::for_group("nope"), None).await.unwrap();

        assert!(backend.keys_with_prefix(keys::TEMP_PREFIX).await.is_empty());
    }

    #[tokio::test]
    async fn test_search_skips_undecodable_page_records() {
        let backend = MemoryBackend::new();
        let repo = seeded_repo(&backend).await;

        let mut batch = Batch::new();
        batch.hash_set("alert_events", "b", b"not json".to_vec());
        backend.apply(batch).await.unwrap();

        let page = repo.search(&SearchCriteria::for_group("g1"), None).await.unwrap();

        // "b" was selected but could not be fetched. Totals stay untouched.
        assert_eq!(ids(&page), vec!["a"]);
        assert_eq!(page.page_elements, 2);
        assert_eq!(page.total_elements, 2);
    }

    #[tokio::test]
    async fn test_search_does_not_mix_entity_kinds() {
        let backend = MemoryBackend::new();
        let repo = seeded_repo(&backend).await;

        // A token sharing a group-like key must not leak into event results.
        let mut batch = Batch::new();
        batch.zset_put("token:created_at", "t1", 180);
        backend.apply(batch).await.unwrap();

        let page = repo.search(&SearchCriteria::any(), None).await.unwrap();
        assert_eq!(ids(&page), vec!["b", "c", "a"]);
    }
}
