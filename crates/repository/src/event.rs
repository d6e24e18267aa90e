//! Alert event repository façade.

use tidemark_storage::KvStore;
use tidemark_types::{Event, Page, Pageable, SearchCriteria};

use crate::error::{RepositoryError, RepositoryResult};
use crate::indexed::IndexedRepository;
use crate::record::EventRecord;

/// CRUD and search surface for alert events.
///
/// Thin conversion layer over [`IndexedRepository`]: the public [`Event`]
/// shape goes in and out, the stored record shape stays internal.
#[derive(Clone)]
pub struct EventRepository<S> {
    inner: IndexedRepository<S, EventRecord>,
}

impl<S: KvStore + Clone> EventRepository<S> {
    pub fn new(storage: S) -> Self {
        Self { inner: IndexedRepository::new(storage) }
    }

    pub async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Event>> {
        match self.inner.find_by_id(id).await? {
            None => Ok(None),
            Some(record) => Ok(Some(record.into_event()?)),
        }
    }

    /// Persist a new event. The caller assigns the id; an existing id is
    /// overwritten, last write wins.
    pub async fn create(&self, event: Event) -> RepositoryResult<Event> {
        self.inner.upsert(&EventRecord::from_event(&event)).await?;
        Ok(event)
    }

    /// Update an existing event. Fails with `InvalidState` when the event
    /// carries no id or the id does not exist.
    pub async fn update(&self, event: Event) -> RepositoryResult<Event> {
        if event.id.is_empty() {
            return Err(RepositoryError::invalid_state("Event to update must have an id"));
        }
        if self.inner.find_by_id(&event.id).await?.is_none() {
            return Err(RepositoryError::invalid_state(format!(
                "Event to update not found: {}",
                event.id
            )));
        }
        self.inner.upsert(&EventRecord::from_event(&event)).await?;
        Ok(event)
    }

    /// Delete one event. An absent id is a no-op.
    pub async fn delete(&self, id: &str) -> RepositoryResult<()> {
        self.inner.remove(id).await
    }

    /// Delete every event belonging to one alert.
    pub async fn delete_all(&self, alert: &str) -> RepositoryResult<()> {
        self.inner.remove_by_group(alert).await.map(|_| ())
    }

    /// Search events by criteria, most recent first.
    pub async fn search(
        &self,
        criteria: &SearchCriteria,
        pageable: Option<&Pageable>,
    ) -> RepositoryResult<Page<Event>> {
        let page = self.inner.search(criteria, pageable).await?;
        let mut content = Vec::with_capacity(page.content.len());
        for record in page.content {
            content.push(record.into_event()?);
        }
        Ok(Page {
            content,
            page_number: page.page_number,
            page_elements: page.page_elements,
            total_elements: page.total_elements,
        })
    }
}
