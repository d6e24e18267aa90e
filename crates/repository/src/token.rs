//! Access token repository façade.

use tidemark_storage::KvStore;
use tidemark_types::{Page, Pageable, SearchCriteria, Token};

use crate::error::{RepositoryError, RepositoryResult};
use crate::indexed::IndexedRepository;
use crate::record::TokenRecord;

/// CRUD and search surface for access tokens.
///
/// Tokens are grouped by their `{reference_type}:{reference_id}` composite,
/// so reference lookups are membership index reads.
#[derive(Clone)]
pub struct TokenRepository<S> {
    inner: IndexedRepository<S, TokenRecord>,
}

impl<S: KvStore + Clone> TokenRepository<S> {
    pub fn new(storage: S) -> Self {
        Self { inner: IndexedRepository::new(storage) }
    }

    pub async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Token>> {
        match self.inner.find_by_id(id).await? {
            None => Ok(None),
            Some(record) => Ok(Some(record.into_token()?)),
        }
    }

    /// All tokens attached to one reference, in unspecified order.
    pub async fn find_by_reference(
        &self,
        reference_type: &str,
        reference_id: &str,
    ) -> RepositoryResult<Vec<Token>> {
        let group = format!("{reference_type}:{reference_id}");
        let records = self.inner.find_by_group(&group).await?;
        records.into_iter().map(TokenRecord::into_token).collect()
    }

    /// Every stored token, in unspecified order.
    pub async fn find_all(&self) -> RepositoryResult<Vec<Token>> {
        let records = self.inner.find_all().await?;
        records.into_iter().map(TokenRecord::into_token).collect()
    }

    /// Persist a new token. The caller assigns the id; an existing id is
    /// overwritten, last write wins.
    pub async fn create(&self, token: Token) -> RepositoryResult<Token> {
        self.inner.upsert(&TokenRecord::from_token(&token)).await?;
        Ok(token)
    }

    /// Update an existing token. Fails with `InvalidState` when the token
    /// carries no id or the id does not exist.
    pub async fn update(&self, token: Token) -> RepositoryResult<Token> {
        if token.id.is_empty() {
            return Err(RepositoryError::invalid_state("Token to update must have an id"));
        }
        if self.inner.find_by_id(&token.id).await?.is_none() {
            return Err(RepositoryError::invalid_state(format!(
                "Token to update not found: {}",
                token.id
            )));
        }
        self.inner.upsert(&TokenRecord::from_token(&token)).await?;
        Ok(token)
    }

    /// Delete one token. An absent id is a no-op.
    pub async fn delete(&self, id: &str) -> RepositoryResult<()> {
        self.inner.remove(id).await
    }

    /// Delete every token attached to one reference.
    pub async fn delete_by_reference(
        &self,
        reference_type: &str,
        reference_id: &str,
    ) -> RepositoryResult<()> {
        self.inner.remove_by_group(&format!("{reference_type}:{reference_id}")).await.map(|_| ())
    }

    /// Search tokens by criteria, most recent first.
    pub async fn search(
        &self,
        criteria: &SearchCriteria,
        pageable: Option<&Pageable>,
    ) -> RepositoryResult<Page<Token>> {
        let page = self.inner.search(criteria, pageable).await?;
        let mut content = Vec::with_capacity(page.content.len());
        for record in page.content {
            content.push(record.into_token()?);
        }
        Ok(Page {
            content,
            page_number: page.page_number,
            page_elements: page.page_elements,
            total_elements: page.total_elements,
        })
    }
}
