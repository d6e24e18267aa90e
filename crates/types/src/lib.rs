//! # Tidemark Types
//!
//! Shared type definitions for the Tidemark indexed entity store.
//!
//! This crate provides the public entity shapes ([`Event`], [`Token`]), the
//! search filter ([`SearchCriteria`]), and the pagination types ([`Pageable`],
//! [`Page`]) used across the Tidemark crates, ensuring a single source of
//! truth and preventing circular dependencies.

#![deny(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Entity Types
// ============================================================================

/// An event recorded against an alert.
///
/// Events are grouped by their owning alert and indexed by creation time for
/// reverse-chronological retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Globally unique identifier, assigned by the caller before creation.
    pub id: String,
    /// Identifier of the alert this event belongs to.
    pub alert: String,
    /// Human-readable event message.
    pub message: String,
    /// Creation time. Immutable after creation; used as the temporal
    /// index score.
    pub created_at: DateTime<Utc>,
    /// Last modification time, if the event has been updated.
    pub updated_at: Option<DateTime<Utc>>,
}

/// An access token scoped to a reference (e.g. a user or an application).
///
/// Tokens are grouped by their `{reference_type}:{reference_id}` composite
/// and indexed by creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Globally unique identifier, assigned by the caller before creation.
    pub id: String,
    /// Display name of the token.
    pub name: String,
    /// The opaque token value itself.
    pub token: String,
    /// Kind of entity the token is attached to (e.g. "USER").
    pub reference_type: String,
    /// Identifier of the entity the token is attached to.
    pub reference_id: String,
    /// Creation time. Immutable after creation.
    pub created_at: DateTime<Utc>,
    /// Time of last use, if the token has ever been used.
    pub last_use_at: Option<DateTime<Utc>>,
    /// Expiry time, if the token expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Token {
    /// The membership group key for this token: `{reference_type}:{reference_id}`.
    pub fn reference_key(&self) -> String {
        format!("{}:{}", self.reference_type, self.reference_id)
    }
}

// ============================================================================
// Search Criteria
// ============================================================================

/// Filter criteria compiled into index lookups by the query engine.
///
/// Supports exactly one optional group filter plus an optional inclusive
/// timestamp window. The window is active only when both bounds are non-zero;
/// `from == 0 && to == 0` means unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, bon::Builder)]
#[builder(on(String, into))]
pub struct SearchCriteria {
    /// Restrict results to entities belonging to this group
    /// (an event's alert id, a token's reference key).
    pub group: Option<String>,
    /// Window start, epoch milliseconds (inclusive).
    #[builder(default)]
    #[serde(default)]
    pub from: i64,
    /// Window end, epoch milliseconds (inclusive).
    #[builder(default)]
    #[serde(default)]
    pub to: i64,
}

impl SearchCriteria {
    /// A criteria matching everything.
    pub fn any() -> Self {
        Self::builder().build()
    }

    /// Criteria restricted to a single group, unbounded in time.
    pub fn for_group(group: impl Into<String>) -> Self {
        Self::builder().group(group).build()
    }

    /// Returns the group filter if one is set and non-empty.
    pub fn group_filter(&self) -> Option<&str> {
        self.group.as_deref().filter(|g| !g.is_empty())
    }

    /// Returns the inclusive score window, or the full range when unbounded.
    pub fn window(&self) -> (i64, i64) {
        if self.from != 0 && self.to != 0 { (self.from, self.to) } else { (i64::MIN, i64::MAX) }
    }
}

// ============================================================================
// Pagination Types
// ============================================================================

/// A pagination request: zero-based page number plus page size.
///
/// Absence of a `Pageable` (an `Option::None` at the call site) means
/// "return everything"; there is no magic page-size sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pageable {
    /// Zero-based page number.
    pub page_number: u32,
    /// Maximum number of elements per page.
    pub page_size: u32,
}

impl Pageable {
    /// Create a pagination request.
    pub fn new(page_number: u32, page_size: u32) -> Self {
        Self { page_number, page_size }
    }

    /// Offset of the first element of this page in the overall ordering.
    pub fn offset(&self) -> usize {
        self.page_number as usize * self.page_size as usize
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// The fetched entities, most recent first.
    pub content: Vec<T>,
    /// The page number that was requested (0 when unpaginated).
    pub page_number: u32,
    /// Number of ids selected for this page. May exceed `content.len()` when
    /// records were skipped as missing or malformed; informational only.
    pub page_elements: usize,
    /// Total number of entities matching the criteria, ignoring pagination.
    pub total_elements: usize,
}

impl<T> Page<T> {
    /// An empty page with zero totals.
    pub fn empty() -> Self {
        Self { content: Vec::new(), page_number: 0, page_elements: 0, total_elements: 0 }
    }

    /// Map the page content, preserving the pagination metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page_number: self.page_number,
            page_elements: self.page_elements,
            total_elements: self.total_elements,
        }
    }
}
