//! Key construction for the repository layer.
//!
//! Three key families share one flat namespace:
//!
//! - the primary hash of an entity kind is the kind name itself
//!   (e.g. `alert_events`)
//! - the temporal index is `{kind}:created_at`
//! - membership index keys are raw group strings produced by the entities
//!   themselves (an alert id, a `{reference_type}:{reference_id}` composite)
//! - transient query results live under `tmp-{criteria hash}-{nonce}`
//!
//! Membership keys are deliberately not built here; the entity record owns
//! its group string.

use std::hash::{DefaultHasher, Hash, Hasher};

use tidemark_types::SearchCriteria;
use uuid::Uuid;

/// Suffix distinguishing the temporal index from the primary hash.
const TEMPORAL_SUFFIX: &str = ":created_at";

/// Prefix of every transient query-result key.
pub const TEMP_PREFIX: &str = "tmp-";

/// Temporal index key for an entity kind.
#[inline]
pub fn temporal(kind: &str) -> String {
    format!("{kind}{TEMPORAL_SUFFIX}")
}

/// Transient destination key for one search execution.
///
/// The criteria hash keeps related keys recognizable when inspecting the
/// store; the random nonce makes every call's key unique so concurrent
/// searches with equal criteria never share a destination.
#[inline]
pub fn temp_result(criteria: &SearchCriteria) -> String {
    let mut hasher = DefaultHasher::new();
    criteria.hash(&mut hasher);
    format!("{TEMP_PREFIX}{:x}-{}", hasher.finish(), Uuid::new_v4().simple())
}
