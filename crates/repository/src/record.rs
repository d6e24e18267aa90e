//! Stored record shapes.
//!
//! Records are the JSON documents persisted in the primary hash. They differ
//! from the public entity types in one way: timestamps are stored as epoch
//! milliseconds, matching the temporal index score, with optional timestamps
//! omitted from the document when absent.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tidemark_types::{Event, Token};

use crate::error::{RepositoryError, RepositoryResult};

/// A persistable entity record.
///
/// Implementations tell the indexing machinery everything it needs to
/// maintain the primary hash, the membership index, and the temporal index
/// for one entity kind.
pub trait StoredRecord: Serialize + DeserializeOwned + Send + Sync {
    /// Entity kind name. Doubles as the primary hash key and the temporal
    /// index key prefix.
    const KIND: &'static str;

    /// Unique identifier, the hash field and index member.
    fn id(&self) -> &str;

    /// Membership group this record belongs to.
    fn group_key(&self) -> String;

    /// Creation time in epoch milliseconds, the temporal index score.
    fn created_at_millis(&self) -> i64;
}

fn millis_to_datetime(field: &str, millis: i64) -> RepositoryResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        RepositoryError::serialization(format!("Timestamp out of range for {field}: {millis}"))
    })
}

// ============================================================================
// Event Record
// ============================================================================

/// Stored form of an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub alert: String,
    pub message: String,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub updated_at: Option<i64>,
}

impl EventRecord {
    pub fn from_event(event: &Event) -> Self {
        Self {
            id: event.id.clone(),
            alert: event.alert.clone(),
            message: event.message.clone(),
            created_at: event.created_at.timestamp_millis(),
            updated_at: event.updated_at.map(|t| t.timestamp_millis()),
        }
    }

    pub fn into_event(self) -> RepositoryResult<Event> {
        Ok(Event {
            created_at: millis_to_datetime("created_at", self.created_at)?,
            updated_at: self.updated_at.map(|m| millis_to_datetime("updated_at", m)).transpose()?,
            id: self.id,
            alert: self.alert,
            message: self.message,
        })
    }
}

impl StoredRecord for EventRecord {
    const KIND: &'static str = "alert_events";

    fn id(&self) -> &str {
        &self.id
    }

    fn group_key(&self) -> String {
        self.alert.clone()
    }

    fn created_at_millis(&self) -> i64 {
        self.created_at
    }
}

// ============================================================================
// Token Record
// ============================================================================

/// Stored form of a [`Token`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id: String,
    pub name: String,
    pub token: String,
    pub reference_type: String,
    pub reference_id: String,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_use_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expires_at: Option<i64>,
}

impl TokenRecord {
    pub fn from_token(token: &Token) -> Self {
        Self {
            id: token.id.clone(),
            name: token.name.clone(),
            token: token.token.clone(),
            reference_type: token.reference_type.clone(),
            reference_id: token.reference_id.clone(),
            created_at: token.created_at.timestamp_millis(),
            last_use_at: token.last_use_at.map(|t| t.timestamp_millis()),
            expires_at: token.expires_at.map(|t| t.timestamp_millis()),
        }
    }

    pub fn into_token(self) -> RepositoryResult<Token> {
        Ok(Token {
            created_at: millis_to_datetime("created_at", self.created_at)?,
            last_use_at: self.last_use_at.map(|m| millis_to_datetime("last_use_at", m)).transpose()?,
            expires_at: self.expires_at.map(|m| millis_to_datetime("expires_at", m)).transpose()?,
            id: self.id,
            name: self.name,
            token: self.token,
            reference_type: self.reference_type,
            reference_id: self.reference_id,
        })
    }
}

impl StoredRecord for TokenRecord {
    const KIND: &'static str = "token";

    fn id(&self) -> &str {
        &self.id
    }

    fn group_key(&self) -> String {
        format!("{}:{}", self.reference_type, self.reference_id)
    }

    fn created_at_millis(&self) -> i64 {
        self.created_at
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn sample_event() -> Event {
        Event {
            id: "e1".to_string(),
            alert: "alert-1".to_string(),
            message: "cpu high".to_string(),
            created_at: DateTime::from_timestamp_millis(1_000).unwrap(),
            updated_at: None,
        }
    }

    #[test]
    fn test_event_record_round_trip() {
        let event = sample_event();
        let record = EventRecord::from_event(&event);

        assert_eq!(record.created_at, 1_000);
        assert_eq!(record.group_key(), "alert-1");
        assert_eq!(record.created_at_millis(), 1_000);

        assert_eq!(record.into_event().unwrap(), event);
    }

    #[test]
    fn test_event_record_omits_absent_updated_at() {
        let record = EventRecord::from_event(&sample_event());
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("updated_at"));

        let parsed: EventRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.updated_at, None);
    }

    #[test]
    fn test_token_record_group_key() {
        let token = Token {
            id: "t1".to_string(),
            name: "ci".to_string(),
            token: "secret".to_string(),
            reference_type: "USER".to_string(),
            reference_id: "alice".to_string(),
            created_at: DateTime::from_timestamp_millis(5_000).unwrap(),
            last_use_at: None,
            expires_at: Some(DateTime::from_timestamp_millis(9_000).unwrap()),
        };
        let record = TokenRecord::from_token(&token);

        assert_eq!(record.group_key(), "USER:alice");
        assert_eq!(record.expires_at, Some(9_000));
        assert_eq!(record.into_token().unwrap(), token);
    }
}
