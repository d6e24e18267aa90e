//! # Tidemark Repository - Indexed Entity Persistence
//!
//! Repositories for alert events and access tokens over the abstract
//! key-value store, maintaining hand-built secondary indexes:
//!
//! - a **primary hash** per entity kind (id to serialized record)
//! - a **membership set** per group key (an event's alert, a token's
//!   reference composite)
//! - a **temporal sorted set** per entity kind, scored by creation time
//!
//! Searches intersect the relevant indexes into a transient sorted set,
//! page over it most-recent-first, and always remove the transient key
//! before returning.
//!
//! ## Example
//!
//! ```
//! use chrono::Utc;
//! use tidemark_repository::EventRepository;
//! use tidemark_storage::MemoryBackend;
//! use tidemark_types::{Event, SearchCriteria};
//!
//! # async fn demo() -> Result<(), tidemark_repository::RepositoryError> {
//! let repo = EventRepository::new(MemoryBackend::new());
//! repo.create(Event {
//!     id: "e1".into(),
//!     alert: "alert-1".into(),
//!     message: "cpu high".into(),
//!     created_at: Utc::now(),
//!     updated_at: None,
//! })
//! .await?;
//!
//! let page = repo.search(&SearchCriteria::for_group("alert-1"), None).await?;
//! assert_eq!(page.total_elements, 1);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod error;
pub mod event;
pub mod indexed;
pub mod keys;
pub mod record;
pub mod search;
pub mod token;

pub use error::{RepositoryError, RepositoryResult};
pub use event::EventRepository;
pub use indexed::IndexedRepository;
pub use record::{EventRecord, StoredRecord, TokenRecord};
pub use token::TokenRepository;
