//! Store ports for the journal core.
//!
//! The core only talks to persistence through these traits; `db::SqliteDb` is the
//! production implementation and tests substitute their own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Entry, EntryWithTags, NewEntry, Tag};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique index rejected the write.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    /// The user already has an active entry inside the cooldown window.
    #[error("an active entry already exists inside the cooldown window")]
    CooldownConflict,
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e.as_database_error() {
            Some(db) if db.is_unique_violation() => StoreError::UniqueViolation(db.message().to_string()),
            _ => StoreError::Database(e),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Filters for the history listing. Every field narrows the result.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub mood: Option<i64>,
    /// Any-of match on tag names.
    pub tags: Vec<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    /// Case-insensitive substring of task or notes.
    pub search: Option<String>,
}

/// Partial update of an entry's own columns; `None` leaves a column unchanged.
#[derive(Debug, Clone, Default)]
pub struct EntryChanges {
    pub mood: Option<i64>,
    pub task: Option<String>,
    /// `Some(None)` clears the notes.
    pub notes: Option<Option<String>>,
}

#[async_trait]
pub trait EntryStore: Send + Sync {
    /// The user's newest entry that is not soft-deleted.
    async fn latest_active_entry(&self, user_id: &str) -> StoreResult<Option<Entry>>;

    /// Inserts the entry unless the user already has an active entry within the
    /// cooldown window around `entry.created_at`, in which case it fails with
    /// [`StoreError::CooldownConflict`]. The check and the write are one atomic step.
    async fn insert_entry(&self, entry: &NewEntry) -> StoreResult<Entry>;

    async fn insert_entry_tags(&self, entry_id: &str, tag_ids: &[String]) -> StoreResult<()>;

    async fn delete_entry_tags(&self, entry_id: &str) -> StoreResult<()>;

    /// Active entry owned by `user_id`, joined with its tags.
    async fn find_entry(&self, user_id: &str, entry_id: &str) -> StoreResult<Option<EntryWithTags>>;

    /// Active entries of `user_id`, newest first.
    async fn list_entries(&self, user_id: &str, filter: &EntryFilter) -> StoreResult<Vec<EntryWithTags>>;

    /// Returns false when no active entry owned by `user_id` matched.
    async fn update_entry(
        &self,
        user_id: &str,
        entry_id: &str,
        changes: &EntryChanges,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Sets `deleted_at`. Returns false when no active entry owned by `user_id` matched.
    async fn soft_delete_entry(&self, user_id: &str, entry_id: &str, now: DateTime<Utc>) -> StoreResult<bool>;
}

#[async_trait]
pub trait TagStore: Send + Sync {
    async fn find_tags_by_names(&self, names: &[String]) -> StoreResult<Vec<Tag>>;

    /// Inserts all tags in one statement: either every row lands or none does.
    async fn insert_tags(&self, tags: &[Tag]) -> StoreResult<()>;

    /// Inserts the tags whose names are still free and skips the rest. Never fails
    /// on the name index.
    async fn insert_tags_if_absent(&self, tags: &[Tag]) -> StoreResult<()>;

    /// Tags ordered by name, optionally restricted to a name prefix, together
    /// with the total number of matches before `limit` is applied.
    async fn search_tags(&self, prefix: Option<&str>, limit: i64) -> StoreResult<(Vec<Tag>, i64)>;
}
