use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Tag;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Entry {
    pub id: String,
    pub user_id: String,
    pub mood: i64,
    pub task: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entry {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// A validated entry about to be inserted. `created_at` doubles as `updated_at`.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub id: String,
    pub user_id: String,
    pub mood: i64,
    pub task: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewEntry {
    pub fn new(
        user_id: String,
        mood: i64,
        task: String,
        notes: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            mood,
            task,
            notes,
            created_at,
        }
    }
}

/// An entry joined with its tags, the shape every read path returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryWithTags {
    #[serde(flatten)]
    pub entry: Entry,
    pub tags: Vec<Tag>,
}

impl EntryWithTags {
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }
}
