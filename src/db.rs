use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use crate::journal::cooldown::{format_timestamp, window_bounds};
use crate::journal::{EntryChanges, EntryFilter, EntryStore, StoreError, StoreResult, TagStore};
use crate::models::{Entry, EntryWithTags, NewEntry, Tag};

pub async fn init_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    // Ensure data directory exists
    if let Some(path) = database_url.strip_prefix("sqlite:") {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent).ok();
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// SQLite implementation of the journal store ports.
#[derive(Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn tags_for_entries(&self, entry_ids: &[String]) -> StoreResult<HashMap<String, Vec<Tag>>> {
        let mut grouped: HashMap<String, Vec<Tag>> = HashMap::new();
        if entry_ids.is_empty() {
            return Ok(grouped);
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT et.entry_id, t.id, t.name, t.created_at FROM tags t \
             JOIN entry_tags et ON et.tag_id = t.id WHERE et.entry_id IN (",
        );
        let mut ids = qb.separated(", ");
        for id in entry_ids {
            ids.push_bind(id.clone());
        }
        ids.push_unseparated(") ORDER BY t.name ASC");

        let rows: Vec<EntryTagRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        for row in rows {
            let (entry_id, tag) = row.into_parts();
            grouped.entry(entry_id).or_default().push(tag);
        }
        Ok(grouped)
    }
}

/// Tag joined through entry_tags, for batch loading the tags of many entries
#[derive(FromRow)]
struct EntryTagRow {
    entry_id: String,
    id: String,
    name: String,
    created_at: DateTime<Utc>,
}

impl EntryTagRow {
    fn into_parts(self) -> (String, Tag) {
        let tag = Tag {
            id: self.id,
            name: self.name,
            created_at: self.created_at,
        };
        (self.entry_id, tag)
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[async_trait]
impl EntryStore for SqliteDb {
    async fn latest_active_entry(&self, user_id: &str) -> StoreResult<Option<Entry>> {
        let entry = sqlx::query_as(
            r#"
            SELECT * FROM entries
            WHERE user_id = ? AND deleted_at IS NULL
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn insert_entry(&self, entry: &NewEntry) -> StoreResult<Entry> {
        let created_at = format_timestamp(entry.created_at);
        let (window_start, window_end) = window_bounds(entry.created_at);

        // Check and write in one statement, so SQLite's write lock serializes racing inserts.
        let result = sqlx::query(
            r#"
            INSERT INTO entries (id, user_id, mood, task, notes, created_at, updated_at)
            SELECT ?, ?, ?, ?, ?, ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM entries
                WHERE user_id = ? AND deleted_at IS NULL AND created_at > ? AND created_at < ?
            )
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.user_id)
        .bind(entry.mood)
        .bind(&entry.task)
        .bind(&entry.notes)
        .bind(&created_at)
        .bind(&created_at)
        .bind(&entry.user_id)
        .bind(format_timestamp(window_start))
        .bind(format_timestamp(window_end))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::CooldownConflict);
        }

        Ok(Entry {
            id: entry.id.clone(),
            user_id: entry.user_id.clone(),
            mood: entry.mood,
            task: entry.task.clone(),
            notes: entry.notes.clone(),
            created_at: entry.created_at,
            updated_at: entry.created_at,
            deleted_at: None,
        })
    }

    async fn insert_entry_tags(&self, entry_id: &str, tag_ids: &[String]) -> StoreResult<()> {
        if tag_ids.is_empty() {
            return Ok(());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("INSERT INTO entry_tags (entry_id, tag_id) ");
        qb.push_values(tag_ids, |mut row, tag_id| {
            row.push_bind(entry_id.to_string()).push_bind(tag_id.clone());
        });
        qb.build().execute(&self.pool).await?;

        Ok(())
    }

    async fn delete_entry_tags(&self, entry_id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM entry_tags WHERE entry_id = ?")
            .bind(entry_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_entry(&self, user_id: &str, entry_id: &str) -> StoreResult<Option<EntryWithTags>> {
        let entry: Option<Entry> = sqlx::query_as(
            "SELECT * FROM entries WHERE id = ? AND user_id = ? AND deleted_at IS NULL",
        )
        .bind(entry_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(entry) = entry else {
            return Ok(None);
        };

        let tags: Vec<Tag> = sqlx::query_as(
            r#"
            SELECT t.id, t.name, t.created_at FROM tags t
            JOIN entry_tags et ON et.tag_id = t.id
            WHERE et.entry_id = ?
            ORDER BY t.name ASC
            "#,
        )
        .bind(entry_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(EntryWithTags { entry, tags }))
    }

    async fn list_entries(&self, user_id: &str, filter: &EntryFilter) -> StoreResult<Vec<EntryWithTags>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT e.* FROM entries e WHERE e.user_id = ");
        qb.push_bind(user_id.to_string());
        qb.push(" AND e.deleted_at IS NULL");

        if let Some(mood) = filter.mood {
            qb.push(" AND e.mood = ").push_bind(mood);
        }

        if !filter.tags.is_empty() {
            qb.push(
                " AND EXISTS (SELECT 1 FROM entry_tags et JOIN tags t ON t.id = et.tag_id \
                 WHERE et.entry_id = e.id AND t.name IN (",
            );
            let mut names = qb.separated(", ");
            for name in &filter.tags {
                names.push_bind(name.clone());
            }
            names.push_unseparated("))");
        }

        if let Some(from) = filter.created_from {
            qb.push(" AND e.created_at >= ").push_bind(format_timestamp(from));
        }
        if let Some(to) = filter.created_to {
            qb.push(" AND e.created_at <= ").push_bind(format_timestamp(to));
        }

        if let Some(search) = &filter.search {
            let pattern = format!("%{}%", escape_like(search));
            qb.push(r" AND (e.task LIKE ")
                .push_bind(pattern.clone())
                .push(r" ESCAPE '\' OR e.notes LIKE ")
                .push_bind(pattern)
                .push(r" ESCAPE '\')");
        }

        qb.push(" ORDER BY e.created_at DESC");

        let entries: Vec<Entry> = qb.build_query_as().fetch_all(&self.pool).await?;
        let ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
        let mut tags = self.tags_for_entries(&ids).await?;

        Ok(entries
            .into_iter()
            .map(|entry| {
                let tags = tags.remove(&entry.id).unwrap_or_default();
                EntryWithTags { entry, tags }
            })
            .collect())
    }

    async fn update_entry(
        &self,
        user_id: &str,
        entry_id: &str,
        changes: &EntryChanges,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE entries SET updated_at = ");
        qb.push_bind(format_timestamp(now));

        if let Some(mood) = changes.mood {
            qb.push(", mood = ").push_bind(mood);
        }
        if let Some(task) = &changes.task {
            qb.push(", task = ").push_bind(task.clone());
        }
        if let Some(notes) = &changes.notes {
            qb.push(", notes = ").push_bind(notes.clone());
        }

        qb.push(" WHERE id = ")
            .push_bind(entry_id.to_string())
            .push(" AND user_id = ")
            .push_bind(user_id.to_string())
            .push(" AND deleted_at IS NULL");

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete_entry(&self, user_id: &str, entry_id: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let now = format_timestamp(now);
        let result = sqlx::query(
            "UPDATE entries SET deleted_at = ?, updated_at = ? WHERE id = ? AND user_id = ? AND deleted_at IS NULL",
        )
        .bind(&now)
        .bind(&now)
        .bind(entry_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TagStore for SqliteDb {
    async fn find_tags_by_names(&self, names: &[String]) -> StoreResult<Vec<Tag>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id, name, created_at FROM tags WHERE name IN (");
        let mut separated = qb.separated(", ");
        for name in names {
            separated.push_bind(name.clone());
        }
        separated.push_unseparated(")");

        Ok(qb.build_query_as().fetch_all(&self.pool).await?)
    }

    async fn insert_tags(&self, tags: &[Tag]) -> StoreResult<()> {
        if tags.is_empty() {
            return Ok(());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("INSERT INTO tags (id, name, created_at) ");
        qb.push_values(tags, |mut row, tag| {
            row.push_bind(tag.id.clone())
                .push_bind(tag.name.clone())
                .push_bind(format_timestamp(tag.created_at));
        });
        qb.build().execute(&self.pool).await?;

        Ok(())
    }

    async fn insert_tags_if_absent(&self, tags: &[Tag]) -> StoreResult<()> {
        if tags.is_empty() {
            return Ok(());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("INSERT INTO tags (id, name, created_at) ");
        qb.push_values(tags, |mut row, tag| {
            row.push_bind(tag.id.clone())
                .push_bind(tag.name.clone())
                .push_bind(format_timestamp(tag.created_at));
        });
        qb.push(" ON CONFLICT(name) DO NOTHING");
        qb.build().execute(&self.pool).await?;

        Ok(())
    }

    async fn search_tags(&self, prefix: Option<&str>, limit: i64) -> StoreResult<(Vec<Tag>, i64)> {
        let pattern = prefix.map(|p| format!("{}%", escape_like(p)));

        let (total,): (i64,) = sqlx::query_as(r"SELECT COUNT(*) FROM tags WHERE ? IS NULL OR name LIKE ? ESCAPE '\'")
            .bind(&pattern)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;

        let tags: Vec<Tag> = sqlx::query_as(
            r"
            SELECT id, name, created_at FROM tags
            WHERE ? IS NULL OR name LIKE ? ESCAPE '\'
            ORDER BY name ASC
            LIMIT ?
            ",
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok((tags, total))
    }
}
