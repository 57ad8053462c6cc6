use std::collections::HashSet;

use chrono::{DateTime, SubsecRound, Utc};

use super::anti_spam::{self, AntiSpamViolation};
use super::store::{EntryChanges, EntryStore, StoreError, TagStore};
use super::tags::resolve_tag_ids;
use super::JournalError;
use crate::models::{EntryWithTags, NewEntry};

/// A validated creation request. Tag names are already normalized.
#[derive(Debug, Clone)]
pub struct CreateEntry {
    pub mood: i64,
    pub task: String,
    pub notes: Option<String>,
    pub tags: Vec<String>,
}

/// A validated partial update. `tags: Some(_)` replaces the entry's tags wholesale.
#[derive(Debug, Clone, Default)]
pub struct UpdateEntry {
    pub mood: Option<i64>,
    pub task: Option<String>,
    pub notes: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
}

/// Creates an entry for `user_id` at `now`.
///
/// Steps run strictly in order: anti-spam gate, tag resolution, entry insert,
/// tag associations, read-back. A failure in the first three aborts with nothing
/// written for the entry (tags created by the resolver stay). A failure while
/// associating tags is logged and the entry is returned anyway, possibly with
/// fewer tags than requested.
pub async fn create_entry<S>(
    store: &S,
    user_id: &str,
    input: CreateEntry,
    now: DateTime<Utc>,
) -> Result<EntryWithTags, JournalError>
where
    S: EntryStore + TagStore + ?Sized,
{
    // storage keeps milliseconds, so the returned entry must too
    let now = now.trunc_subsecs(3);

    anti_spam::check(store, user_id, now).await?;

    let tag_ids = resolve_tag_ids(store, &input.tags).await?;

    let new_entry = NewEntry::new(user_id.to_string(), input.mood, input.task, input.notes, now);
    let entry = match store.insert_entry(&new_entry).await {
        Ok(entry) => entry,
        Err(StoreError::CooldownConflict) => {
            return Err(JournalError::AntiSpam(late_rejection(store, user_id, now).await));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(entry_id = %entry.id, user_id, tags = tag_ids.len(), "entry created");

    attach_tags(store, &entry.id, &tag_ids).await;

    store
        .find_entry(user_id, &entry.id)
        .await?
        .ok_or_else(|| JournalError::Inconsistent(format!("entry {} missing right after insert", entry.id)))
}

/// The gate passed but the store's cooldown check refused the insert: a concurrent
/// request won. Reported exactly like a gate rejection.
async fn late_rejection<S>(store: &S, user_id: &str, now: DateTime<Utc>) -> AntiSpamViolation
where
    S: EntryStore + ?Sized,
{
    tracing::info!(user_id, "entry insert hit the store cooldown check");

    match store.latest_active_entry(user_id).await {
        Ok(Some(blocking)) => AntiSpamViolation::blocked_by(blocking.created_at),
        Ok(None) => AntiSpamViolation::blocked_by(now),
        Err(e) => {
            tracing::warn!(user_id, error = %e, "could not load blocking entry");
            AntiSpamViolation::blocked_by(now)
        }
    }
}

async fn attach_tags<S>(store: &S, entry_id: &str, tag_ids: &[String])
where
    S: EntryStore + ?Sized,
{
    let mut seen = HashSet::new();
    let tag_ids: Vec<String> = tag_ids
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect();

    if tag_ids.is_empty() {
        return;
    }

    // No transaction spans the entry and its tags; an orphaned entry is accepted.
    if let Err(e) = store.insert_entry_tags(entry_id, &tag_ids).await {
        tracing::error!(entry_id, error = %e, "failed to create entry-tag associations");
    }
}

pub async fn get_entry<S>(store: &S, user_id: &str, entry_id: &str) -> Result<EntryWithTags, JournalError>
where
    S: EntryStore + ?Sized,
{
    store
        .find_entry(user_id, entry_id)
        .await?
        .ok_or(JournalError::NotFound)
}

/// Applies a partial update to an active entry owned by `user_id`.
///
/// When tags are given they are resolved before anything is written, then the old
/// associations are dropped and the new ones inserted. Association failures are
/// logged, as on creation.
pub async fn update_entry<S>(
    store: &S,
    user_id: &str,
    entry_id: &str,
    input: UpdateEntry,
    now: DateTime<Utc>,
) -> Result<EntryWithTags, JournalError>
where
    S: EntryStore + TagStore + ?Sized,
{
    let now = now.trunc_subsecs(3);

    if store.find_entry(user_id, entry_id).await?.is_none() {
        return Err(JournalError::NotFound);
    }

    let tag_ids = match &input.tags {
        Some(names) => Some(resolve_tag_ids(store, names).await?),
        None => None,
    };

    let changes = EntryChanges {
        mood: input.mood,
        task: input.task,
        notes: input.notes,
    };
    if !store.update_entry(user_id, entry_id, &changes, now).await? {
        return Err(JournalError::NotFound);
    }

    if let Some(tag_ids) = tag_ids {
        match store.delete_entry_tags(entry_id).await {
            Ok(()) => attach_tags(store, entry_id, &tag_ids).await,
            Err(e) => tracing::error!(entry_id, error = %e, "failed to clear entry-tag associations"),
        }
    }

    tracing::info!(entry_id, user_id, "entry updated");

    store
        .find_entry(user_id, entry_id)
        .await?
        .ok_or(JournalError::NotFound)
}

/// Soft-deletes an entry. Its tag associations are left in place; reads ignore them.
pub async fn delete_entry<S>(store: &S, user_id: &str, entry_id: &str, now: DateTime<Utc>) -> Result<(), JournalError>
where
    S: EntryStore + ?Sized,
{
    if !store.soft_delete_entry(user_id, entry_id, now.trunc_subsecs(3)).await? {
        return Err(JournalError::NotFound);
    }
    tracing::info!(entry_id, user_id, "entry deleted");
    Ok(())
}
