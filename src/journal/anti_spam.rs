use chrono::{DateTime, Utc};

use super::JournalError;
use super::cooldown::{self, COOLDOWN_DURATION};
use super::store::EntryStore;
use crate::models::Entry;

/// Structured rejection carrying enough detail for a client-side countdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AntiSpamViolation {
    pub message: String,
    pub retry_after: DateTime<Utc>,
    pub current_entry_created_at: DateTime<Utc>,
}

impl AntiSpamViolation {
    /// Rejection caused by an active entry created at `blocking_created_at`.
    pub fn blocked_by(blocking_created_at: DateTime<Utc>) -> Self {
        Self {
            message: format!(
                "You can only create one entry every {} minutes",
                COOLDOWN_DURATION.as_secs() / 60
            ),
            retry_after: cooldown::retry_after(blocking_created_at),
            current_entry_created_at: blocking_created_at,
        }
    }

    pub fn minutes_until_retry(&self, now: DateTime<Utc>) -> u32 {
        cooldown::minutes_until_retry(self.retry_after, now)
    }
}

/// Decides from the user's most recent active entry whether a new entry may be created at `now`.
pub fn evaluate(latest: Option<&Entry>, now: DateTime<Utc>) -> Result<(), AntiSpamViolation> {
    match latest {
        Some(entry) if cooldown::within_cooldown(entry.created_at, now) => {
            Err(AntiSpamViolation::blocked_by(entry.created_at))
        }
        _ => Ok(()),
    }
}

/// Application-layer gate. Advisory only: two racing requests can both pass it,
/// and the store's cooldown check on insert decides between them.
pub async fn check<S>(store: &S, user_id: &str, now: DateTime<Utc>) -> Result<(), JournalError>
where
    S: EntryStore + ?Sized,
{
    let latest = store.latest_active_entry(user_id).await?;
    evaluate(latest.as_ref(), now).map_err(|violation| {
        tracing::info!(
            user_id,
            retry_after = %cooldown::format_timestamp(violation.retry_after),
            "entry rejected by anti-spam gate"
        );
        JournalError::AntiSpam(violation)
    })
}
