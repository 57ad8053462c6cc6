//! The entry-creation pipeline: cooldown arithmetic, the anti-spam gate, tag
//! resolution and the orchestration that ties them to the stores.

pub mod anti_spam;
pub mod cooldown;
pub mod create;
pub mod store;
pub mod tags;

pub use anti_spam::AntiSpamViolation;
pub use create::{CreateEntry, UpdateEntry, create_entry, delete_entry, get_entry, update_entry};
pub use store::{EntryChanges, EntryFilter, EntryStore, StoreError, StoreResult, TagStore};

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("{}", .0.message)]
    AntiSpam(AntiSpamViolation),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A logic bug, never a user error.
    #[error("internal consistency error: {0}")]
    Inconsistent(String),
    #[error("entry not found")]
    NotFound,
}
