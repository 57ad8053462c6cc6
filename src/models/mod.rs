pub mod user;
pub mod entry;
pub mod tag;

pub use user::{User, UserView};
pub use entry::{Entry, EntryWithTags, NewEntry};
pub use tag::Tag;
