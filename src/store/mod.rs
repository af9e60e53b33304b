//! Local persistence

mod journal;

pub use journal::{Journal, JournalEntry, JournalLog};
