//! Core data model for the moderation queue.
//!
//! Pages and submitters come from the host platform; pending entries and
//! preload ids are owned here.

mod content;
mod edit;
mod entry;
mod identity;
mod log;
mod page;
mod preload_id;

pub use content::Content;
pub use edit::EditAttempt;
pub use entry::{EntryStatus, EntryType, PendingEdit, PendingEntry, PendingEntryFields};
pub use identity::Identity;
pub use log::LogAction;
pub use page::PageIdentity;
pub use preload_id::PreloadId;
