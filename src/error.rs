//! Errors surfaced by the moderation core.

use crate::{consequence::ConsequenceKind, storage::StorageError};

/// Errors that can occur while intercepting edits or handling moderator actions.
///
/// Faults raised while running a consequence arrive here unchanged; nothing in
/// the core retries or rolls back.
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    #[error("unknown moderation action: {0}")]
    UnknownAction(String),

    #[error("pending entry not found: {0}")]
    EntryNotFound(i64),

    #[error("no request context: none bound and no ambient context installed")]
    NoRequestContext,

    #[error("cannot queue non-text content (model {0})")]
    NonTextContent(String),

    #[error("{kind} returned an unexpected result")]
    UnexpectedOutcome { kind: ConsequenceKind },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = core::result::Result<T, ModerationError>;
