//! Consequences: every state change the moderation core makes.
//!
//! A consequence is an immutable value describing one effect. Nothing writes
//! to storage directly; callers build a consequence and hand it to a
//! [`ConsequenceManager`], which either runs it ([`RealManager`]) or records
//! it ([`RecordingManager`]). Tests assert on the recorded sequence.

mod manager;
mod queue;
mod recording;

use std::{collections::BTreeMap, fmt};

use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::Result,
    model::{EditAttempt, Identity, LogAction, PageIdentity, PendingEntryFields},
    storage::UpsertOutcome,
};

pub use manager::{ConsequenceManager, RealManager};
pub use recording::RecordingManager;

/// Tag attached to revisions that absorbed a queued edit.
pub const MERGED_TAG: &str = "moderation-merged";

/// One unit of state-changing work.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "consequence", rename_all = "camelCase")]
pub enum Consequence {
    /// Upsert a pending entry. Yields [`Outcome::Upsert`].
    InsertRowIntoModerationTable { fields: PendingEntryFields },

    /// Queue an intercepted edit: resolve the submitter's preload id, then
    /// upsert the entry. Yields [`Outcome::Upsert`].
    QueueEdit(EditAttempt),

    /// Yields [`Outcome::Flag`]: `false` if the entry wasn't pending.
    #[serde(rename_all = "camelCase")]
    MarkAsMerged { mod_id: i64, rev_id: i64 },

    /// Yields [`Outcome::Flag`].
    #[serde(rename_all = "camelCase")]
    MarkAsApproved { mod_id: i64 },

    /// Yields [`Outcome::Flag`].
    #[serde(rename_all = "camelCase")]
    MarkAsRejected { mod_id: i64, moderator: String },

    /// Append to the audit log.
    AddLogEntry {
        action: LogAction,
        actor: Identity,
        page: PageIdentity,
        params: BTreeMap<String, serde_json::Value>,
    },

    InvalidatePendingTimeCache,

    #[serde(rename_all = "camelCase")]
    TagRevisionAsMerged { rev_id: i64 },

    /// Generate a fresh anonymous marker. Yields [`Outcome::Token`].
    RememberAnonId,
}

/// Variant tag of a [`Consequence`], without its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsequenceKind {
    InsertRowIntoModerationTable,
    QueueEdit,
    MarkAsMerged,
    MarkAsApproved,
    MarkAsRejected,
    AddLogEntry,
    InvalidatePendingTimeCache,
    TagRevisionAsMerged,
    RememberAnonId,
}

impl fmt::Display for ConsequenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What running a consequence produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Outcome {
    /// No result, or no result registered with a recording manager.
    #[default]
    None,
    Upsert(UpsertOutcome),
    Flag(bool),
    Token(String),
}

impl Outcome {
    pub fn upsert(&self) -> Option<UpsertOutcome> {
        match self {
            Self::Upsert(outcome) => Some(*outcome),
            _ => None,
        }
    }

    pub fn flag(&self) -> Option<bool> {
        match self {
            Self::Flag(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn into_token(self) -> Option<String> {
        match self {
            Self::Token(token) => Some(token),
            _ => None,
        }
    }
}

impl Consequence {
    pub fn kind(&self) -> ConsequenceKind {
        match self {
            Self::InsertRowIntoModerationTable { .. } => {
                ConsequenceKind::InsertRowIntoModerationTable
            }
            Self::QueueEdit(_) => ConsequenceKind::QueueEdit,
            Self::MarkAsMerged { .. } => ConsequenceKind::MarkAsMerged,
            Self::MarkAsApproved { .. } => ConsequenceKind::MarkAsApproved,
            Self::MarkAsRejected { .. } => ConsequenceKind::MarkAsRejected,
            Self::AddLogEntry { .. } => ConsequenceKind::AddLogEntry,
            Self::InvalidatePendingTimeCache => ConsequenceKind::InvalidatePendingTimeCache,
            Self::TagRevisionAsMerged { .. } => ConsequenceKind::TagRevisionAsMerged,
            Self::RememberAnonId => ConsequenceKind::RememberAnonId,
        }
    }

    /// Performs the effect. Only [`RealManager`] calls this.
    fn run(&self, manager: &RealManager<'_>) -> Result<Outcome> {
        let storage = manager.storage();
        match self {
            Self::InsertRowIntoModerationTable { fields } => {
                Ok(Outcome::Upsert(storage.upsert_entry(fields)?))
            }
            Self::QueueEdit(attempt) => queue::run(attempt, manager),
            Self::MarkAsMerged { mod_id, rev_id } => {
                Ok(Outcome::Flag(storage.mark_merged(*mod_id, *rev_id)?))
            }
            Self::MarkAsApproved { mod_id } => Ok(Outcome::Flag(storage.mark_approved(*mod_id)?)),
            Self::MarkAsRejected { mod_id, moderator } => {
                Ok(Outcome::Flag(storage.mark_rejected(*mod_id, moderator)?))
            }
            Self::AddLogEntry {
                action,
                actor,
                page,
                params,
            } => {
                storage.add_log_entry(*action, actor.name(), page, params)?;
                Ok(Outcome::None)
            }
            Self::InvalidatePendingTimeCache => {
                storage.invalidate_pending_time();
                Ok(Outcome::None)
            }
            Self::TagRevisionAsMerged { rev_id } => {
                storage.tag_revision(*rev_id, MERGED_TAG)?;
                Ok(Outcome::None)
            }
            Self::RememberAnonId => Ok(Outcome::Token(Uuid::new_v4().simple().to_string())),
        }
    }
}
