//! Pending entries: queued edits awaiting a moderator.

use std::{fmt, str::FromStr};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{PageIdentity, PreloadId};

/// Where an entry stands. Terminal states are never left again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryStatus {
    Pending,
    Approved,
    Rejected,
    Merged,
}

impl EntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Merged => "merged",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "merged" => Ok(Self::Merged),
            other => Err(format!("unknown entry status: {other}")),
        }
    }
}

/// What kind of change an entry holds. Part of the uniqueness key when the
/// schema has a type column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryType {
    Edit,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Edit => "edit",
        }
    }
}

/// The candidate row handed to the upsert.
///
/// The pending-state columns (`mod_preloadable = 0`, `mod_status = 'pending'`)
/// are set by storage, not carried here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEntryFields {
    pub page: PageIdentity,
    pub preload_id: PreloadId,
    pub entry_type: EntryType,

    /// Account name or address of the submitter.
    pub submitter: String,
    pub anonymous: bool,

    /// Full new text of the page.
    pub text: String,
    pub summary: String,

    /// Section id for section edits; empty for whole-page edits.
    pub section: String,
    pub bot: bool,
    pub minor: bool,
    pub timestamp: Timestamp,
}

/// A row of the moderation table as read back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub id: i64,
    pub fields: PendingEntryFields,
    pub status: EntryStatus,

    /// Revision that absorbed this entry, once merged.
    pub merged_revid: Option<i64>,
}

/// The part of a pending entry the edit form needs to pre-fill itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEdit {
    pub id: i64,
    pub text: String,
    pub summary: String,
    pub section: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_its_own_rendering() {
        for status in [
            EntryStatus::Pending,
            EntryStatus::Approved,
            EntryStatus::Rejected,
            EntryStatus::Merged,
        ] {
            assert_eq!(status.as_str().parse::<EntryStatus>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!("deleted".parse::<EntryStatus>().is_err());
    }
}
