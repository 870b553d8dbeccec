//! Moderator actions on queued entries.
//!
//! Each action checks that the entry exists and is still pending, then emits
//! its consequences through the manager. A missing or already resolved entry
//! fails before anything is emitted.

use std::{collections::BTreeMap, str::FromStr};

use serde_json::json;

use crate::{
    consequence::{Consequence, ConsequenceManager},
    error::{ModerationError, Result},
    intercept::record_merge,
    model::{EntryStatus, Identity, LogAction, PendingEntry},
    storage::Storage,
};

/// A moderator action, as named in requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    Approve,
    Reject,
    Merge,
}

impl ModerationAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Merge => "merge",
        }
    }
}

impl FromStr for ModerationAction {
    type Err = ModerationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            "merge" => Ok(Self::Merge),
            other => Err(ModerationError::UnknownAction(other.to_string())),
        }
    }
}

/// Carries out moderator actions.
pub struct ActionHandler<'a> {
    storage: &'a Storage,
    manager: &'a dyn ConsequenceManager,
}

impl<'a> ActionHandler<'a> {
    pub fn new(storage: &'a Storage, manager: &'a dyn ConsequenceManager) -> Self {
        Self { storage, manager }
    }

    pub fn approve(&self, mod_id: i64, moderator: &Identity) -> Result<()> {
        let entry = self.pending_entry(mod_id)?;
        self.resolve(
            &entry,
            Consequence::MarkAsApproved { mod_id },
            LogAction::Approve,
            moderator,
        )
    }

    pub fn reject(&self, mod_id: i64, moderator: &Identity) -> Result<()> {
        let entry = self.pending_entry(mod_id)?;
        self.resolve(
            &entry,
            Consequence::MarkAsRejected {
                mod_id,
                moderator: moderator.name().to_string(),
            },
            LogAction::Reject,
            moderator,
        )
    }

    /// Records that the moderator saved revision `rev_id` merging the entry.
    pub fn merge(&self, mod_id: i64, rev_id: i64, moderator: &Identity) -> Result<()> {
        let entry = self.pending_entry(mod_id)?;
        record_merge(self.manager, mod_id, rev_id, moderator, &entry.fields.page)
    }

    fn resolve(
        &self,
        entry: &PendingEntry,
        mark: Consequence,
        action: LogAction,
        moderator: &Identity,
    ) -> Result<()> {
        let marked = self.manager.add(mark)?.flag().unwrap_or(false);
        if !marked {
            // Resolved by someone else since we looked.
            return Err(ModerationError::EntryNotFound(entry.id));
        }

        self.manager.add(Consequence::AddLogEntry {
            action,
            actor: moderator.clone(),
            page: entry.fields.page.clone(),
            params: BTreeMap::from([
                ("modid".to_string(), json!(entry.id)),
                ("user".to_string(), json!(entry.fields.submitter)),
            ]),
        })?;
        self.manager.add(Consequence::InvalidatePendingTimeCache)?;

        tracing::info!(
            mod_id = entry.id,
            action = action.as_str(),
            moderator = moderator.name(),
            "entry resolved"
        );
        Ok(())
    }

    fn pending_entry(&self, mod_id: i64) -> Result<PendingEntry> {
        match self.storage.load_entry(mod_id)? {
            Some(entry) if entry.status == EntryStatus::Pending => Ok(entry),
            _ => Err(ModerationError::EntryNotFound(mod_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::Timestamp;

    use crate::{
        consequence::{ConsequenceKind, MERGED_TAG, Outcome, RealManager, RecordingManager},
        model::{EntryType, PageIdentity, PendingEntryFields, PreloadId},
        storage::tests::test_storage,
    };

    fn queue_sample(storage: &Storage) -> i64 {
        let fields = PendingEntryFields {
            page: PageIdentity::new(0, "Lake Baikal"),
            preload_id: PreloadId::for_user("Alice"),
            entry_type: EntryType::Edit,
            submitter: "Alice".into(),
            anonymous: false,
            text: "Deepest lake.".into(),
            summary: String::new(),
            section: String::new(),
            bot: false,
            minor: false,
            timestamp: Timestamp::now(),
        };
        storage.upsert_entry(&fields).unwrap().id
    }

    #[test]
    fn parses_known_actions() {
        assert_eq!(
            "approve".parse::<ModerationAction>().unwrap(),
            ModerationAction::Approve
        );
        assert_eq!(
            "merge".parse::<ModerationAction>().unwrap(),
            ModerationAction::Merge
        );
    }

    #[test]
    fn unknown_action_is_an_error() {
        let err = "findgirlfriend".parse::<ModerationAction>().unwrap_err();
        assert!(matches!(err, ModerationError::UnknownAction(ref a) if a == "findgirlfriend"));
    }

    #[test]
    fn approve_emits_mark_log_invalidate() {
        let (_dir, storage) = test_storage();
        let id = queue_sample(&storage);
        let manager = RecordingManager::new();
        manager.mock_result(ConsequenceKind::MarkAsApproved, Outcome::Flag(true));
        let moderator = Identity::registered("Mod");

        ActionHandler::new(&storage, &manager)
            .approve(id, &moderator)
            .unwrap();

        assert_eq!(
            manager.consequences(),
            vec![
                Consequence::MarkAsApproved { mod_id: id },
                Consequence::AddLogEntry {
                    action: LogAction::Approve,
                    actor: moderator,
                    page: PageIdentity::new(0, "Lake Baikal"),
                    params: BTreeMap::from([
                        ("modid".to_string(), json!(id)),
                        ("user".to_string(), json!("Alice")),
                    ]),
                },
                Consequence::InvalidatePendingTimeCache,
            ]
        );
    }

    #[test]
    fn missing_entry_emits_nothing() {
        let (_dir, storage) = test_storage();
        let manager = RecordingManager::new();
        let handler = ActionHandler::new(&storage, &manager);
        let moderator = Identity::registered("Mod");

        for result in [
            handler.approve(404, &moderator),
            handler.reject(404, &moderator),
            handler.merge(404, 1, &moderator),
        ] {
            assert!(matches!(result, Err(ModerationError::EntryNotFound(404))));
        }
        assert!(manager.consequences().is_empty());
    }

    #[test]
    fn lost_race_stops_after_mark() {
        let (_dir, storage) = test_storage();
        let id = queue_sample(&storage);
        let manager = RecordingManager::new();
        manager.mock_result(ConsequenceKind::MarkAsRejected, Outcome::Flag(false));

        let err = ActionHandler::new(&storage, &manager)
            .reject(id, &Identity::registered("Mod"))
            .unwrap_err();

        assert!(matches!(err, ModerationError::EntryNotFound(_)));
        assert_eq!(manager.consequences().len(), 1);
    }

    #[test]
    fn resolved_entry_cannot_be_acted_on_again() {
        let (_dir, storage) = test_storage();
        let id = queue_sample(&storage);
        let manager = RealManager::new(&storage);
        let handler = ActionHandler::new(&storage, &manager);
        let moderator = Identity::registered("Mod");

        handler.approve(id, &moderator).unwrap();
        let err = handler.reject(id, &moderator).unwrap_err();

        assert!(matches!(err, ModerationError::EntryNotFound(_)));
        let entry = storage.load_entry(id).unwrap().unwrap();
        assert_eq!(entry.status, EntryStatus::Approved);
    }

    #[test]
    fn merge_runs_against_storage() {
        let (_dir, storage) = test_storage();
        let id = queue_sample(&storage);
        let manager = RealManager::new(&storage);

        ActionHandler::new(&storage, &manager)
            .merge(id, 501, &Identity::registered("Mod"))
            .unwrap();

        let entry = storage.load_entry(id).unwrap().unwrap();
        assert_eq!(entry.status, EntryStatus::Merged);
        assert_eq!(entry.merged_revid, Some(501));
        assert_eq!(storage.revision_tags(501).unwrap(), vec![MERGED_TAG]);

        let log = storage.load_log().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, LogAction::Merge);
        assert_eq!(log[0].params["revid"], json!(501));
    }

    #[test]
    fn reject_records_moderator() {
        let (_dir, storage) = test_storage();
        let id = queue_sample(&storage);
        let manager = RealManager::new(&storage);

        ActionHandler::new(&storage, &manager)
            .reject(id, &Identity::registered("Mod"))
            .unwrap();

        assert_eq!(
            storage.load_entry(id).unwrap().unwrap().status,
            EntryStatus::Rejected
        );
        assert_eq!(storage.load_log().unwrap()[0].actor, "Mod");
    }
}
