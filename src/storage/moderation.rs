//! Moderation table: upsert, lookup, and status transitions of pending entries.

use rusqlite::{OptionalExtension, Transaction, TransactionBehavior, params_from_iter, types::Value};
use serde::Deserialize;

use crate::{
    model::{
        EntryStatus, EntryType, PageIdentity, PendingEdit, PendingEntry, PendingEntryFields,
        PreloadId,
    },
    preload::PendingEditLookup,
};

use super::{Result, Storage, StorageError, parse_timestamp};

/// How [`Storage::upsert_entry`] talks to the database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertStrategy {
    /// A single `INSERT … ON CONFLICT DO UPDATE`, inside an immediate
    /// transaction that first reads the existing id.
    #[default]
    Native,

    /// `UPDATE`, then `INSERT OR IGNORE` if nothing matched. For backends
    /// without a native upsert.
    Emulated,
}

/// Which path an upsert took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertBranch {
    Inserted,
    Updated,

    /// Emulated upsert only: the update matched nothing, then the insert was
    /// ignored because a concurrent writer created the row in between. The id
    /// is the row that exists now, but this request did not write it.
    Ambiguous,
}

/// Result of an upsert: the affected row and how it was affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: i64,
    pub branch: UpsertBranch,
}

impl UpsertOutcome {
    /// Whether an existing row was (or may have been) updated.
    ///
    /// Ambiguous outcomes count as updates.
    pub fn is_update(&self) -> bool {
        !matches!(self.branch, UpsertBranch::Inserted)
    }
}

impl Storage {
    // ── Upsert ──

    /// Inserts a pending entry, or updates the pending entry with the same
    /// uniqueness key. Returns the affected row id and the branch taken.
    ///
    /// The native strategy opens its own transaction, so it must not be
    /// called while another transaction is open on this connection.
    pub fn upsert_entry(&self, fields: &PendingEntryFields) -> Result<UpsertOutcome> {
        match self.upsert {
            UpsertStrategy::Native => self.upsert_native(fields),
            UpsertStrategy::Emulated => self.upsert_emulated(fields),
        }
    }

    fn upsert_native(&self, fields: &PendingEntryFields) -> Result<UpsertOutcome> {
        let row = self.row_values(fields);
        let unique = self.unique_columns();
        let columns: Vec<&str> = row.iter().map(|(c, _)| *c).collect();
        let placeholders: Vec<String> = (1..=row.len()).map(|i| format!("?{i}")).collect();
        let updates: Vec<String> = columns
            .iter()
            .filter(|c| !unique.contains(*c))
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();
        let sql = format!(
            "INSERT INTO moderation ({}) VALUES ({})
             ON CONFLICT ({}) DO UPDATE SET {}
             RETURNING mod_id",
            columns.join(", "),
            placeholders.join(", "),
            unique.join(", "),
            updates.join(", "),
        );

        // Immediate: take the write lock before reading, so the existing-id
        // check and the write see the same table.
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let existing = self.select_pending_id(fields)?;
        let id: i64 = tx.query_row(
            &sql,
            params_from_iter(row.into_iter().map(|(_, v)| v)),
            |r| r.get(0),
        )?;
        tx.commit()?;

        let branch = if existing == Some(id) {
            UpsertBranch::Updated
        } else {
            UpsertBranch::Inserted
        };
        Ok(UpsertOutcome { id, branch })
    }

    /// Update-then-insert. The id is always read back by key: the
    /// last-insert id says nothing about a row that was updated.
    fn upsert_emulated(&self, fields: &PendingEntryFields) -> Result<UpsertOutcome> {
        let row = self.row_values(fields);
        let unique = self.unique_columns();

        let (key, rest): (Vec<_>, Vec<_>) = row.iter().partition(|(c, _)| unique.contains(c));
        let sets: Vec<String> = rest
            .iter()
            .enumerate()
            .map(|(i, (c, _))| format!("{c} = ?{}", i + 1))
            .collect();
        let conditions: Vec<String> = key
            .iter()
            .enumerate()
            .map(|(i, (c, _))| format!("{c} = ?{}", rest.len() + i + 1))
            .collect();
        let update = format!(
            "UPDATE moderation SET {} WHERE {}",
            sets.join(", "),
            conditions.join(" AND "),
        );
        let updated = self.conn.execute(
            &update,
            params_from_iter(rest.iter().chain(key.iter()).map(|(_, v)| v)),
        )?;

        let branch = if updated > 0 {
            UpsertBranch::Updated
        } else {
            let columns: Vec<&str> = row.iter().map(|(c, _)| *c).collect();
            let placeholders: Vec<String> = (1..=row.len()).map(|i| format!("?{i}")).collect();
            let insert = format!(
                "INSERT OR IGNORE INTO moderation ({}) VALUES ({})",
                columns.join(", "),
                placeholders.join(", "),
            );
            let inserted = self
                .conn
                .execute(&insert, params_from_iter(row.iter().map(|(_, v)| v)))?;
            if inserted > 0 {
                UpsertBranch::Inserted
            } else {
                UpsertBranch::Ambiguous
            }
        };

        let id = self.select_pending_id(fields)?.ok_or_else(|| {
            StorageError::Corrupt("upserted moderation row is missing".into())
        })?;
        if branch == UpsertBranch::Ambiguous {
            tracing::warn!(mod_id = id, "upsert raced with a concurrent insert");
        }
        Ok(UpsertOutcome { id, branch })
    }

    /// Column values of a new pending row, in insert order.
    fn row_values(&self, fields: &PendingEntryFields) -> Vec<(&'static str, Value)> {
        let mut row = vec![
            ("mod_timestamp", Value::Text(fields.timestamp.to_string())),
            ("mod_user_text", Value::Text(fields.submitter.clone())),
            ("mod_anonymous", Value::Integer(i64::from(fields.anonymous))),
            ("mod_namespace", Value::Integer(i64::from(fields.page.namespace))),
            ("mod_title", Value::Text(fields.page.title.clone())),
            ("mod_comment", Value::Text(fields.summary.clone())),
            ("mod_minor", Value::Integer(i64::from(fields.minor))),
            ("mod_bot", Value::Integer(i64::from(fields.bot))),
            ("mod_text", Value::Text(fields.text.clone())),
            ("mod_section", Value::Text(fields.section.clone())),
            ("mod_preload_id", Value::Text(fields.preload_id.as_str().to_string())),
            ("mod_preloadable", Value::Integer(0)),
            ("mod_status", Value::Text(EntryStatus::Pending.as_str().to_string())),
        ];
        if self.supports_typed_entries() {
            row.push(("mod_type", Value::Text(fields.entry_type.as_str().to_string())));
        }
        row
    }

    /// Id of the pending row sharing `fields`' uniqueness key, if any.
    fn select_pending_id(&self, fields: &PendingEntryFields) -> Result<Option<i64>> {
        let mut sql = String::from(
            "SELECT mod_id FROM moderation
             WHERE mod_preloadable = 0 AND mod_namespace = ?1 AND mod_title = ?2
               AND mod_preload_id = ?3",
        );
        let mut params = vec![
            Value::Integer(i64::from(fields.page.namespace)),
            Value::Text(fields.page.title.clone()),
            Value::Text(fields.preload_id.as_str().to_string()),
        ];
        if self.supports_typed_entries() {
            sql.push_str(" AND mod_type = ?4");
            params.push(Value::Text(fields.entry_type.as_str().to_string()));
        }
        Ok(self
            .conn
            .query_row(&sql, params_from_iter(params), |r| r.get(0))
            .optional()?)
    }

    // ── Lookup ──

    /// Loads one entry by id, in any status.
    pub fn load_entry(&self, id: i64) -> Result<Option<PendingEntry>> {
        let sql = format!(
            "SELECT {} FROM moderation WHERE mod_id = ?1",
            self.entry_columns()
        );
        let raw = self
            .conn
            .query_row(&sql, [id], RawEntry::from_row)
            .optional()?;
        raw.map(RawEntry::into_entry).transpose()
    }

    /// Lists entries with the given status, oldest first.
    pub fn list_entries(&self, status: EntryStatus) -> Result<Vec<PendingEntry>> {
        let sql = format!(
            "SELECT {} FROM moderation WHERE mod_status = ?1",
            self.entry_columns()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([status.as_str()], RawEntry::from_row)?;
        let mut entries = Vec::new();
        for raw in rows {
            entries.push(raw?.into_entry()?);
        }
        entries.sort_by(|a, b| a.fields.timestamp.cmp(&b.fields.timestamp));
        Ok(entries)
    }

    fn entry_columns(&self) -> String {
        let entry_type = if self.supports_typed_entries() {
            "mod_type"
        } else {
            "'edit'"
        };
        format!(
            "mod_id, mod_timestamp, mod_user_text, mod_anonymous, mod_namespace, mod_title,
             mod_comment, mod_minor, mod_bot, mod_text, mod_section, mod_preload_id,
             mod_status, mod_merged_revid, {entry_type}"
        )
    }

    // ── Status transitions ──

    /// Marks a pending entry as merged into `rev_id`.
    ///
    /// Returns `false` if the entry doesn't exist or is no longer pending.
    pub fn mark_merged(&self, id: i64, rev_id: i64) -> Result<bool> {
        self.resolve_entry(id, EntryStatus::Merged, Some(rev_id), None)
    }

    /// Marks a pending entry as approved.
    pub fn mark_approved(&self, id: i64) -> Result<bool> {
        self.resolve_entry(id, EntryStatus::Approved, None, None)
    }

    /// Marks a pending entry as rejected by `moderator`.
    pub fn mark_rejected(&self, id: i64, moderator: &str) -> Result<bool> {
        self.resolve_entry(id, EntryStatus::Rejected, None, Some(moderator))
    }

    /// Moves a pending entry into a terminal status.
    ///
    /// Setting `mod_preloadable` to the row's own id takes the row out of the
    /// uniqueness key, so the submitter can queue a new edit of the page.
    fn resolve_entry(
        &self,
        id: i64,
        status: EntryStatus,
        merged_revid: Option<i64>,
        rejected_by: Option<&str>,
    ) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE moderation
             SET mod_status = ?2, mod_preloadable = mod_id,
                 mod_merged_revid = ?3, mod_rejected_by = ?4
             WHERE mod_id = ?1 AND mod_status = 'pending'",
            rusqlite::params![id, status.as_str(), merged_revid, rejected_by],
        )?;
        Ok(rows > 0)
    }
}

impl PendingEditLookup for Storage {
    fn find_pending_edit(
        &self,
        preload_id: &PreloadId,
        page: &PageIdentity,
    ) -> Result<Option<PendingEdit>> {
        let mut sql = String::from(
            "SELECT mod_id, mod_text, mod_comment, mod_section FROM moderation
             WHERE mod_namespace = ?1 AND mod_title = ?2 AND mod_preload_id = ?3
               AND mod_preloadable = 0",
        );
        if self.supports_typed_entries() {
            sql.push_str(" AND mod_type = 'edit'");
        }
        Ok(self
            .conn
            .query_row(
                &sql,
                rusqlite::params![page.namespace, &page.title, preload_id.as_str()],
                |row| {
                    Ok(PendingEdit {
                        id: row.get(0)?,
                        text: row.get(1)?,
                        summary: row.get(2)?,
                        section: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }
}

/// Column values as read, before validation.
struct RawEntry {
    id: i64,
    timestamp: String,
    submitter: String,
    anonymous: bool,
    namespace: i32,
    title: String,
    summary: String,
    minor: bool,
    bot: bool,
    text: String,
    section: String,
    preload_id: String,
    status: String,
    merged_revid: Option<i64>,
    entry_type: String,
}

impl RawEntry {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            submitter: row.get(2)?,
            anonymous: row.get(3)?,
            namespace: row.get(4)?,
            title: row.get(5)?,
            summary: row.get(6)?,
            minor: row.get(7)?,
            bot: row.get(8)?,
            text: row.get(9)?,
            section: row.get(10)?,
            preload_id: row.get(11)?,
            status: row.get(12)?,
            merged_revid: row.get(13)?,
            entry_type: row.get(14)?,
        })
    }

    fn into_entry(self) -> Result<PendingEntry> {
        let entry_type = match self.entry_type.as_str() {
            "edit" => EntryType::Edit,
            other => {
                return Err(StorageError::Corrupt(format!("unknown entry type: {other}")));
            }
        };
        let status = self.status.parse::<EntryStatus>().map_err(StorageError::Corrupt)?;

        Ok(PendingEntry {
            id: self.id,
            fields: PendingEntryFields {
                page: PageIdentity::new(self.namespace, self.title),
                preload_id: PreloadId::from_stored(self.preload_id),
                entry_type,
                submitter: self.submitter,
                anonymous: self.anonymous,
                text: self.text,
                summary: self.summary,
                section: self.section,
                bot: self.bot,
                minor: self.minor,
                timestamp: parse_timestamp(&self.timestamp, "mod_timestamp")?,
            },
            status,
            merged_revid: self.merged_revid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::Timestamp;

    use crate::storage::tests::{legacy_storage, test_storage};

    fn sample_fields() -> PendingEntryFields {
        PendingEntryFields {
            page: PageIdentity::new(0, "Lake Baikal"),
            preload_id: PreloadId::for_user("Alice"),
            entry_type: EntryType::Edit,
            submitter: "Alice".into(),
            anonymous: false,
            text: "Deepest lake.".into(),
            summary: "first draft".into(),
            section: String::new(),
            bot: false,
            minor: false,
            timestamp: Timestamp::new(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn same_key_updates_the_existing_row() {
        let (_dir, storage) = test_storage();
        let first = sample_fields();
        let mut second = sample_fields();
        second.text = "Deepest and oldest lake.".into();
        second.summary = "second draft".into();

        let a = storage.upsert_entry(&first).unwrap();
        let b = storage.upsert_entry(&second).unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(a.branch, UpsertBranch::Inserted);
        assert_eq!(b.branch, UpsertBranch::Updated);

        let pending = storage.list_entries(EntryStatus::Pending).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].fields.text, "Deepest and oldest lake.");
        assert_eq!(pending[0].fields.summary, "second draft");
    }

    #[test]
    fn distinct_keys_get_distinct_rows() {
        let (_dir, storage) = test_storage();
        let alice = sample_fields();
        let mut bob = sample_fields();
        bob.preload_id = PreloadId::for_user("Bob");
        let mut other_page = sample_fields();
        other_page.page = PageIdentity::new(0, "Lake Ladoga");
        let mut talk = sample_fields();
        talk.page = PageIdentity::new(1, "Lake Baikal");

        let ids: Vec<i64> = [alice, bob, other_page, talk]
            .iter()
            .map(|f| storage.upsert_entry(f).unwrap().id)
            .collect();

        let mut unique = ids.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn update_is_detected_after_unrelated_inserts() {
        let (_dir, storage) = test_storage();
        let first = storage.upsert_entry(&sample_fields()).unwrap();
        storage.tag_revision(first.id, "moderation-merged").unwrap();

        let again = storage.upsert_entry(&sample_fields()).unwrap();

        assert_eq!(again.id, first.id);
        assert!(again.is_update());
    }

    #[test]
    fn emulated_strategy_reports_both_branches() {
        let (_dir, storage) = test_storage();
        let storage = storage.with_upsert_strategy(UpsertStrategy::Emulated);
        let mut fields = sample_fields();

        let a = storage.upsert_entry(&fields).unwrap();
        fields.text = "Revised.".into();
        let b = storage.upsert_entry(&fields).unwrap();

        assert_eq!(a.branch, UpsertBranch::Inserted);
        assert_eq!(b.branch, UpsertBranch::Updated);
        assert_eq!(a.id, b.id);
        assert_eq!(
            storage.load_entry(a.id).unwrap().unwrap().fields.text,
            "Revised."
        );
    }

    #[test]
    fn emulated_strategy_flags_a_lost_insert_race() {
        let (_dir, storage) = test_storage();
        let storage = storage.with_upsert_strategy(UpsertStrategy::Emulated);
        // Another writer creates the same-key row between our UPDATE and INSERT.
        storage
            .conn
            .execute_batch(
                "CREATE TEMP TRIGGER concurrent_writer BEFORE INSERT ON moderation
                 BEGIN
                     INSERT INTO moderation
                         (mod_timestamp, mod_user_text, mod_namespace, mod_title, mod_text,
                          mod_preload_id, mod_type)
                     VALUES
                         (NEW.mod_timestamp, NEW.mod_user_text, NEW.mod_namespace,
                          NEW.mod_title, 'theirs', NEW.mod_preload_id, NEW.mod_type);
                 END;",
            )
            .unwrap();

        let outcome = storage.upsert_entry(&sample_fields()).unwrap();

        assert_eq!(outcome.branch, UpsertBranch::Ambiguous);
        assert!(outcome.is_update());
        let pending = storage.list_entries(EntryStatus::Pending).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, outcome.id);
        assert_eq!(pending[0].fields.text, "theirs");
    }

    #[test]
    fn only_inserts_count_as_fresh() {
        for (branch, update) in [
            (UpsertBranch::Inserted, false),
            (UpsertBranch::Updated, true),
            (UpsertBranch::Ambiguous, true),
        ] {
            assert_eq!(UpsertOutcome { id: 3, branch }.is_update(), update);
        }
    }

    #[test]
    fn legacy_schema_upserts_without_type() {
        let storage = legacy_storage();
        let a = storage.upsert_entry(&sample_fields()).unwrap();
        let b = storage.upsert_entry(&sample_fields()).unwrap();

        assert_eq!(a.id, b.id);
        let loaded = storage.load_entry(a.id).unwrap().unwrap();
        assert_eq!(loaded.fields.entry_type, EntryType::Edit);
    }

    #[test]
    fn resolved_entry_leaves_the_uniqueness_key() {
        let (_dir, storage) = test_storage();
        let first = storage.upsert_entry(&sample_fields()).unwrap();
        assert!(storage.mark_rejected(first.id, "Mod").unwrap());

        let second = storage.upsert_entry(&sample_fields()).unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(second.branch, UpsertBranch::Inserted);
    }

    #[test]
    fn terminal_status_is_never_left() {
        let (_dir, storage) = test_storage();
        let id = storage.upsert_entry(&sample_fields()).unwrap().id;

        assert!(storage.mark_merged(id, 99).unwrap());
        assert!(!storage.mark_approved(id).unwrap());
        assert!(!storage.mark_rejected(id, "Mod").unwrap());
        assert!(!storage.mark_merged(id, 100).unwrap());

        let entry = storage.load_entry(id).unwrap().unwrap();
        assert_eq!(entry.status, EntryStatus::Merged);
        assert_eq!(entry.merged_revid, Some(99));
    }

    #[test]
    fn mark_missing_entry_returns_false() {
        let (_dir, storage) = test_storage();
        assert!(!storage.mark_approved(404).unwrap());
    }

    #[test]
    fn find_pending_edit_matches_submitter_and_page() {
        let (_dir, storage) = test_storage();
        let id = storage.upsert_entry(&sample_fields()).unwrap().id;
        let page = PageIdentity::new(0, "Lake Baikal");

        let found = storage
            .find_pending_edit(&PreloadId::for_user("Alice"), &page)
            .unwrap()
            .unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.text, "Deepest lake.");

        let other = storage
            .find_pending_edit(&PreloadId::for_user("Bob"), &page)
            .unwrap();
        assert!(other.is_none());
    }

    #[test]
    fn find_pending_edit_skips_resolved_entries() {
        let (_dir, storage) = test_storage();
        let id = storage.upsert_entry(&sample_fields()).unwrap().id;
        storage.mark_approved(id).unwrap();

        let found = storage
            .find_pending_edit(
                &PreloadId::for_user("Alice"),
                &PageIdentity::new(0, "Lake Baikal"),
            )
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn list_entries_sorted_by_timestamp() {
        let (_dir, storage) = test_storage();
        let mut late = sample_fields();
        late.timestamp = Timestamp::new(2_000_000_000, 0).unwrap();
        late.page = PageIdentity::new(0, "Second");
        let mut early = sample_fields();
        early.timestamp = Timestamp::new(1_000_000_000, 0).unwrap();
        early.page = PageIdentity::new(0, "First");

        // Insert in reverse order to verify sorting.
        storage.upsert_entry(&late).unwrap();
        storage.upsert_entry(&early).unwrap();

        let pending = storage.list_entries(EntryStatus::Pending).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].fields.page.title, "First");
        assert_eq!(pending[1].fields.page.title, "Second");
    }
}
