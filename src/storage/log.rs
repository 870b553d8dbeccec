//! Audit log of moderator decisions.

use std::collections::BTreeMap;

use jiff::Timestamp;

use crate::model::{LogAction, PageIdentity};

use super::{Result, Storage, StorageError, parse_timestamp};

/// One audit log row.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub id: i64,
    pub action: LogAction,
    pub actor: String,
    pub page: PageIdentity,
    pub params: BTreeMap<String, serde_json::Value>,
    pub timestamp: Timestamp,
}

impl Storage {
    /// Appends an audit log entry and returns its id.
    pub fn add_log_entry(
        &self,
        action: LogAction,
        actor: &str,
        page: &PageIdentity,
        params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<i64> {
        let params = serde_json::to_string(params)?;
        self.conn.execute(
            "INSERT INTO moderation_log
                 (log_action, log_actor, log_namespace, log_title, log_params, log_timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                action.as_str(),
                actor,
                page.namespace,
                &page.title,
                params,
                Timestamp::now().to_string(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Loads the whole audit log in insertion order.
    pub fn load_log(&self) -> Result<Vec<LogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT log_id, log_action, log_actor, log_namespace, log_title, log_params,
                    log_timestamp
             FROM moderation_log ORDER BY log_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i32>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, action, actor, namespace, title, params, timestamp) = row?;
            entries.push(LogEntry {
                id,
                action: action.parse().map_err(StorageError::Corrupt)?,
                actor,
                page: PageIdentity::new(namespace, title),
                params: serde_json::from_str(&params)?,
                timestamp: parse_timestamp(&timestamp, "log_timestamp")?,
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::storage::tests::test_storage;

    #[test]
    fn add_and_load_log_entries() {
        let (_dir, storage) = test_storage();
        let page = PageIdentity::new(0, "Lake Baikal");
        let params = BTreeMap::from([
            ("modid".to_string(), json!(5)),
            ("revid".to_string(), json!(41)),
        ]);

        storage
            .add_log_entry(LogAction::Merge, "Mod", &page, &params)
            .unwrap();
        storage
            .add_log_entry(LogAction::Reject, "Mod", &page, &BTreeMap::new())
            .unwrap();

        let log = storage.load_log().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].action, LogAction::Merge);
        assert_eq!(log[0].params, params);
        assert_eq!(log[0].page, page);
        assert_eq!(log[1].action, LogAction::Reject);
    }

    #[test]
    fn empty_log() {
        let (_dir, storage) = test_storage();
        assert!(storage.load_log().unwrap().is_empty());
    }
}
