//! Session storage: key/value pairs scoped to one session id.

use std::collections::HashMap;

use super::{Result, Storage};

impl Storage {
    /// Loads every value stored for a session. Unknown sessions are empty.
    pub fn load_session(&self, session_id: &str) -> Result<HashMap<String, String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM session WHERE session_id = ?1")?;
        let pairs = stmt
            .query_map([session_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<HashMap<String, String>>>()?;
        Ok(pairs)
    }

    /// Writes a session's values, replacing any stored under the same keys.
    pub fn save_session(&self, session_id: &str, values: &HashMap<String, String>) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO session (session_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT (session_id, key) DO UPDATE SET value = excluded.value",
        )?;
        for (key, value) in values {
            stmt.execute(rusqlite::params![session_id, key, value])?;
        }
        Ok(())
    }
}
