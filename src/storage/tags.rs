//! Change tags attached to host revisions.

use super::{Result, Storage};

impl Storage {
    /// Attaches `tag` to a revision. Tagging twice is a no-op.
    pub fn tag_revision(&self, rev_id: i64, tag: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO change_tag (ct_rev_id, ct_tag) VALUES (?1, ?2)",
            rusqlite::params![rev_id, tag],
        )?;
        Ok(())
    }

    /// Tags on a revision, alphabetically.
    #[cfg(test)]
    pub fn revision_tags(&self, rev_id: i64) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT ct_tag FROM change_tag WHERE ct_rev_id = ?1 ORDER BY ct_tag")?;
        let tags = stmt
            .query_map([rev_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(tags)
    }
}
