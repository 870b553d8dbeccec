//! Pending-time cache: the timestamp of the oldest pending entry.
//!
//! Computed on first read and kept until invalidated. Anything that adds or
//! resolves an entry invalidates it through a consequence.

use jiff::Timestamp;

use super::{Result, Storage, parse_timestamp};

impl Storage {
    /// Returns when the oldest still-pending entry was queued, if any.
    pub fn pending_time(&self) -> Result<Option<Timestamp>> {
        if let Some(cached) = self.pending_time.get() {
            return Ok(cached);
        }
        let mut stmt = self
            .conn
            .prepare("SELECT mod_timestamp FROM moderation WHERE mod_status = 'pending'")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut oldest: Option<Timestamp> = None;
        for raw in rows {
            let ts = parse_timestamp(&raw?, "mod_timestamp")?;
            oldest = Some(oldest.map_or(ts, |o| o.min(ts)));
        }
        self.pending_time.set(Some(oldest));
        Ok(oldest)
    }

    /// Drops the cached pending time so the next read recomputes it.
    pub fn invalidate_pending_time(&self) {
        self.pending_time.set(None);
    }
}
