use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde_json::Value;
use tracing::debug;

use super::Database;
use crate::error::Result;
use crate::models::ContactRecord;

const META_ETAG: &str = "etag";
const META_FETCHED_AT: &str = "fetched_at";

impl Database {
    // ==================== ENTRIES ====================

    /// Replace the cached feed with `entries`, keeping their order.
    /// Every entry must carry an id and title.
    pub fn save_entries(&mut self, entries: &[Value]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM entries", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO entries (short_id, payload, position) VALUES (?, ?, ?)",
            )?;
            for (position, entry) in entries.iter().enumerate() {
                let record = ContactRecord::from_entry(entry)?;
                let payload = serde_json::to_string(entry)?;
                stmt.execute(params![record.short_id(), payload, position as i64])?;
            }
        }
        tx.execute(
            "INSERT OR REPLACE INTO feed_meta (key, value) VALUES (?, ?)",
            params![META_FETCHED_AT, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        debug!(entries = entries.len(), "feed cache saved");
        Ok(())
    }

    /// Cached entries in feed order, or `None` if nothing was ever saved.
    pub fn load_entries(&self) -> Result<Option<Vec<Value>>> {
        if self.fetched_at()?.is_none() {
            return Ok(None);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM entries ORDER BY position")?;
        let payloads = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let entries = payloads
            .iter()
            .map(|p| serde_json::from_str(p))
            .collect::<std::result::Result<Vec<Value>, _>>()?;
        Ok(Some(entries))
    }

    pub fn entry_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ==================== FEED META ====================

    pub fn etag(&self) -> Result<Option<String>> {
        self.get_meta(META_ETAG)
    }

    pub fn set_etag(&self, etag: Option<&str>) -> Result<()> {
        match etag {
            Some(value) => self.set_meta(META_ETAG, value),
            None => {
                self.conn
                    .execute("DELETE FROM feed_meta WHERE key = ?", [META_ETAG])?;
                Ok(())
            }
        }
    }

    /// When the cache was last written.
    pub fn fetched_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.get_meta(META_FETCHED_AT)?.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }))
    }

    fn get_meta(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM feed_meta WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO feed_meta (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }
}
