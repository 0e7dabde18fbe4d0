//! `SQLite` session store.
//!
//! Persists history entries and the prompt/completion audit log so that
//! `kvwarm history` can show what earlier warm-ups sent and received.

// SQLite stores all integers as i64. These casts are intentional and safe
// because we only store non-negative values that fit in usize.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

use crate::core::{ChatMessage, PromptLog, Role};
use crate::error::{Result, StorageError};
use crate::storage::schema::{
    CHECK_SCHEMA_SQL, CURRENT_SCHEMA_VERSION, GET_VERSION_SQL, SCHEMA_SQL, SET_VERSION_SQL,
};
use crate::storage::traits::{SessionEntry, SessionStats, SessionStore};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};

/// Columns of a `history_entries` row before decoding.
type RawEntry = (String, String, String, bool, Option<bool>, Option<f64>);

/// SQLite-backed session store.
///
/// # Examples
///
/// ```no_run
/// use kvwarm::storage::{SessionStore, SqliteSessionStore};
///
/// let mut store = SqliteSessionStore::open(".kvwarm/history.db").unwrap();
/// store.init().unwrap();
/// ```
pub struct SqliteSessionStore {
    /// `SQLite` connection.
    conn: Connection,
    /// Path to the database file (None for in-memory).
    path: Option<PathBuf>,
}

impl SqliteSessionStore {
    /// Opens or creates a database at the given path, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Database(e.to_string()))?;
        }

        let conn = Connection::open(&path).map_err(StorageError::from)?;

        // Use WAL mode for better concurrent access (returns result, use query_row)
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(StorageError::from)?;

        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Creates an in-memory database. Useful for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        Ok(Self { conn, path: None })
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn get_schema_version(&self) -> Result<Option<u32>> {
        let version: Option<String> = self
            .conn
            .query_row(GET_VERSION_SQL, [], |row| row.get(0))
            .optional()
            .map_err(StorageError::from)?;

        Ok(version.and_then(|v| v.parse().ok()))
    }

    /// Maps a position to its row id.
    fn row_id(&self, index: usize) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT id FROM history_entries ORDER BY id LIMIT 1 OFFSET ?",
                params![index as i64],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)?
            .ok_or_else(|| StorageError::EntryNotFound { index }.into())
    }

    fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<RawEntry> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get::<_, i64>(3)? != 0,
            row.get::<_, Option<i64>>(4)?.map(|v| v != 0),
            row.get(5)?,
        ))
    }

    fn decode_entry(
        (role, content, items, hidden, did_prune, context_percentage): RawEntry,
    ) -> Result<SessionEntry> {
        let role = Role::parse(&role)
            .ok_or_else(|| StorageError::Serialization(format!("unknown role: {role}")))?;
        let context_items = serde_json::from_str(&items).map_err(StorageError::from)?;
        Ok(SessionEntry {
            message: ChatMessage { role, content },
            context_items,
            hidden,
            did_prune,
            context_percentage,
        })
    }

    /// Returns current Unix timestamp.
    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

impl SessionStore for SqliteSessionStore {
    fn init(&mut self) -> Result<()> {
        let is_init: i64 = self
            .conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;

        if is_init == 0 {
            self.conn
                .execute_batch(SCHEMA_SQL)
                .map_err(StorageError::from)?;
            self.conn
                .execute(SET_VERSION_SQL, params![CURRENT_SCHEMA_VERSION.to_string()])
                .map_err(StorageError::from)?;
        } else if let Some(current) = self.get_schema_version()?
            && current > CURRENT_SCHEMA_VERSION
        {
            return Err(StorageError::Migration(format!(
                "database schema v{current} is newer than supported v{CURRENT_SCHEMA_VERSION}"
            ))
            .into());
        }

        Ok(())
    }

    fn push_entry(&mut self, entry: SessionEntry) -> Result<usize> {
        let items = serde_json::to_string(&entry.context_items).map_err(StorageError::from)?;
        let now = Self::now();
        self.conn
            .execute(
                r"
            INSERT INTO history_entries
                (role, content, context_items, hidden, did_prune, context_percentage, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ",
                params![
                    entry.message.role.as_str(),
                    entry.message.content,
                    items,
                    i64::from(entry.hidden),
                    entry.did_prune.map(i64::from),
                    entry.context_percentage,
                    now,
                    now
                ],
            )
            .map_err(StorageError::from)?;

        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM history_entries", [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(count as usize - 1)
    }

    fn update_entry(&mut self, index: usize, entry: &SessionEntry) -> Result<()> {
        let id = self.row_id(index)?;
        let items = serde_json::to_string(&entry.context_items).map_err(StorageError::from)?;
        self.conn
            .execute(
                r"
            UPDATE history_entries
            SET role = ?, content = ?, context_items = ?, hidden = ?,
                did_prune = ?, context_percentage = ?, updated_at = ?
            WHERE id = ?
        ",
                params![
                    entry.message.role.as_str(),
                    entry.message.content,
                    items,
                    i64::from(entry.hidden),
                    entry.did_prune.map(i64::from),
                    entry.context_percentage,
                    Self::now(),
                    id
                ],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn entry(&self, index: usize) -> Result<Option<SessionEntry>> {
        let raw = self
            .conn
            .query_row(
                r"
            SELECT role, content, context_items, hidden, did_prune, context_percentage
            FROM history_entries ORDER BY id LIMIT 1 OFFSET ?
        ",
                params![index as i64],
                Self::entry_from_row,
            )
            .optional()
            .map_err(StorageError::from)?;
        raw.map(Self::decode_entry).transpose()
    }

    fn set_hidden(&mut self, index: usize, hidden: bool) -> Result<()> {
        let id = self.row_id(index)?;
        self.conn
            .execute(
                "UPDATE history_entries SET hidden = ?, updated_at = ? WHERE id = ?",
                params![i64::from(hidden), Self::now(), id],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<SessionEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                r"
            SELECT role, content, context_items, hidden, did_prune, context_percentage
            FROM history_entries ORDER BY id
        ",
            )
            .map_err(StorageError::from)?;

        let rows = stmt
            .query_map([], Self::entry_from_row)
            .map_err(StorageError::from)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(Self::decode_entry(row.map_err(StorageError::from)?)?);
        }
        Ok(entries)
    }

    fn append_prompt_log(&mut self, log: &PromptLog) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO prompt_logs (model_title, prompt, completion, created_at) VALUES (?, ?, ?, ?)",
                params![log.model_title, log.prompt, log.completion, Self::now()],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn prompt_logs(&self) -> Result<Vec<PromptLog>> {
        let mut stmt = self
            .conn
            .prepare("SELECT model_title, prompt, completion FROM prompt_logs ORDER BY id")
            .map_err(StorageError::from)?;

        let logs = stmt
            .query_map([], |row| {
                Ok(PromptLog {
                    model_title: row.get(0)?,
                    prompt: row.get(1)?,
                    completion: row.get(2)?,
                })
            })
            .map_err(StorageError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StorageError::from)?;
        Ok(logs)
    }

    fn reset(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                r"
            DELETE FROM prompt_logs;
            DELETE FROM history_entries;
        ",
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn stats(&self) -> Result<SessionStats> {
        let (entry_count, hidden_count): (i64, i64) = self
            .conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(hidden), 0) FROM history_entries",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(StorageError::from)?;

        let prompt_log_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM prompt_logs", [], |row| row.get(0))
            .map_err(StorageError::from)?;

        let db_size = self
            .path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok().map(|m| m.len()));

        Ok(SessionStats {
            entry_count: entry_count as usize,
            hidden_count: hidden_count as usize,
            prompt_log_count: prompt_log_count as usize,
            db_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ContextItem;
    use crate::error::Error;

    fn setup() -> SqliteSessionStore {
        let mut store = SqliteSessionStore::in_memory().unwrap();
        store.init().unwrap();
        store
    }

    #[test]
    fn test_init_idempotent() {
        let mut store = SqliteSessionStore::in_memory().unwrap();
        assert!(store.init().is_ok());
        assert!(store.init().is_ok());
    }

    #[test]
    fn test_entries_round_trip_in_order() {
        let mut store = setup();
        let user = SessionEntry::new(
            ChatMessage::user("warm up"),
            vec![ContextItem::file("a.rs", "/r/a.rs", "fn a() {}".to_string())],
        )
        .hidden();
        assert_eq!(store.push_entry(user.clone()).unwrap(), 0);
        assert_eq!(
            store
                .push_entry(SessionEntry::new(ChatMessage::assistant(""), vec![]))
                .unwrap(),
            1
        );

        let entries = store.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], user);
        assert_eq!(entries[1].message.role, Role::Assistant);
    }

    #[test]
    fn test_update_and_hide_by_index() {
        let mut store = setup();
        let idx = store
            .push_entry(SessionEntry::new(ChatMessage::assistant(""), vec![]))
            .unwrap();

        let mut entry = store.entry(idx).unwrap().unwrap();
        entry.message.content = "overview".to_string();
        entry.did_prune = Some(true);
        entry.context_percentage = Some(93.5);
        store.update_entry(idx, &entry).unwrap();
        store.set_hidden(idx, true).unwrap();

        let stored = store.entry(idx).unwrap().unwrap();
        assert_eq!(stored.message.content, "overview");
        assert_eq!(stored.did_prune, Some(true));
        assert!(stored.hidden);
        assert_eq!(store.stats().unwrap().hidden_count, 1);
    }

    #[test]
    fn test_missing_index() {
        let mut store = setup();
        assert!(store.entry(5).unwrap().is_none());
        let err = store.set_hidden(5, true).unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::EntryNotFound { index: 5 })
        ));
    }

    #[test]
    fn test_prompt_logs_and_reset() {
        let mut store = setup();
        let log = PromptLog {
            model_title: "m".to_string(),
            prompt: "p".to_string(),
            completion: "c".to_string(),
        };
        store.append_prompt_log(&log).unwrap();
        assert_eq!(store.prompt_logs().unwrap(), vec![log]);

        store.reset().unwrap();
        assert!(store.prompt_logs().unwrap().is_empty());
        assert_eq!(store.stats().unwrap().entry_count, 0);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("nested/history.db");
        let mut store = SqliteSessionStore::open(&path).unwrap();
        store.init().unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), Some(path.as_path()));
    }
}
