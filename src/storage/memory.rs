//! In-memory session store.

use crate::core::PromptLog;
use crate::error::{Result, StorageError};
use crate::storage::traits::{SessionEntry, SessionStats, SessionStore};

/// Session store held in memory for the lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    entries: Vec<SessionEntry>,
    prompt_logs: Vec<PromptLog>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, index: usize) -> Result<&mut SessionEntry> {
        self.entries
            .get_mut(index)
            .ok_or_else(|| StorageError::EntryNotFound { index }.into())
    }
}

impl SessionStore for MemorySessionStore {
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn push_entry(&mut self, entry: SessionEntry) -> Result<usize> {
        self.entries.push(entry);
        Ok(self.entries.len() - 1)
    }

    fn update_entry(&mut self, index: usize, entry: &SessionEntry) -> Result<()> {
        *self.slot(index)? = entry.clone();
        Ok(())
    }

    fn entry(&self, index: usize) -> Result<Option<SessionEntry>> {
        Ok(self.entries.get(index).cloned())
    }

    fn set_hidden(&mut self, index: usize, hidden: bool) -> Result<()> {
        self.slot(index)?.hidden = hidden;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<SessionEntry>> {
        Ok(self.entries.clone())
    }

    fn append_prompt_log(&mut self, log: &PromptLog) -> Result<()> {
        self.prompt_logs.push(log.clone());
        Ok(())
    }

    fn prompt_logs(&self) -> Result<Vec<PromptLog>> {
        Ok(self.prompt_logs.clone())
    }

    fn reset(&mut self) -> Result<()> {
        self.entries.clear();
        self.prompt_logs.clear();
        Ok(())
    }

    fn stats(&self) -> Result<SessionStats> {
        Ok(SessionStats {
            entry_count: self.entries.len(),
            hidden_count: self.entries.iter().filter(|e| e.hidden).count(),
            prompt_log_count: self.prompt_logs.len(),
            db_size: None,
        })
    }
}
