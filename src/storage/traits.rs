//! Session store trait definition.
//!
//! Defines the interface for session history backends: an ordered list of
//! history entries addressed by index, plus an append-only audit log of
//! prompt/completion pairs.

use crate::core::{ChatMessage, ContextItem, PromptLog};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// One stored turn of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    /// The turn's message. For an assistant slot this accumulates the
    /// streamed response.
    pub message: ChatMessage,
    /// Context items attached to the turn.
    #[serde(default)]
    pub context_items: Vec<ContextItem>,
    /// Hidden entries are kept but not rendered in the transcript.
    #[serde(default)]
    pub hidden: bool,
    /// Whether the compile step pruned content (assistant slots).
    #[serde(default)]
    pub did_prune: Option<bool>,
    /// Context utilization reported by the compile step (assistant slots).
    #[serde(default)]
    pub context_percentage: Option<f64>,
}

impl SessionEntry {
    /// Creates a visible entry with no compile metadata.
    #[must_use]
    pub const fn new(message: ChatMessage, context_items: Vec<ContextItem>) -> Self {
        Self {
            message,
            context_items,
            hidden: false,
            did_prune: None,
            context_percentage: None,
        }
    }

    /// Marks the entry hidden.
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// Session store statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Number of history entries.
    pub entry_count: usize,
    /// Number of hidden history entries.
    pub hidden_count: usize,
    /// Number of prompt/completion pairs logged.
    pub prompt_log_count: usize,
    /// Database file size in bytes (if applicable).
    pub db_size: Option<u64>,
}

/// Trait for session history backends.
pub trait SessionStore: Send {
    /// Initializes storage (creates schema). Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails.
    fn init(&mut self) -> Result<()>;

    /// Appends an entry and returns its index.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be stored.
    fn push_entry(&mut self, entry: SessionEntry) -> Result<usize>;

    /// Replaces the entry at `index`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::EntryNotFound` if `index` is out of range.
    fn update_entry(&mut self, index: usize, entry: &SessionEntry) -> Result<()>;

    /// Returns the entry at `index`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be read.
    fn entry(&self, index: usize) -> Result<Option<SessionEntry>>;

    /// Sets the hidden flag of the entry at `index`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::EntryNotFound` if `index` is out of range.
    fn set_hidden(&mut self, index: usize, hidden: bool) -> Result<()>;

    /// Returns all entries in order.
    ///
    /// # Errors
    ///
    /// Returns an error if entries cannot be read.
    fn entries(&self) -> Result<Vec<SessionEntry>>;

    /// Appends a prompt/completion pair to the audit log.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be written.
    fn append_prompt_log(&mut self, log: &PromptLog) -> Result<()>;

    /// Returns the audit log in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    fn prompt_logs(&self) -> Result<Vec<PromptLog>>;

    /// Deletes all entries and logs.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    fn reset(&mut self) -> Result<()>;

    /// Returns store statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if statistics cannot be computed.
    fn stats(&self) -> Result<SessionStats>;
}
