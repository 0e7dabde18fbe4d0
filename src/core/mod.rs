//! Core domain models for kvwarm.
//!
//! This module contains the data structures shared by every stage of the
//! warm-up pipeline: context items, chat messages, history entries, and file
//! budgets. These are pure domain models with no I/O dependencies.

pub mod budget;
pub mod item;
pub mod message;

pub use budget::{FileBudget, FileBudgetState};
pub use item::{ContextItem, ContextItemKind, TRUNCATION_NOTICE};
pub use message::{ChatMessage, CompletionOptions, HistoryEntry, PromptLog, Role, StreamChunk};
