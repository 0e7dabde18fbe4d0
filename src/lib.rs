//! # kvwarm
//!
//! Primes an LLM inference server's key-value cache with a codebase.
//!
//! kvwarm walks a folder, filters and budgets the files it finds, and sends
//! their contents as one isolated chat request through the server's
//! compile step. The streamed reply is relayed as it arrives and the
//! prompt/completion pair is kept in a local session history, so later
//! questions about the code land on a warm cache.
//!
//! ## Features
//!
//! - **Budgets**: file-count, per-file and total byte caps, with explicit
//!   markers for everything truncated or left out
//! - **Streaming**: server-sent events with cooperative cancellation
//! - **`SQLite` History**: hidden warm-up turns and an audit log of prompts
//! - **Memory Mapping**: efficient reads of large files

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
// Note: unsafe is needed for memory-mapped I/O (memmap2)
#![warn(unsafe_code)]

pub mod cli;
pub mod client;
pub mod config;
pub mod context;
pub mod core;
pub mod dispatch;
pub mod error;
pub mod io;
pub mod logging;
pub mod prompt;
pub mod storage;
pub mod telemetry;
pub mod warm;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use core::{
    ChatMessage, CompletionOptions, ContextItem, ContextItemKind, FileBudget, FileBudgetState,
    HistoryEntry, PromptLog, Role, StreamChunk,
};

// Re-export pipeline types
pub use client::{HttpEndpoint, LlmEndpoint};
pub use config::Config;
pub use context::{Aggregation, ContextAggregator, FolderContextProvider};
pub use dispatch::{ChatDispatcher, DispatchEvent, DispatchOutcome, DispatchState};
pub use io::{FileClassifier, LocalWorkspace, Workspace};
pub use prompt::{MessageSettings, PromptSet, construct_messages};
pub use storage::{
    DEFAULT_DB_PATH, MemorySessionStore, SessionEntry, SessionStore, SqliteSessionStore,
};
pub use telemetry::{TelemetryEvent, TelemetrySink};
pub use warm::{BuildReport, BuildStatus, Phase, WarmEvent, WarmRequest, Warmer};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};
