//! Session history storage.
//!
//! Records each warm-up turn (hidden from the visible transcript) and the
//! prompt/completion pairs returned by the server. Two backends are
//! provided: an in-memory store for one-off runs and tests, and a `SQLite`
//! store that survives between invocations.

pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use memory::MemorySessionStore;
pub use schema::{CURRENT_SCHEMA_VERSION, SCHEMA_SQL};
pub use sqlite::SqliteSessionStore;
pub use traits::{SessionEntry, SessionStats, SessionStore};

/// Default database file name.
pub const DEFAULT_DB_NAME: &str = "history.db";

/// Default database path relative to the working directory.
pub const DEFAULT_DB_PATH: &str = ".kvwarm/history.db";
