//! I/O utilities for kvwarm.
//!
//! Provides the workspace binding and gitignore-aware folder walker, the file eligibility
//! rules, file reading with memory mapping for large files, and Unicode
//! helpers for byte-budget cuts.

pub mod classifier;
pub mod reader;
pub mod unicode;
pub mod workspace;

pub use classifier::FileClassifier;
pub use reader::{FileReader, read_file, write_file, write_file_if_absent};
pub use unicode::{find_char_boundary, preview, truncate_graphemes, utf8_prefix};
pub use workspace::{
    DirEntry, FileType, IGNORE_FILES, LocalWorkspace, Workspace, primary_root, walk_folder,
};
