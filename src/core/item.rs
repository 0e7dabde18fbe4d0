//! Context items attached to a chat request.
//!
//! A context item is a named, described chunk of text that is rendered
//! inline in the user turn. Besides file content, the aggregator emits
//! bookkeeping markers (summary, truncation, limits, read errors) as items of
//! their own so that nothing it decided is lost on the way to the model.

use serde::{Deserialize, Serialize};

/// Notice appended to the content of a file cut at the per-file byte cap.
pub const TRUNCATION_NOTICE: &str = "\n\n[... file truncated: exceeds the per-file size limit ...]";

/// What an item represents.
///
/// Truncated files and files excluded by the total budget are kept as
/// distinct kinds so callers can tell "included but cut" from "left out".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextItemKind {
    /// Leading summary of files and kilobytes loaded.
    Summary,
    /// Full file content.
    File,
    /// File content cut at the per-file cap, followed by [`TRUNCATION_NOTICE`].
    Truncated,
    /// A file that could not be read; content carries the failure message.
    ReadError,
    /// The file-count cap was reached; aggregation stopped here.
    FileLimit,
    /// The next file would have exceeded the total byte cap and was excluded.
    SizeLimit,
    /// No eligible files were found.
    NoFiles,
    /// Enumeration failed; this item replaces the whole result.
    Failure,
}

impl ContextItemKind {
    /// Returns true for items that carry file content.
    #[must_use]
    pub const fn is_content(self) -> bool {
        matches!(self, Self::File | Self::Truncated)
    }

    /// Returns true for bookkeeping markers.
    #[must_use]
    pub const fn is_marker(self) -> bool {
        !self.is_content()
    }

    /// Returns the `snake_case` label used in output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::File => "file",
            Self::Truncated => "truncated",
            Self::ReadError => "read_error",
            Self::FileLimit => "file_limit",
            Self::SizeLimit => "size_limit",
            Self::NoFiles => "no_files",
            Self::Failure => "failure",
        }
    }
}

/// A named chunk of text to include in the model prompt.
///
/// # Examples
///
/// ```
/// use kvwarm::core::{ContextItem, ContextItemKind};
///
/// let item = ContextItem::file("src/lib.rs", "/repo/src/lib.rs", "pub mod a;".to_string());
/// assert_eq!(item.kind, ContextItemKind::File);
/// assert_eq!(item.size(), 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextItem {
    /// Display name (relative path for files).
    pub name: String,
    /// Short description (absolute path for files).
    pub description: String,
    /// Text rendered into the prompt.
    pub content: String,
    /// What this item represents.
    pub kind: ContextItemKind,
}

impl ContextItem {
    /// Creates an item of the given kind.
    #[must_use]
    pub fn new(
        kind: ContextItemKind,
        name: impl Into<String>,
        description: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            content: content.into(),
            kind,
        }
    }

    /// Full file content.
    #[must_use]
    pub fn file(name: &str, description: &str, content: String) -> Self {
        Self::new(ContextItemKind::File, name, description, content)
    }

    /// File content already cut to the per-file cap; the notice is appended here.
    #[must_use]
    pub fn truncated(name: &str, description: &str, mut prefix: String) -> Self {
        prefix.push_str(TRUNCATION_NOTICE);
        Self::new(ContextItemKind::Truncated, name, description, prefix)
    }

    /// A file that failed to read.
    #[must_use]
    pub fn read_error(name: &str, description: &str, reason: &str) -> Self {
        Self::new(
            ContextItemKind::ReadError,
            name,
            description,
            format!("Error reading file: {reason}"),
        )
    }

    /// File-count cap marker.
    #[must_use]
    pub fn file_limit(max_files: usize) -> Self {
        Self::new(
            ContextItemKind::FileLimit,
            "File limit reached",
            "Remaining files were skipped",
            format!("Reached the limit of {max_files} files; remaining files were not loaded."),
        )
    }

    /// Total-size cap marker; `skipped` names the excluded file.
    #[must_use]
    pub fn size_limit(max_total_bytes: u64, skipped: &str) -> Self {
        Self::new(
            ContextItemKind::SizeLimit,
            "Size limit reached",
            "Remaining files were skipped",
            format!(
                "Reached the total size limit of {:.1} KB; {skipped} and remaining files were not loaded.",
                kilobytes(max_total_bytes)
            ),
        )
    }

    /// Empty-folder marker.
    #[must_use]
    pub fn no_files() -> Self {
        Self::new(
            ContextItemKind::NoFiles,
            "No files",
            "No eligible files found",
            "No files were found in the selected folder.",
        )
    }

    /// Whole-result failure marker.
    #[must_use]
    pub fn failure(message: &str) -> Self {
        Self::new(
            ContextItemKind::Failure,
            "Error",
            "Failed to load folder context",
            format!("Error loading folder context: {message}"),
        )
    }

    /// Leading summary.
    #[must_use]
    pub fn summary(file_count: usize, total_bytes: u64) -> Self {
        Self::new(
            ContextItemKind::Summary,
            "Folder summary",
            "Files loaded into context",
            format!(
                "Loaded {file_count} files ({:.1} KB) into context.",
                kilobytes(total_bytes)
            ),
        )
    }

    /// Content size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

#[allow(clippy::cast_precision_loss)]
fn kilobytes(bytes: u64) -> f64 {
    bytes as f64 / 1024.0
}
