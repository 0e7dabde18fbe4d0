//! Byte and file-count budgets for context aggregation.

use serde::{Deserialize, Serialize};

/// Default maximum number of files loaded per invocation.
pub const DEFAULT_MAX_FILES: usize = 500;

/// Default per-file byte cap (100 KB).
pub const DEFAULT_MAX_FILE_BYTES: u64 = 100 * 1024;

/// Default total byte cap (2 MB).
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 2 * 1024 * 1024;

/// Limits applied while aggregating files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBudget {
    /// Maximum number of files counted as processed.
    pub max_files: usize,
    /// Files larger than this are truncated to this many bytes.
    pub max_file_bytes: u64,
    /// Cap on the summed size of fully included files.
    pub max_total_bytes: u64,
}

impl Default for FileBudget {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
        }
    }
}

/// Running counters for one aggregation pass.
///
/// `total_bytes` only grows through [`FileBudgetState::admit`], which refuses
/// anything that would cross the total cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileBudgetState {
    /// Files counted as processed (full or truncated).
    pub processed_files: usize,
    /// Summed size of fully included files.
    pub total_bytes: u64,
}

impl FileBudgetState {
    /// Returns true once the file-count cap has been reached.
    #[must_use]
    pub const fn files_exhausted(&self, budget: &FileBudget) -> bool {
        self.processed_files >= budget.max_files
    }

    /// Counts a truncated file. Its size does not count toward the total.
    pub const fn record_truncated(&mut self) {
        self.processed_files += 1;
    }

    /// Admits a full file of `size` bytes if it fits in the total cap.
    ///
    /// Returns false and leaves the counters untouched otherwise.
    pub const fn admit(&mut self, size: u64, budget: &FileBudget) -> bool {
        let Some(next) = self.total_bytes.checked_add(size) else {
            return false;
        };
        if next > budget.max_total_bytes {
            return false;
        }
        self.total_bytes = next;
        self.processed_files += 1;
        true
    }
}
