//! Budgeted aggregation of files into context items.

use crate::core::{ContextItem, FileBudget, FileBudgetState};
use crate::io::Workspace;
use std::path::{Path, PathBuf};

/// Items produced by one aggregation pass, with the final counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    /// Ordered items: summary first (when any item was produced), then one
    /// item per file or marker in input order.
    pub items: Vec<ContextItem>,
    /// Counters at the point aggregation stopped.
    pub state: FileBudgetState,
}

/// Reads files in order and turns them into context items under a budget.
///
/// Per-file read failures become `read_error` items and aggregation goes on.
/// Files over the per-file cap are cut and counted as processed without
/// adding to the byte total. The first file that would push the total over
/// its cap is left out, a `size_limit` marker is appended, and aggregation
/// stops; reaching the file-count cap does the same with `file_limit`.
pub struct ContextAggregator<'a> {
    workspace: &'a dyn Workspace,
    budget: FileBudget,
    root: Option<&'a Path>,
}

impl<'a> ContextAggregator<'a> {
    /// Creates an aggregator reading through `workspace`.
    #[must_use]
    pub fn new(workspace: &'a dyn Workspace, budget: FileBudget) -> Self {
        Self {
            workspace,
            budget,
            root: None,
        }
    }

    /// Names items relative to `root`.
    #[must_use]
    pub const fn with_root(mut self, root: &'a Path) -> Self {
        self.root = Some(root);
        self
    }

    /// Returns the budget in use.
    #[must_use]
    pub const fn budget(&self) -> &FileBudget {
        &self.budget
    }

    /// Aggregates `files` in order.
    #[must_use]
    pub fn aggregate(&self, files: &[PathBuf]) -> Aggregation {
        if files.is_empty() {
            return Aggregation {
                items: vec![ContextItem::no_files()],
                state: FileBudgetState::default(),
            };
        }

        let budget = &self.budget;
        let mut state = FileBudgetState::default();
        let mut items = Vec::new();

        for path in files {
            if state.files_exhausted(budget) {
                tracing::debug!(max_files = budget.max_files, "file limit reached");
                items.push(ContextItem::file_limit(budget.max_files));
                break;
            }

            let name = self.display_name(path);
            let description = path.to_string_lossy();

            let size = match self.workspace.file_size(path) {
                Ok(size) => size,
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "cannot read file");
                    items.push(ContextItem::read_error(&name, &description, &e.to_string()));
                    continue;
                }
            };

            if size > budget.max_file_bytes {
                match self.workspace.read_prefix(path, budget.max_file_bytes) {
                    Ok(prefix) => {
                        tracing::debug!(file = %name, size, "truncating oversized file");
                        items.push(ContextItem::truncated(&name, &description, prefix));
                        state.record_truncated();
                    }
                    Err(e) => {
                        tracing::warn!(file = %name, error = %e, "cannot read file");
                        items.push(ContextItem::read_error(&name, &description, &e.to_string()));
                    }
                }
                continue;
            }

            let content = match self.workspace.read_file(path) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "cannot read file");
                    items.push(ContextItem::read_error(&name, &description, &e.to_string()));
                    continue;
                }
            };

            if !state.admit(content.len() as u64, budget) {
                tracing::debug!(
                    file = %name,
                    total = state.total_bytes,
                    max_total = budget.max_total_bytes,
                    "total size limit reached"
                );
                items.push(ContextItem::size_limit(budget.max_total_bytes, &name));
                break;
            }

            items.push(ContextItem::file(&name, &description, content));
        }

        if !items.is_empty() {
            items.insert(
                0,
                ContextItem::summary(state.processed_files, state.total_bytes),
            );
        }

        Aggregation { items, state }
    }

    fn display_name(&self, path: &Path) -> String {
        let rel = self
            .root
            .and_then(|root| path.strip_prefix(root).ok())
            .unwrap_or(path);
        rel.to_string_lossy().replace('\\', "/")
    }
}
