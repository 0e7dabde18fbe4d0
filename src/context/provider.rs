//! Folder context provider: walk, classify, aggregate.

use super::aggregator::{Aggregation, ContextAggregator};
use crate::core::{ContextItem, FileBudget, FileBudgetState};
use crate::error::{Error, Result};
use crate::io::{FileClassifier, Workspace, walk_folder};
use std::path::Path;

/// Builds context items for a folder.
///
/// # Examples
///
/// ```no_run
/// use kvwarm::context::FolderContextProvider;
/// use kvwarm::core::FileBudget;
/// use kvwarm::io::{FileClassifier, LocalWorkspace};
///
/// let ws = LocalWorkspace::default();
/// let provider = FolderContextProvider::new(&ws, FileClassifier::default(), FileBudget::default());
/// let items = provider.provide("src".as_ref());
/// ```
pub struct FolderContextProvider<'a> {
    workspace: &'a dyn Workspace,
    classifier: FileClassifier,
    budget: FileBudget,
}

impl<'a> FolderContextProvider<'a> {
    /// Creates a provider.
    #[must_use]
    pub const fn new(
        workspace: &'a dyn Workspace,
        classifier: FileClassifier,
        budget: FileBudget,
    ) -> Self {
        Self {
            workspace,
            classifier,
            budget,
        }
    }

    /// Returns the eligible files under `root`, in walk order.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` cannot be listed.
    pub fn eligible_files(&self, root: &Path) -> Result<Vec<std::path::PathBuf>> {
        walk_folder(self.workspace, &self.classifier, root)
    }

    /// Walks `root` and aggregates its eligible files.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Context`] if `root` cannot be enumerated.
    pub fn collect(&self, root: &Path) -> Result<Aggregation> {
        let files = self.eligible_files(root).map_err(|e| Error::Context {
            message: e.to_string(),
        })?;
        tracing::info!(root = %root.display(), files = files.len(), "collecting folder context");

        Ok(ContextAggregator::new(self.workspace, self.budget)
            .with_root(root)
            .aggregate(&files))
    }

    /// Like [`collect`](Self::collect), but an enumeration failure becomes a
    /// single `failure` item in place of the whole result.
    #[must_use]
    pub fn provide(&self, root: &Path) -> Aggregation {
        self.collect(root).unwrap_or_else(|e| {
            tracing::error!(root = %root.display(), error = %e, "folder context failed");
            Aggregation {
                items: vec![ContextItem::failure(&e.to_string())],
                state: FileBudgetState::default(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ContextItemKind;
    use crate::io::LocalWorkspace;
    use tempfile::TempDir;

    #[test]
    fn test_collect_local_folder() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.md"), "# A").unwrap();
        std::fs::write(temp.path().join("b.rs"), "fn b() {}").unwrap();
        std::fs::write(temp.path().join("c.zip"), "PK").unwrap();

        let ws = LocalWorkspace::default();
        let provider =
            FolderContextProvider::new(&ws, FileClassifier::default(), FileBudget::default());
        let agg = provider.collect(temp.path()).unwrap();

        let names: Vec<_> = agg.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Folder summary", "a.md", "b.rs"]);
        assert_eq!(agg.state.processed_files, 2);
    }

    #[test]
    fn test_empty_folder_reports_no_files() {
        let temp = TempDir::new().unwrap();
        let ws = LocalWorkspace::default();
        let provider =
            FolderContextProvider::new(&ws, FileClassifier::default(), FileBudget::default());
        let agg = provider.provide(temp.path());
        assert_eq!(agg.items.len(), 1);
        assert_eq!(agg.items[0].kind, ContextItemKind::NoFiles);
    }

    #[test]
    fn test_enumeration_failure() {
        let ws = LocalWorkspace::default();
        let provider =
            FolderContextProvider::new(&ws, FileClassifier::default(), FileBudget::default());
        let missing = Path::new("/nonexistent/kvwarm-root");

        assert!(matches!(provider.collect(missing), Err(Error::Context { .. })));

        let agg = provider.provide(missing);
        assert_eq!(agg.items.len(), 1);
        assert_eq!(agg.items[0].kind, ContextItemKind::Failure);
    }
}
