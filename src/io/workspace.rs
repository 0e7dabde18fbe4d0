//! Workspace binding and folder walking.
//!
//! The [`Workspace`] trait is the seam to whatever hosts the files (the local
//! filesystem here, an editor's virtual filesystem elsewhere). The walker
//! only consumes its listings, so ordering and filtering live in one place.

use crate::error::{Error, IoError, Result};
use crate::io::classifier::FileClassifier;
use crate::io::reader::FileReader;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};

/// Kind of a directory entry, with the host's numeric tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// Unknown entry kind (tag 0).
    Unknown,
    /// Regular file (tag 1).
    File,
    /// Directory (tag 2).
    Directory,
    /// Symbolic link (tag 64). Never followed.
    SymbolicLink,
}

impl FileType {
    /// Maps a host tag to a file type.
    #[must_use]
    pub const fn from_tag(tag: u32) -> Self {
        match tag {
            1 => Self::File,
            2 => Self::Directory,
            64 => Self::SymbolicLink,
            _ => Self::Unknown,
        }
    }

    /// Returns the host tag.
    #[must_use]
    pub const fn tag(self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::File => 1,
            Self::Directory => 2,
            Self::SymbolicLink => 64,
        }
    }
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name (no path separators).
    pub name: String,
    /// Entry kind.
    pub file_type: FileType,
}

impl DirEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(name: impl Into<String>, file_type: FileType) -> Self {
        Self {
            name: name.into(),
            file_type,
        }
    }
}

/// Access to the files of a workspace.
pub trait Workspace: Send + Sync {
    /// Returns the workspace root directories.
    fn workspace_dirs(&self) -> Vec<PathBuf>;

    /// Lists the entries of a directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Returns the size of a file in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be inspected.
    fn file_size(&self, path: &Path) -> Result<u64>;

    /// Reads a whole file as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid UTF-8.
    fn read_file(&self, path: &Path) -> Result<String>;

    /// Reads at most `max_bytes` leading bytes as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid UTF-8.
    fn read_prefix(&self, path: &Path, max_bytes: u64) -> Result<String>;
}

/// [`Workspace`] over the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct LocalWorkspace {
    roots: Vec<PathBuf>,
}

impl LocalWorkspace {
    /// Creates a workspace with the given roots.
    #[must_use]
    pub const fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Creates a workspace over `path`, or over the current directory when
    /// no path is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined.
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let root = match path {
            Some(path) => path.to_path_buf(),
            None => std::env::current_dir().map_err(|e| IoError::DirectoryFailed {
                path: ".".to_string(),
                reason: e.to_string(),
            })?,
        };
        Ok(Self::new(vec![root]))
    }
}

impl Workspace for LocalWorkspace {
    fn workspace_dirs(&self) -> Vec<PathBuf> {
        self.roots.clone()
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let dir_err = |e: std::io::Error| IoError::DirectoryFailed {
            path: path.to_string_lossy().to_string(),
            reason: e.to_string(),
        };

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path).map_err(dir_err)? {
            let entry = entry.map_err(dir_err)?;
            let file_type = match entry.file_type() {
                Ok(ft) if ft.is_symlink() => FileType::SymbolicLink,
                Ok(ft) if ft.is_dir() => FileType::Directory,
                Ok(ft) if ft.is_file() => FileType::File,
                Ok(_) => FileType::Unknown,
                Err(e) => {
                    tracing::debug!(entry = %entry.path().display(), error = %e, "cannot stat entry");
                    FileType::Unknown
                }
            };
            entries.push(DirEntry::new(
                entry.file_name().to_string_lossy().to_string(),
                file_type,
            ));
        }
        Ok(entries)
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        Ok(FileReader::open(path)?.size())
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        FileReader::open(path)?.read_to_string()
    }

    fn read_prefix(&self, path: &Path, max_bytes: u64) -> Result<String> {
        FileReader::open(path)?.read_prefix(max_bytes)
    }
}

/// Names of the per-directory ignore files honored by the walker.
///
/// Later files take precedence over earlier ones in the same directory.
pub const IGNORE_FILES: &[&str] = &[".gitignore", ".ignore"];

/// Returns the first workspace directory, the default walk root.
///
/// # Errors
///
/// Returns [`Error::Context`] if the workspace has no directories.
pub fn primary_root(workspace: &dyn Workspace) -> Result<PathBuf> {
    workspace
        .workspace_dirs()
        .into_iter()
        .next()
        .ok_or_else(|| Error::Context {
            message: "no workspace folder is open".to_string(),
        })
}

/// Recursively enumerates eligible files under `root`.
///
/// Entries of each directory are visited in name order, depth first.
/// Denied directories are not entered and symbolic links are not followed.
/// `.gitignore` and `.ignore` files found along the way are honored, the
/// deepest matching rule winning.
/// Failing to list `root` itself is an error; an unreadable subdirectory is
/// logged and skipped.
///
/// # Errors
///
/// Returns an error if `root` cannot be listed.
pub fn walk_folder(
    workspace: &dyn Workspace,
    classifier: &FileClassifier,
    root: &Path,
) -> Result<Vec<PathBuf>> {
    let mut walker = Walker {
        workspace,
        classifier,
        root,
        ignores: Vec::new(),
        files: Vec::new(),
    };
    let mut top = workspace.list_dir(root)?;
    sort_entries(&mut top);
    walker.visit(Path::new(""), &top);
    tracing::debug!(root = %root.display(), files = walker.files.len(), "walked folder");
    Ok(walker.files)
}

struct Walker<'a> {
    workspace: &'a dyn Workspace,
    classifier: &'a FileClassifier,
    root: &'a Path,
    /// Ignore rules of the directories on the current path, outermost first.
    ignores: Vec<Gitignore>,
    files: Vec<PathBuf>,
}

impl Walker<'_> {
    fn visit(&mut self, relative: &Path, entries: &[DirEntry]) {
        let dir = if relative.as_os_str().is_empty() {
            self.root.to_path_buf()
        } else {
            self.root.join(relative)
        };
        let rules = self.ignore_rules(&dir, entries);
        let pushed = rules.is_some();
        self.ignores.extend(rules);

        for entry in entries {
            let rel = relative.join(&entry.name);
            let abs = self.root.join(&rel);
            match entry.file_type {
                FileType::Directory => {
                    if self.classifier.is_denied_dir(&entry.name) || self.is_ignored(&abs, true) {
                        continue;
                    }
                    match self.workspace.list_dir(&abs) {
                        Ok(mut children) => {
                            sort_entries(&mut children);
                            self.visit(&rel, &children);
                        }
                        Err(e) => {
                            tracing::warn!(dir = %abs.display(), error = %e, "skipping unreadable directory");
                        }
                    }
                }
                FileType::File => {
                    if self.classifier.is_eligible(&rel) && !self.is_ignored(&abs, false) {
                        self.files.push(abs);
                    }
                }
                FileType::SymbolicLink | FileType::Unknown => {}
            }
        }

        if pushed {
            self.ignores.pop();
        }
    }

    /// Compiles the ignore files listed in `entries`, if any.
    fn ignore_rules(&self, dir: &Path, entries: &[DirEntry]) -> Option<Gitignore> {
        let mut builder = GitignoreBuilder::new(dir);
        let mut found = false;
        for name in IGNORE_FILES {
            if !entries
                .iter()
                .any(|e| e.file_type == FileType::File && e.name == *name)
            {
                continue;
            }
            let path = dir.join(name);
            let contents = match self.workspace.read_file(&path) {
                Ok(contents) => contents,
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "skipping unreadable ignore file");
                    continue;
                }
            };
            for line in contents.lines() {
                if let Err(e) = builder.add_line(Some(path.clone()), line) {
                    tracing::debug!(file = %path.display(), error = %e, "skipping invalid ignore pattern");
                }
            }
            found = true;
        }
        if !found {
            return None;
        }
        match builder.build() {
            Ok(rules) => Some(rules),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "ignoring malformed ignore rules");
                None
            }
        }
    }

    fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        for rules in self.ignores.iter().rev() {
            let matched = rules.matched(path, is_dir);
            if matched.is_ignore() {
                tracing::trace!(path = %path.display(), "excluded: ignore rule");
                return true;
            }
            if matched.is_whitelist() {
                return false;
            }
        }
        false
    }
}

fn sort_entries(entries: &mut [DirEntry]) {
    entries.sort_by(|a, b| a.name.cmp(&b.name));
}
