//! Eligibility rules for files loaded into context.
//!
//! A path is eligible when none of its segments is a denied directory, its
//! extension is not a binary/media/archive type, and, for dotfiles, it ends
//! in `.md` or `.txt`. Exclusion is silent.

use std::path::{Component, Path};

/// Directory names skipped anywhere in a path.
pub const DENIED_DIRS: &[&str] = &[
    // VCS
    ".git",
    ".svn",
    ".hg",
    // dependencies
    "node_modules",
    "bower_components",
    "vendor",
    ".venv",
    "venv",
    // build output
    "target",
    "dist",
    "build",
    "out",
    "bin",
    "obj",
    ".next",
    ".nuxt",
    ".gradle",
    "coverage",
    // editor and tool caches
    ".idea",
    ".vscode",
    ".vs",
    ".cache",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
];

/// Extensions (lowercase, no dot) never loaded as text.
pub const DENIED_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tif", "tiff", "psd", "svgz", "heic",
    // audio / video
    "mp3", "wav", "ogg", "flac", "aac", "m4a", "mp4", "mov", "avi", "mkv", "webm", "wmv", "flv",
    // archives
    "zip", "tar", "gz", "tgz", "bz2", "xz", "7z", "rar", "jar", "war", "ear", "whl",
    // executables and objects
    "exe", "dll", "so", "dylib", "a", "lib", "o", "obj", "class", "pyc", "pyo", "wasm", "bin",
    // fonts
    "ttf", "otf", "woff", "woff2", "eot",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
    // databases and blobs
    "db", "sqlite", "sqlite3", "dat", "pkl", "npy", "npz", "onnx", "pt", "safetensors", "lock",
];

/// Suffixes a dotfile must carry to be eligible.
const DOTFILE_ALLOWED_SUFFIXES: &[&str] = &[".md", ".txt"];

/// Classifies paths as eligible context or not.
///
/// # Examples
///
/// ```
/// use kvwarm::io::FileClassifier;
///
/// let classifier = FileClassifier::default();
/// assert!(classifier.is_eligible("src/main.rs".as_ref()));
/// assert!(!classifier.is_eligible("node_modules/x/index.js".as_ref()));
/// assert!(!classifier.is_eligible("logo.PNG".as_ref()));
/// assert!(!classifier.is_eligible(".env".as_ref()));
/// assert!(classifier.is_eligible(".notes.md".as_ref()));
/// ```
#[derive(Debug, Clone)]
pub struct FileClassifier {
    denied_dirs: Vec<String>,
    denied_extensions: Vec<String>,
}

impl Default for FileClassifier {
    fn default() -> Self {
        Self {
            denied_dirs: DENIED_DIRS.iter().map(ToString::to_string).collect(),
            denied_extensions: DENIED_EXTENSIONS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl FileClassifier {
    /// Adds directory names to the denylist.
    #[must_use]
    pub fn with_extra_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.denied_dirs.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// Adds extensions (without the dot) to the denylist.
    #[must_use]
    pub fn with_extra_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.denied_extensions.extend(
            extensions
                .into_iter()
                .map(|e| e.into().trim_start_matches('.').to_lowercase()),
        );
        self
    }

    /// Returns true if a directory with this name should not be entered.
    #[must_use]
    pub fn is_denied_dir(&self, name: &str) -> bool {
        self.denied_dirs.iter().any(|d| d == name)
    }

    /// Returns true if `path` is eligible content.
    #[must_use]
    pub fn is_eligible(&self, path: &Path) -> bool {
        let in_denied_dir = path.components().any(|component| match component {
            Component::Normal(name) => self.is_denied_dir(&name.to_string_lossy()),
            _ => false,
        });
        if in_denied_dir {
            tracing::trace!(path = %path.display(), "excluded: denied directory");
            return false;
        }

        let Some(file_name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };

        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            let ext = ext.to_lowercase();
            if self.denied_extensions.iter().any(|d| *d == ext) {
                tracing::trace!(path = %path.display(), "excluded: denied extension");
                return false;
            }
        }

        if file_name.starts_with('.') {
            let lower = file_name.to_lowercase();
            let allowed = DOTFILE_ALLOWED_SUFFIXES
                .iter()
                .any(|suffix| lower.ends_with(suffix));
            if !allowed {
                tracing::trace!(path = %path.display(), "excluded: hidden file");
            }
            return allowed;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("src/main.rs", true ; "plain source")]
    #[test_case("README.md", true ; "markdown")]
    #[test_case("Makefile", true ; "no extension")]
    #[test_case(".git/config", false ; "vcs dir")]
    #[test_case("web/node_modules/react/index.js", false ; "nested dependency dir")]
    #[test_case("target/debug/app.d", false ; "build output")]
    #[test_case("assets/logo.png", false ; "image")]
    #[test_case("assets/LOGO.PNG", false ; "image uppercase")]
    #[test_case("release.tar.gz", false ; "archive")]
    #[test_case("Cargo.lock", false ; "lock file")]
    #[test_case(".env", false ; "hidden config")]
    #[test_case(".gitignore", false ; "hidden vcs file")]
    #[test_case(".notes.md", true ; "hidden markdown")]
    #[test_case("docs/.TODO.TXT", true ; "hidden text uppercase")]
    fn test_default_rules(path: &str, expected: bool) {
        let classifier = FileClassifier::default();
        assert_eq!(classifier.is_eligible(Path::new(path)), expected);
    }

    #[test]
    fn test_dir_name_must_match_whole_segment() {
        let classifier = FileClassifier::default();
        assert!(classifier.is_eligible(Path::new("builder/src/lib.rs")));
        assert!(classifier.is_eligible(Path::new("src/target_info.rs")));
    }

    #[test]
    fn test_extra_rules() {
        let classifier = FileClassifier::default()
            .with_extra_dirs(["generated"])
            .with_extra_extensions([".CSV"]);
        assert!(!classifier.is_eligible(Path::new("generated/api.rs")));
        assert!(!classifier.is_eligible(Path::new("data/rows.csv")));
        assert!(classifier.is_eligible(Path::new("src/api.rs")));
    }
}
