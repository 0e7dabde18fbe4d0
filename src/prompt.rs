//! System prompts and chat message construction.
//!
//! The warm-up request is built from one synthetic history entry. Prior
//! turns are never included: the server should see the codebase content in
//! isolation so that exactly that prefix lands in its KV cache.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use crate::core::{ChatMessage, ContextItem, HistoryEntry};

/// Default system message for the warm-up request.
pub const DEFAULT_SYSTEM_PROMPT: &str = r"You are a coding assistant working inside the user's codebase.

The files of the project are attached below, each in a fenced block titled with its path. Some blocks are notes about how the files were collected (a summary, files that were cut short, files that could not be read, limits that were reached); treat them as facts about the attachment, not as project content.

Read all attached content carefully. Later questions in this session will refer to it. Answer from the attached code when possible, cite file paths, and say so when something is not covered by the attachment.";

/// Default user prompt sent with the attached files.
pub const DEFAULT_WARMUP_PROMPT: &str =
    "Read the attached project files and reply with a short overview of the codebase: its purpose, main components, and entry points.";

/// Environment variable naming the prompt directory.
pub const PROMPT_DIR_ENV: &str = "KVWARM_PROMPT_DIR";

/// Default prompt directory under user config.
const DEFAULT_PROMPT_DIR: &str = ".config/kvwarm/prompts";

/// Filename for the system prompt template.
const SYSTEM_FILENAME: &str = "system.md";
/// Filename for the warm-up prompt template.
const WARMUP_FILENAME: &str = "warmup.md";

/// The prompts used for a warm-up request.
///
/// Loaded from external template files when available, falling back to
/// compiled-in defaults. Use [`PromptSet::load`] to resolve the prompt
/// directory from CLI flags, environment variables, or the default path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// Base system message.
    pub system: String,
    /// User prompt sent with the attached files.
    pub warmup: String,
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to compiled-in defaults.
    ///
    /// Resolution order for `prompt_dir`:
    /// 1. Explicit `prompt_dir` argument (from `--prompt-dir` CLI flag)
    /// 2. `KVWARM_PROMPT_DIR` environment variable
    /// 3. `~/.config/kvwarm/prompts/`
    ///
    /// Each file is loaded independently; a missing file uses its default.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = Self::resolve_dir(prompt_dir);

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(&path).ok())
                .map(|s| s.trim_end().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            system: load_file(SYSTEM_FILENAME, DEFAULT_SYSTEM_PROMPT),
            warmup: load_file(WARMUP_FILENAME, DEFAULT_WARMUP_PROMPT),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            warmup: DEFAULT_WARMUP_PROMPT.to_string(),
        }
    }

    /// Writes the compiled-in default prompts to the given directory.
    ///
    /// Creates the directory if it does not exist. Existing files are
    /// **not** overwritten.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(dir: &Path) -> crate::Result<Vec<PathBuf>> {
        let templates = [
            (SYSTEM_FILENAME, DEFAULT_SYSTEM_PROMPT),
            (WARMUP_FILENAME, DEFAULT_WARMUP_PROMPT),
        ];

        let mut written = Vec::new();
        for (filename, content) in &templates {
            let path = dir.join(filename);
            if crate::io::write_file_if_absent(&path, content)? {
                written.push(path);
            }
        }

        Ok(written)
    }

    /// Resolves the prompt directory: explicit argument, then
    /// `KVWARM_PROMPT_DIR`, then the default under the user's home.
    #[must_use]
    pub fn resolve_dir(prompt_dir: Option<&Path>) -> Option<PathBuf> {
        prompt_dir
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var(PROMPT_DIR_ENV)
                    .ok()
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
            })
            .or_else(Self::default_dir)
    }

    /// Returns the default prompt directory under the user's home.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }
}

/// Rules and settings folded into the system message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageSettings {
    /// Extra instructions appended to the system message, in order.
    pub rules: Vec<String>,
}

/// Builds the system message from a base prompt and rules.
#[must_use]
pub fn build_system_message(base: &str, settings: &MessageSettings) -> String {
    let mut system = base.trim_end().to_string();
    let rules: Vec<&str> = settings
        .rules
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .collect();
    if !rules.is_empty() {
        system.push_str("\n\n<rules>\n");
        for rule in rules {
            let _ = writeln!(system, "- {rule}");
        }
        system.push_str("</rules>");
    }
    system
}

/// Renders context items inline, one fenced block per item, in order.
#[must_use]
pub fn render_context_items(items: &[ContextItem]) -> String {
    let mut out = String::new();
    for item in items {
        let fence = fence_for(&item.content);
        let _ = write!(
            out,
            "{fence} {name}\n{content}\n{fence}\n\n",
            name = item.name,
            content = item.content,
        );
    }
    out
}

/// Produces the exact message list for a warm-up request.
///
/// Returns `[system, user]`: the system message (base plus rules) and the
/// entry's user turn with its context items rendered before the prompt.
/// There is no history parameter, so earlier turns cannot leak in.
#[must_use]
pub fn construct_messages(
    entry: &HistoryEntry,
    system_message: &str,
    settings: &MessageSettings,
) -> Vec<ChatMessage> {
    let mut user = render_context_items(&entry.context_items);
    user.push_str(&entry.message.content);

    vec![
        ChatMessage::system(build_system_message(system_message, settings)),
        ChatMessage {
            role: entry.message.role,
            content: user,
        },
    ]
}

/// Picks a backtick fence longer than any run inside `content`.
fn fence_for(content: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in content.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat(longest.max(2) + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ContextItemKind, Role};

    fn entry() -> HistoryEntry {
        HistoryEntry::user(
            "summarize",
            vec![
                ContextItem::summary(1, 10),
                ContextItem::file("src/a.rs", "/r/src/a.rs", "fn a() {}".to_string()),
            ],
        )
    }

    #[test]
    fn test_construct_messages_shape() {
        let messages = construct_messages(&entry(), "base", &MessageSettings::default());
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "base");
        assert_eq!(messages[1].role, Role::User);
        assert!(messages[1].content.ends_with("summarize"));
    }

    #[test]
    fn test_context_rendered_in_order() {
        let messages = construct_messages(&entry(), "base", &MessageSettings::default());
        let user = &messages[1].content;
        let summary_at = user.find("Folder summary").unwrap();
        let file_at = user.find("``` src/a.rs\nfn a() {}\n```").unwrap();
        assert!(summary_at < file_at);
    }

    #[test]
    fn test_rules_appended_to_system() {
        let settings = MessageSettings {
            rules: vec!["Be terse.".to_string(), "  ".to_string()],
        };
        let system = build_system_message("base\n", &settings);
        assert_eq!(system, "base\n\n<rules>\n- Be terse.\n</rules>");
    }

    #[test]
    fn test_fence_outgrows_content_backticks() {
        let item = ContextItem::new(ContextItemKind::File, "README.md", "", "```rust\nx\n```");
        let rendered = render_context_items(&[item]);
        assert!(rendered.starts_with("```` README.md\n"));
    }

    #[test]
    fn test_load_from_dir_with_fallback() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join(SYSTEM_FILENAME), "custom system\n").unwrap();

        let prompts = PromptSet::load(Some(temp.path()));
        assert_eq!(prompts.system, "custom system");
        assert_eq!(prompts.warmup, DEFAULT_WARMUP_PROMPT);
    }

    #[test]
    fn test_write_defaults_does_not_overwrite() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join(WARMUP_FILENAME), "mine").unwrap();

        let written = PromptSet::write_defaults(temp.path()).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(
            std::fs::read_to_string(temp.path().join(WARMUP_FILENAME)).unwrap(),
            "mine"
        );
    }

    #[test]
    fn test_prompts_not_empty() {
        assert!(!DEFAULT_SYSTEM_PROMPT.is_empty());
        assert!(!DEFAULT_WARMUP_PROMPT.is_empty());
        assert_eq!(PromptSet::defaults().system, DEFAULT_SYSTEM_PROMPT);
    }
}
