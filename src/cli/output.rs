//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats.

use crate::context::Aggregation;
use crate::core::{ContextItemKind, PromptLog};
use crate::error::Error;
use crate::io::preview;
use crate::storage::{SessionEntry, SessionStats};
use crate::warm::{BuildReport, BuildStatus};
use serde::Serialize;
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Formats the list of eligible files.
#[must_use]
pub fn format_files(root: &Path, files: &[PathBuf], format: OutputFormat) -> String {
    let relative: Vec<String> = files
        .iter()
        .map(|f| {
            f.strip_prefix(root)
                .unwrap_or(f)
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();

    match format {
        OutputFormat::Text => {
            if relative.is_empty() {
                return "No eligible files found.\n".to_string();
            }
            let mut output = String::new();
            for name in &relative {
                let _ = writeln!(output, "{name}");
            }
            let _ = writeln!(output, "\n{} files", relative.len());
            output
        }
        OutputFormat::Json => format_json(&serde_json::json!({
            "root": root.to_string_lossy(),
            "count": relative.len(),
            "files": relative,
        })),
    }
}

/// Formats an aggregation as an item summary.
#[must_use]
pub fn format_aggregation(aggregation: &Aggregation, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_aggregation_text(aggregation),
        OutputFormat::Json => format_json(&serde_json::json!({
            "processed_files": aggregation.state.processed_files,
            "total_bytes": aggregation.state.total_bytes,
            "items": aggregation.items,
        })),
    }
}

fn format_aggregation_text(aggregation: &Aggregation) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{:<12} {:>10}  Name", "Kind", "Size");
    let _ = writeln!(output, "{}", "-".repeat(50));
    for item in &aggregation.items {
        let _ = writeln!(
            output,
            "{:<12} {:>10}  {}",
            item.kind.as_str(),
            format_size(item.size()),
            item.name
        );
        if item.kind.is_marker() || item.kind == ContextItemKind::Summary {
            let _ = writeln!(output, "{:<12} {:>10}  {}", "", "", preview(&item.content, 70));
        }
    }
    let _ = writeln!(
        output,
        "\n{} files processed, {} loaded in full",
        aggregation.state.processed_files,
        format_size(usize::try_from(aggregation.state.total_bytes).unwrap_or(usize::MAX))
    );
    output
}

/// Formats the result of a warm-up.
///
/// In text mode the streamed response has already been echoed, so only the
/// summary line is returned.
#[must_use]
pub fn format_report(report: &BuildReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            let _ = writeln!(output, "[{}] {}", report.status.as_str(), report.message);
            if report.status == BuildStatus::Completed
                && let Some(pct) = report.context_percentage
            {
                let _ = writeln!(output, "Context window: {pct:.1}% used");
            }
            output
        }
        OutputFormat::Json => format_json(report),
    }
}

/// Formats session history entries.
#[must_use]
pub fn format_history(entries: &[SessionEntry], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if entries.is_empty() {
                return "No history.\n".to_string();
            }
            let mut output = String::new();
            for (i, entry) in entries.iter().enumerate() {
                let _ = writeln!(
                    output,
                    "#{i:<4} {:<9} {:<7} {:>3} items  {}",
                    entry.message.role.as_str(),
                    if entry.hidden { "hidden" } else { "" },
                    entry.context_items.len(),
                    preview(&entry.message.content, 60)
                );
            }
            output
        }
        OutputFormat::Json => format_json(&entries),
    }
}

/// Formats the prompt/completion log.
#[must_use]
pub fn format_prompt_logs(logs: &[PromptLog], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if logs.is_empty() {
                return "No prompt logs.\n".to_string();
            }
            let mut output = String::new();
            for (i, log) in logs.iter().enumerate() {
                let _ = writeln!(
                    output,
                    "#{i:<4} {:<20} prompt {:>10}  completion {}",
                    log.model_title,
                    format_size(log.prompt.len()),
                    preview(&log.completion, 50)
                );
            }
            output
        }
        OutputFormat::Json => format_json(&logs),
    }
}

/// Formats store statistics.
#[must_use]
pub fn format_stats(stats: &SessionStats, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            let _ = writeln!(output, "  Entries:       {}", stats.entry_count);
            let _ = writeln!(output, "  Hidden:        {}", stats.hidden_count);
            let _ = writeln!(output, "  Prompt logs:   {}", stats.prompt_log_count);
            if let Some(size) = stats.db_size {
                let _ = writeln!(
                    output,
                    "  DB size:       {}",
                    format_size(usize::try_from(size).unwrap_or(usize::MAX))
                );
            }
            output
        }
        OutputFormat::Json => format_json(stats),
    }
}

/// Formats an error for output.
///
/// JSON errors carry a `failed` status so scripts can treat every outcome
/// the same way.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json => format_json(&serde_json::json!({
            "status": BuildStatus::Failed.as_str(),
            "error": error.to_string(),
        })),
    }
}

fn format_json<T: Serialize + ?Sized>(value: &T) -> String {
    let mut json = serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string());
    json.push('\n');
    json
}

/// Formats a byte size as human-readable.
#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ContextItem, FileBudgetState};

    #[test]
    fn test_format_parse() {
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("anything"), OutputFormat::Text);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_format_files_relative() {
        let root = Path::new("/proj");
        let files = vec![PathBuf::from("/proj/src/a.rs")];
        let text = format_files(root, &files, OutputFormat::Text);
        assert!(text.contains("src/a.rs"));
        assert!(text.contains("1 files"));

        let json = format_files(root, &files, OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["count"], 1);
    }

    #[test]
    fn test_format_aggregation_json() {
        let aggregation = Aggregation {
            items: vec![ContextItem::no_files()],
            state: FileBudgetState::default(),
        };
        let json = format_aggregation(&aggregation, OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["items"][0]["kind"], "no_files");
    }

    #[test]
    fn test_format_error_json_status() {
        let err = Error::Config {
            message: "bad".to_string(),
        };
        let value: serde_json::Value =
            serde_json::from_str(&format_error(&err, OutputFormat::Json)).unwrap();
        assert_eq!(value["status"], "failed");
        assert!(value["error"].as_str().unwrap().contains("bad"));
    }
}
