//! The cache warm-up operation.
//!
//! Collects a folder's files into context, sends them as one isolated
//! request, and reports how it went. Progress percentages are client-side
//! estimates from byte counts; the server reports nothing about its cache.

use std::fmt::Write;
use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_util::sync::CancellationToken;

use crate::client::LlmEndpoint;
use crate::context::FolderContextProvider;
use crate::core::{CompletionOptions, FileBudget, HistoryEntry};
use crate::dispatch::{ChatDispatcher, DispatchEvent, DispatchOutcome};
use crate::error::{Error, Result};
use crate::io::{FileClassifier, Workspace};
use crate::prompt::{MessageSettings, PromptSet, construct_messages};
use crate::storage::SessionStore;
use crate::telemetry::TelemetrySink;

/// Percent reached when collection finishes with a full byte budget.
const COLLECT_END: u8 = 40;
/// Percent while waiting for the compile step.
const COMPILE_PERCENT: u8 = 50;
/// Percent when the first streamed byte arrives.
const STREAM_START: u8 = 60;
/// Highest percent reported before the stream completes.
const STREAM_END: u8 = 99;

/// Phase of a warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Walking and reading files.
    Collecting,
    /// Waiting for the compile step.
    Compiling,
    /// Receiving the response.
    Streaming,
    /// Finished.
    Done,
}

impl Phase {
    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Collecting => "collecting",
            Self::Compiling => "compiling",
            Self::Streaming => "streaming",
            Self::Done => "done",
        }
    }
}

/// Event delivered to the presenter during a warm-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarmEvent {
    /// Estimated progress.
    Progress {
        /// Current phase.
        phase: Phase,
        /// Estimated completion, 0 to 100.
        percent: u8,
    },
    /// Event relayed from the dispatcher.
    Dispatch {
        /// The dispatcher event.
        event: DispatchEvent,
    },
}

/// Final status of a warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    /// The server received and answered the request.
    Completed,
    /// An error ended the warm-up.
    Failed,
    /// The request did not fit the model's context window.
    OutOfContext,
    /// The user cancelled.
    Cancelled,
}

impl BuildStatus {
    /// Returns the snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::OutOfContext => "out_of_context",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Summary of one warm-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildReport {
    /// Final status.
    pub status: BuildStatus,
    /// Human-readable summary.
    pub message: String,
    /// Files counted as loaded (full or truncated).
    pub files_loaded: usize,
    /// Bytes of fully loaded files.
    pub bytes_loaded: u64,
    /// Whether the compile step pruned content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did_prune: Option<bool>,
    /// Context window utilization reported by the compile step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_percentage: Option<f64>,
    /// Response text received from the model.
    pub completion: String,
}

impl BuildReport {
    /// Report for a warm-up that ended with an error.
    #[must_use]
    pub fn failed(error: &Error) -> Self {
        Self {
            status: BuildStatus::Failed,
            message: format!("Cache warm-up failed: {error}"),
            files_loaded: 0,
            bytes_loaded: 0,
            did_prune: None,
            context_percentage: None,
            completion: String::new(),
        }
    }
}

/// Inputs for one warm-up.
pub struct WarmRequest<'a> {
    /// Folder to load.
    pub root: PathBuf,
    /// File access.
    pub workspace: &'a dyn Workspace,
    /// Eligibility rules.
    pub classifier: FileClassifier,
    /// Aggregation limits.
    pub budget: FileBudget,
    /// System and warm-up prompts.
    pub prompts: PromptSet,
    /// Rules folded into the system message.
    pub settings: MessageSettings,
    /// Options passed to the endpoint.
    pub options: CompletionOptions,
}

/// Runs warm-ups against one endpoint.
pub struct Warmer<'a> {
    endpoint: &'a dyn LlmEndpoint,
    telemetry: &'a dyn TelemetrySink,
}

impl<'a> Warmer<'a> {
    /// Creates a warmer.
    #[must_use]
    pub fn new(endpoint: &'a dyn LlmEndpoint, telemetry: &'a dyn TelemetrySink) -> Self {
        Self {
            endpoint,
            telemetry,
        }
    }

    /// Loads `request.root` into the server's cache.
    ///
    /// Progress and dispatcher events are sent to `events` in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be enumerated, the compile step
    /// fails for a reason other than lack of context, the stream fails, or
    /// the session store rejects a write.
    pub async fn warm(
        &self,
        request: WarmRequest<'_>,
        store: &mut dyn SessionStore,
        events: &UnboundedSender<WarmEvent>,
        cancel: &CancellationToken,
    ) -> Result<BuildReport> {
        progress(events, Phase::Collecting, 0);
        let provider =
            FolderContextProvider::new(request.workspace, request.classifier, request.budget);
        let aggregation = provider.collect(&request.root)?;
        let files_loaded = aggregation.state.processed_files;
        let bytes_loaded = aggregation.state.total_bytes;
        progress(
            events,
            Phase::Collecting,
            scale(bytes_loaded, request.budget.max_total_bytes, 0, COLLECT_END),
        );

        let mut report = BuildReport {
            status: BuildStatus::Cancelled,
            message: String::new(),
            files_loaded,
            bytes_loaded,
            did_prune: None,
            context_percentage: None,
            completion: String::new(),
        };

        if cancel.is_cancelled() {
            report.message = "Cache warm-up cancelled.".to_string();
            return Ok(report);
        }

        let entry = HistoryEntry::user(request.prompts.warmup, aggregation.items);
        let messages = construct_messages(&entry, &request.prompts.system, &request.settings);
        let prompt_bytes: usize = messages.iter().map(|m| m.content.len()).sum();
        tracing::info!(
            files = files_loaded,
            bytes = bytes_loaded,
            prompt_bytes,
            "sending warm-up request"
        );

        progress(events, Phase::Compiling, COMPILE_PERCENT);
        let expected = expected_completion_bytes(prompt_bytes);
        let dispatcher = ChatDispatcher::new(self.endpoint, self.telemetry);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let dispatch = async {
            let tx = tx;
            dispatcher
                .run(&messages, &entry, &request.options, store, &tx, cancel)
                .await
        };
        let relay = async {
            let mut received = 0_u64;
            while let Some(event) = rx.recv().await {
                if let DispatchEvent::Delta { content } = &event {
                    received += content.len() as u64;
                    progress(
                        events,
                        Phase::Streaming,
                        scale(received, expected, STREAM_START, STREAM_END),
                    );
                } else if matches!(event, DispatchEvent::Compiled { .. }) {
                    progress(events, Phase::Streaming, STREAM_START);
                }
                let _ = events.send(WarmEvent::Dispatch { event });
            }
        };
        let (outcome, ()) = tokio::join!(dispatch, relay);

        match outcome? {
            DispatchOutcome::Completed {
                completion,
                did_prune,
                context_percentage,
                ..
            } => {
                progress(events, Phase::Done, 100);
                report.status = BuildStatus::Completed;
                report.message =
                    completed_message(files_loaded, bytes_loaded, did_prune, context_percentage);
                report.did_prune = Some(did_prune);
                report.context_percentage = Some(context_percentage);
                report.completion = completion;
            }
            DispatchOutcome::OutOfContext { message } => {
                report.status = BuildStatus::OutOfContext;
                report.message = format!(
                    "Not enough context to load this folder ({message}). Lower the budget or pick a smaller folder."
                );
            }
            DispatchOutcome::Cancelled { partial } => {
                report.message = "Cache warm-up cancelled.".to_string();
                report.completion = partial;
            }
        }
        Ok(report)
    }
}

fn completed_message(files: usize, bytes: u64, did_prune: bool, pct: f64) -> String {
    #[allow(clippy::cast_precision_loss)]
    let kb = bytes as f64 / 1024.0;
    let mut message = format!("Loaded {files} files ({kb:.1} KB) into the model's cache.");
    if did_prune {
        let _ = write!(
            message,
            " Some content was pruned to fit the context window ({pct:.0}% used)."
        );
    }
    message
}

fn progress(events: &UnboundedSender<WarmEvent>, phase: Phase, percent: u8) {
    let _ = events.send(WarmEvent::Progress { phase, percent });
}

/// Completion size assumed when estimating stream progress.
fn expected_completion_bytes(prompt_bytes: usize) -> u64 {
    (prompt_bytes as u64 / 50).clamp(256, 8192)
}

/// Maps `value / max` onto `from..=to`, saturating at `to`.
fn scale(value: u64, max: u64, from: u8, to: u8) -> u8 {
    if max == 0 {
        return to;
    }
    let span = u64::from(to - from);
    let step = (value.min(max) * span) / max;
    from + u8::try_from(step).unwrap_or(to - from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::CompileResponse;
    use crate::core::{ContextItemKind, StreamChunk};
    use crate::dispatch::dispatcher::tests::ScriptedEndpoint;
    use crate::io::LocalWorkspace;
    use crate::storage::MemorySessionStore;
    use crate::telemetry::NoopTelemetry;
    use tempfile::TempDir;

    fn request<'a>(root: &TempDir, workspace: &'a LocalWorkspace) -> WarmRequest<'a> {
        WarmRequest {
            root: root.path().to_path_buf(),
            workspace,
            classifier: FileClassifier::default(),
            budget: FileBudget::default(),
            prompts: PromptSet::defaults(),
            settings: MessageSettings::default(),
            options: CompletionOptions::default(),
        }
    }

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("main.rs"), "fn main() {}").unwrap();
        std::fs::write(temp.path().join("logo.png"), "binary").unwrap();
        temp
    }

    async fn drain(mut rx: mpsc::UnboundedReceiver<WarmEvent>) -> Vec<WarmEvent> {
        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        events
    }

    #[test]
    fn test_scale() {
        assert_eq!(scale(0, 100, 0, 40), 0);
        assert_eq!(scale(50, 100, 0, 40), 20);
        assert_eq!(scale(500, 100, 60, 99), 99);
        assert_eq!(scale(1, 0, 60, 99), 99);
    }

    #[tokio::test]
    async fn test_warm_completes() {
        let temp = project();
        let workspace = LocalWorkspace::default();
        let endpoint = ScriptedEndpoint::new(
            ScriptedEndpoint::ok(false, 12.0),
            vec![
                Ok(StreamChunk::Delta("A small project.".to_string())),
                ScriptedEndpoint::done("A small project."),
            ],
        );
        let warmer = Warmer::new(&endpoint, &NoopTelemetry);
        let mut store = MemorySessionStore::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let report = warmer
            .warm(request(&temp, &workspace), &mut store, &tx, &CancellationToken::new())
            .await
            .unwrap();
        drop(tx);
        let events = drain(rx).await;

        assert_eq!(report.status, BuildStatus::Completed);
        assert_eq!(report.files_loaded, 1);
        assert_eq!(report.bytes_loaded, 12);
        assert_eq!(report.completion, "A small project.");
        assert!(report.message.starts_with("Loaded 1 files"));
        assert!(events.contains(&WarmEvent::Dispatch {
            event: DispatchEvent::Inactive
        }));
        assert_eq!(
            events.last(),
            Some(&WarmEvent::Progress {
                phase: Phase::Done,
                percent: 100
            })
        );

        let stored = store.entries().unwrap();
        assert_eq!(stored[0].context_items[0].kind, ContextItemKind::Summary);
        assert_eq!(stored[0].context_items[1].name, "main.rs");
    }

    #[tokio::test]
    async fn test_warm_out_of_context() {
        let temp = project();
        let workspace = LocalWorkspace::default();
        let endpoint = ScriptedEndpoint::new(
            Ok(CompileResponse::Error {
                error: "Not enough context for this request".to_string(),
            }),
            vec![],
        );
        let warmer = Warmer::new(&endpoint, &NoopTelemetry);
        let mut store = MemorySessionStore::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let report = warmer
            .warm(request(&temp, &workspace), &mut store, &tx, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.status, BuildStatus::OutOfContext);
        assert!(report.message.contains("Not enough context"));
    }

    #[tokio::test]
    async fn test_warm_missing_root_fails() {
        let temp = TempDir::new().unwrap();
        let workspace = LocalWorkspace::default();
        let endpoint = ScriptedEndpoint::new(ScriptedEndpoint::ok(false, 0.0), vec![]);
        let warmer = Warmer::new(&endpoint, &NoopTelemetry);
        let mut store = MemorySessionStore::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let mut req = request(&temp, &workspace);
        req.root = temp.path().join("missing");
        let err = warmer
            .warm(req, &mut store, &tx, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Context { .. }));
        assert_eq!(BuildReport::failed(&err).status, BuildStatus::Failed);
    }

    #[tokio::test]
    async fn test_warm_cancelled_before_dispatch() {
        let temp = project();
        let workspace = LocalWorkspace::default();
        let endpoint = ScriptedEndpoint::new(ScriptedEndpoint::ok(false, 0.0), vec![]);
        let warmer = Warmer::new(&endpoint, &NoopTelemetry);
        let mut store = MemorySessionStore::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = warmer
            .warm(request(&temp, &workspace), &mut store, &tx, &cancel)
            .await
            .unwrap();
        assert_eq!(report.status, BuildStatus::Cancelled);
        assert!(store.entries().unwrap().is_empty());
    }
}
