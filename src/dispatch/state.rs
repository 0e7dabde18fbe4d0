//! Dispatcher states, events, and outcomes.

use serde::Serialize;

use crate::core::PromptLog;

/// Lifecycle of one chat dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    /// Nothing in flight.
    Idle,
    /// History slot being registered.
    Submitting,
    /// Waiting for the compile step.
    Compiling,
    /// Consuming the response stream.
    Streaming,
    /// Stream finished.
    Completed,
    /// An error ended the dispatch.
    Failed,
    /// The compile step reported the context window is too small.
    OutOfContext,
    /// The caller cancelled mid-stream.
    Cancelled,
}

impl DispatchState {
    /// Returns true for states that end a dispatch.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::OutOfContext | Self::Cancelled
        )
    }
}

/// Notification pushed to the presenter while a dispatch runs.
///
/// Events arrive in the order they happened; deltas in stream order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DispatchEvent {
    /// The dispatcher entered a new state.
    State {
        /// The new state.
        state: DispatchState,
    },
    /// The compile step succeeded.
    Compiled {
        /// Whether content was dropped to fit the window.
        did_prune: bool,
        /// Context window utilization, 0 to 100.
        context_percentage: f64,
    },
    /// A piece of streamed completion text.
    Delta {
        /// Text increment.
        content: String,
    },
    /// The compile step rejected the request for lack of context.
    OutOfContext {
        /// Server-provided message.
        message: String,
    },
    /// The dispatcher is idle again.
    Inactive,
}

/// How a dispatch ended, when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The stream ran to completion.
    Completed {
        /// Accumulated completion text.
        completion: String,
        /// Terminal record, if the stream produced one.
        prompt_log: Option<PromptLog>,
        /// Whether the compile step pruned content.
        did_prune: bool,
        /// Context window utilization reported by the compile step.
        context_percentage: f64,
    },
    /// The compile step reported there is not enough context.
    OutOfContext {
        /// Server-provided message.
        message: String,
    },
    /// The caller cancelled the stream.
    Cancelled {
        /// Completion text received before cancellation.
        partial: String,
    },
}

impl DispatchOutcome {
    /// Terminal state matching this outcome.
    #[must_use]
    pub const fn state(&self) -> DispatchState {
        match self {
            Self::Completed { .. } => DispatchState::Completed,
            Self::OutOfContext { .. } => DispatchState::OutOfContext,
            Self::Cancelled { .. } => DispatchState::Cancelled,
        }
    }
}
