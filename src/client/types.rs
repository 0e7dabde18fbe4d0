//! Wire types for the compile and streaming calls.

use serde::{Deserialize, Serialize};

use crate::core::{ChatMessage, CompletionOptions, PromptLog};

/// Body of a compile call.
#[derive(Debug, Clone, Serialize)]
pub struct CompileRequest<'a> {
    /// Constructed messages.
    pub messages: &'a [ChatMessage],
    /// Opaque completion options.
    pub options: &'a CompletionOptions,
}

/// Messages after the server fitted them into the model's context window.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledChat {
    /// Messages to send, already budgeted.
    pub compiled_messages: Vec<ChatMessage>,
    /// Whether content was dropped to fit.
    #[serde(default)]
    pub did_prune: bool,
    /// Context window utilization, 0 to 100.
    #[serde(default)]
    pub context_percentage: f64,
}

/// Result of a compile call.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CompileResponse {
    /// Compilation succeeded.
    Ok {
        /// Compiled messages and utilization.
        content: CompiledChat,
    },
    /// Compilation failed.
    Error {
        /// Server-provided message.
        error: String,
    },
}

/// Body of a streaming chat call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest<'a> {
    /// Opaque completion options.
    pub options: &'a CompletionOptions,
    /// Model title.
    pub title: &'a str,
    /// Messages to send.
    pub messages: &'a [ChatMessage],
    /// True when `messages` came out of a compile call.
    pub messages_are_precompiled: bool,
}

/// One server-sent event payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Partial completion text.
    Delta {
        /// Text increment.
        content: String,
    },
    /// Terminal record.
    Done(PromptLog),
    /// Server-side failure mid-stream.
    Error {
        /// Server-provided message.
        message: String,
    },
}
