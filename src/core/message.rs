//! Chat messages, history entries, and streamed output units.

use serde::{Deserialize, Serialize};

use super::item::ContextItem;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// The user turn.
    User,
    /// Model output.
    Assistant,
}

impl Role {
    /// Returns the lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// A single model-ready message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message author.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One synthetic turn: a message plus the context items attached to it.
///
/// The cache-build request is made from exactly one of these; it has no
/// relation to the stored multi-turn history beyond being merged into it
/// (hidden) once the response arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The turn's message.
    pub message: ChatMessage,
    /// Context items rendered inline with the message.
    #[serde(default)]
    pub context_items: Vec<ContextItem>,
}

impl HistoryEntry {
    /// Creates a user turn carrying the given context.
    #[must_use]
    pub fn user(prompt: impl Into<String>, context_items: Vec<ContextItem>) -> Self {
        Self {
            message: ChatMessage::user(prompt),
            context_items,
        }
    }
}

/// Options passed opaquely to the compile and streaming calls.
///
/// Serializes to `{}` when nothing is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOptions {
    /// Maximum tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// A prompt/completion pair recorded once a stream completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptLog {
    /// Title of the model that served the request.
    #[serde(default)]
    pub model_title: String,
    /// Prompt as rendered by the server.
    pub prompt: String,
    /// Full completion text.
    pub completion: String,
}

/// An incremental unit of model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// Partial completion text.
    Delta(String),
    /// Terminal unit carrying the full prompt/completion record.
    Done(PromptLog),
}
