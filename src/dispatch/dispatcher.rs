//! Chat dispatcher.
//!
//! Drives one request through compile and stream, relaying progress as
//! [`DispatchEvent`]s and recording the result in the session store.

use std::sync::OnceLock;

use futures_util::StreamExt;
use regex::Regex;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::client::{CompileResponse, LlmEndpoint, StreamRequest};
use crate::core::{ChatMessage, CompletionOptions, HistoryEntry, StreamChunk};
use crate::dispatch::state::{DispatchEvent, DispatchOutcome, DispatchState};
use crate::error::{ClientError, Result};
use crate::storage::{SessionEntry, SessionStore};
use crate::telemetry::{TelemetryEvent, TelemetrySink};

/// Telemetry event name for a completed chat.
pub const CHAT_EVENT: &str = "chat";

/// Returns true if a compile error means the request does not fit the
/// model's context window.
#[must_use]
#[allow(clippy::expect_used)]
pub fn is_out_of_context(message: &str) -> bool {
    static OUT_OF_CONTEXT: OnceLock<Regex> = OnceLock::new();
    OUT_OF_CONTEXT
        .get_or_init(|| Regex::new(r"(?i)not\s+enough\s+context").expect("valid regex"))
        .is_match(message)
}

/// Sends compiled chat requests and consumes their streams.
pub struct ChatDispatcher<'a> {
    endpoint: &'a dyn LlmEndpoint,
    telemetry: &'a dyn TelemetrySink,
}

impl<'a> ChatDispatcher<'a> {
    /// Creates a dispatcher over an endpoint and a telemetry sink.
    #[must_use]
    pub fn new(endpoint: &'a dyn LlmEndpoint, telemetry: &'a dyn TelemetrySink) -> Self {
        Self {
            endpoint,
            telemetry,
        }
    }

    /// Runs one dispatch.
    ///
    /// `messages` is the constructed request; `entry` is the synthetic turn
    /// it was built from and is stored hidden together with an assistant
    /// slot that receives the completion.
    ///
    /// An `Inactive` event closes every path except the out-of-context
    /// return.
    ///
    /// # Errors
    ///
    /// Returns an error if the compile call fails for any reason other than
    /// running out of context, if the stream cannot be opened or fails, or
    /// if the session store rejects a write.
    pub async fn run(
        &self,
        messages: &[ChatMessage],
        entry: &HistoryEntry,
        options: &CompletionOptions,
        store: &mut dyn SessionStore,
        events: &UnboundedSender<DispatchEvent>,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome> {
        let result = self
            .dispatch(messages, entry, options, store, events, cancel)
            .await;

        match &result {
            Ok(DispatchOutcome::OutOfContext { .. }) => {}
            Ok(outcome) => {
                emit(events, DispatchEvent::State {
                    state: outcome.state(),
                });
                emit(events, DispatchEvent::Inactive);
            }
            Err(e) => {
                tracing::debug!(error = %e, "dispatch failed");
                emit(events, DispatchEvent::State {
                    state: DispatchState::Failed,
                });
                emit(events, DispatchEvent::Inactive);
            }
        }
        result
    }

    async fn dispatch(
        &self,
        messages: &[ChatMessage],
        entry: &HistoryEntry,
        options: &CompletionOptions,
        store: &mut dyn SessionStore,
        events: &UnboundedSender<DispatchEvent>,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome> {
        emit(events, DispatchEvent::State {
            state: DispatchState::Submitting,
        });
        store.push_entry(
            SessionEntry::new(entry.message.clone(), entry.context_items.clone()).hidden(),
        )?;
        let slot = store.push_entry(SessionEntry::new(ChatMessage::assistant(""), vec![]).hidden())?;

        emit(events, DispatchEvent::State {
            state: DispatchState::Compiling,
        });
        let compiled = match self.endpoint.compile(messages, options).await? {
            CompileResponse::Ok { content } => content,
            CompileResponse::Error { error } if is_out_of_context(&error) => {
                tracing::warn!(message = %error, "request does not fit the context window");
                emit(events, DispatchEvent::State {
                    state: DispatchState::OutOfContext,
                });
                emit(events, DispatchEvent::OutOfContext {
                    message: error.clone(),
                });
                return Ok(DispatchOutcome::OutOfContext { message: error });
            }
            CompileResponse::Error { error } => return Err(ClientError::Compile(error).into()),
        };

        let mut assistant = SessionEntry::new(ChatMessage::assistant(""), vec![]).hidden();
        assistant.did_prune = Some(compiled.did_prune);
        assistant.context_percentage = Some(compiled.context_percentage);
        store.update_entry(slot, &assistant)?;
        emit(events, DispatchEvent::Compiled {
            did_prune: compiled.did_prune,
            context_percentage: compiled.context_percentage,
        });
        tracing::debug!(
            did_prune = compiled.did_prune,
            context_percentage = compiled.context_percentage,
            messages = compiled.compiled_messages.len(),
            "compiled"
        );

        emit(events, DispatchEvent::State {
            state: DispatchState::Streaming,
        });
        let request = StreamRequest {
            options,
            title: self.endpoint.model_title(),
            messages: &compiled.compiled_messages,
            messages_are_precompiled: true,
        };
        let mut stream = self.endpoint.stream_chat(request, cancel.clone()).await?;

        let mut completion = String::new();
        let mut prompt_log = None;
        let mut cancelled = cancel.is_cancelled();

        while !cancelled && let Some(chunk) = stream.next().await {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            match chunk? {
                StreamChunk::Delta(text) => {
                    completion.push_str(&text);
                    emit(events, DispatchEvent::Delta { content: text });
                }
                StreamChunk::Done(log) => {
                    prompt_log = Some(log);
                    break;
                }
            }
        }
        // The transport ends the stream quietly when the token fires.
        cancelled |= cancel.is_cancelled() && prompt_log.is_none();

        assistant.message.content.clone_from(&completion);
        store.update_entry(slot, &assistant)?;

        if cancelled {
            tracing::debug!(received = completion.len(), "stream cancelled");
            return Ok(DispatchOutcome::Cancelled {
                partial: completion,
            });
        }

        if let Some(log) = &prompt_log {
            store.append_prompt_log(log)?;
            let event = TelemetryEvent {
                event: CHAT_EVENT.to_string(),
                model: self.endpoint.model_title().to_string(),
                prompt_bytes: log.prompt.len(),
                completion_bytes: log.completion.len(),
                did_prune: compiled.did_prune,
                context_percentage: compiled.context_percentage,
            };
            if let Err(e) = self.telemetry.capture(&event).await {
                tracing::warn!(error = %e, "failed to record telemetry");
            }
        }

        Ok(DispatchOutcome::Completed {
            completion,
            prompt_log,
            did_prune: compiled.did_prune,
            context_percentage: compiled.context_percentage,
        })
    }
}

/// Sends an event; a closed channel means nobody is listening.
fn emit(events: &UnboundedSender<DispatchEvent>, event: DispatchEvent) {
    let _ = events.send(event);
}
