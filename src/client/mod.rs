//! Inference endpoint client.
//!
//! The [`LlmEndpoint`] trait is the seam between the dispatcher and the
//! server: a compile call that fits messages into the context window, and a
//! streaming call that yields partial output followed by a terminal record.
//! [`HttpEndpoint`] implements it over HTTP with server-sent events.

pub mod http;
pub mod types;

pub use http::HttpEndpoint;
pub use types::{CompileRequest, CompileResponse, CompiledChat, StreamEvent, StreamRequest};

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::core::{ChatMessage, CompletionOptions, StreamChunk};
use crate::error::Result;

/// Stream of output units from a chat call, in arrival order.
pub type ChunkStream = BoxStream<'static, Result<StreamChunk>>;

/// A remote completion endpoint.
#[async_trait]
pub trait LlmEndpoint: Send + Sync {
    /// Title of the model served by this endpoint.
    fn model_title(&self) -> &str;

    /// Fits `messages` into the model's context window.
    ///
    /// An `Error` response is returned as a value; `Err` means the call
    /// itself failed.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an undecodable response.
    async fn compile(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<CompileResponse>;

    /// Opens a streaming chat call.
    ///
    /// `cancel` is shared with the transport: once it fires the request is
    /// abandoned and the returned stream ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or is rejected.
    async fn stream_chat(
        &self,
        request: StreamRequest<'_>,
        cancel: CancellationToken,
    ) -> Result<ChunkStream>;
}
