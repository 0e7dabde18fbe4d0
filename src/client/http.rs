//! HTTP implementation of [`LlmEndpoint`].

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures_util::{StreamExt, future};
use reqwest::{Client, RequestBuilder, Response};
use tokio_util::sync::CancellationToken;

use super::types::{CompileRequest, CompileResponse, StreamEvent, StreamRequest};
use super::{ChunkStream, LlmEndpoint};
use crate::core::{ChatMessage, CompletionOptions, StreamChunk};
use crate::error::{ClientError, Result};
use crate::io::find_char_boundary;

/// Data payload that ends a stream.
const DONE_SENTINEL: &str = "[DONE]";

/// Longest upstream error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Endpoint reached over HTTP.
///
/// Compile is `POST {base}/compile`; streaming is `POST {base}/chat/stream`
/// answered with server-sent events whose data is a JSON [`StreamEvent`].
pub struct HttpEndpoint {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model_title: String,
}

impl HttpEndpoint {
    /// Creates a client for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        model_title: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::RequestFailed(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model_title: model_title.to_string(),
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let request = self.http.post(format!("{}/{path}", self.base_url));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl LlmEndpoint for HttpEndpoint {
    fn model_title(&self) -> &str {
        &self.model_title
    }

    async fn compile(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<CompileResponse> {
        tracing::debug!(messages = messages.len(), "compiling chat");
        let response = self
            .post("compile")
            .json(&CompileRequest { messages, options })
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<CompileResponse>().await?)
    }

    async fn stream_chat(
        &self,
        request: StreamRequest<'_>,
        cancel: CancellationToken,
    ) -> Result<ChunkStream> {
        tracing::debug!(
            messages = request.messages.len(),
            precompiled = request.messages_are_precompiled,
            "opening chat stream"
        );
        let send = self.post("chat/stream").json(&request).send();

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!("chat stream cancelled before response");
                return Ok(futures_util::stream::empty().boxed());
            }
            response = send => response?,
        };
        let response = ensure_success(response).await?;

        let stream = response
            .bytes_stream()
            .eventsource()
            .take_until(cancel.cancelled_owned())
            .take_while(|event| {
                future::ready(!matches!(event, Ok(e) if e.data.trim() == DONE_SENTINEL))
            })
            .filter_map(|event| future::ready(decode_event(event)));

        Ok(stream.boxed())
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let cut = find_char_boundary(&body, MAX_ERROR_BODY);
    Err(ClientError::Upstream {
        status: status.as_u16(),
        body: body[..cut].to_string(),
    }
    .into())
}

/// Maps one SSE event to an output unit; `None` skips it.
fn decode_event(
    event: std::result::Result<Event, EventStreamError<reqwest::Error>>,
) -> Option<Result<StreamChunk>> {
    let event = match event {
        Ok(event) => event,
        Err(e) => return Some(Err(ClientError::Stream(e.to_string()).into())),
    };

    let data = event.data.trim();
    if data.is_empty() {
        return None;
    }
    tracing::trace!(data, "chat stream event");

    let value: serde_json::Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => {
            return Some(Err(ClientError::InvalidResponse(format!(
                "SSE parsing error: {e}, data: {data}"
            ))
            .into()));
        }
    };

    let known = matches!(
        value.get("type").and_then(serde_json::Value::as_str),
        Some("delta" | "done" | "error")
    );
    if !known {
        tracing::warn!(data, "skipping unrecognized stream event");
        return None;
    }

    match serde_json::from_value::<StreamEvent>(value) {
        Ok(StreamEvent::Delta { content }) => Some(Ok(StreamChunk::Delta(content))),
        Ok(StreamEvent::Done(log)) => Some(Ok(StreamChunk::Done(log))),
        Ok(StreamEvent::Error { message }) => Some(Err(ClientError::Stream(message).into())),
        Err(e) => Some(Err(ClientError::InvalidResponse(format!(
            "SSE data schema error: {e}, data: {data}"
        ))
        .into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use futures_util::TryStreamExt;

    fn endpoint(url: &str) -> HttpEndpoint {
        HttpEndpoint::new(url, "test-model", Some("secret".to_string()), Duration::from_secs(5))
            .unwrap()
    }

    #[tokio::test]
    async fn test_compile_ok() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/compile")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"status":"ok","content":{"compiledMessages":[],"didPrune":false,"contextPercentage":12.0}}"#,
            )
            .create_async()
            .await;

        let response = endpoint(&server.url())
            .compile(&[ChatMessage::user("hi")], &CompletionOptions::default())
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(matches!(response, CompileResponse::Ok { .. }));
    }

    #[tokio::test]
    async fn test_compile_http_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/compile")
            .with_status(503)
            .with_body("model loading")
            .create_async()
            .await;

        let err = endpoint(&server.url())
            .compile(&[], &CompletionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Client(ClientError::Upstream { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_stream_chat_yields_deltas_then_done() {
        let mut server = mockito::Server::new_async().await;
        let body = concat!(
            "data: {\"type\":\"delta\",\"content\":\"Hel\"}\n\n",
            ": keepalive\n\n",
            "data: {\"type\":\"ping\"}\n\n",
            "data: {\"type\":\"delta\",\"content\":\"lo\"}\n\n",
            "data: {\"type\":\"done\",\"modelTitle\":\"m\",\"prompt\":\"p\",\"completion\":\"Hello\"}\n\n",
            "data: [DONE]\n\n",
            "data: {\"type\":\"delta\",\"content\":\"ignored\"}\n\n",
        );
        server
            .mock("POST", "/chat/stream")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"messagesArePrecompiled":true,"title":"test-model"}"#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let options = CompletionOptions::default();
        let request = StreamRequest {
            options: &options,
            title: "test-model",
            messages: &[],
            messages_are_precompiled: true,
        };
        let chunks: Vec<StreamChunk> = endpoint(&server.url())
            .stream_chat(request, CancellationToken::new())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], StreamChunk::Delta("Hel".to_string()));
        assert!(matches!(&chunks[2], StreamChunk::Done(log) if log.completion == "Hello"));
    }

    #[tokio::test]
    async fn test_stream_error_event() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/stream")
            .with_status(200)
            .with_body("data: {\"type\":\"error\",\"message\":\"overloaded\"}\n\n")
            .create_async()
            .await;

        let options = CompletionOptions::default();
        let request = StreamRequest {
            options: &options,
            title: "m",
            messages: &[],
            messages_are_precompiled: true,
        };
        let mut stream = endpoint(&server.url())
            .stream_chat(request, CancellationToken::new())
            .await
            .unwrap();
        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(Error::Client(ClientError::Stream(m))) if m == "overloaded"));
    }

    #[tokio::test]
    async fn test_cancel_cuts_open_stream() {
        use std::io::{Read, Write};

        // Sends one event, then keeps the body open.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf);
            let _ = socket.write_all(concat!(
                "HTTP/1.1 200 OK\r\n",
                "content-type: text/event-stream\r\n",
                "connection: close\r\n\r\n",
                "data: {\"type\":\"delta\",\"content\":\"Hel\"}\n\n",
            ).as_bytes());
            let _ = socket.flush();
            std::thread::sleep(Duration::from_secs(4));
        });

        let cancel = CancellationToken::new();
        let options = CompletionOptions::default();
        let request = StreamRequest {
            options: &options,
            title: "m",
            messages: &[],
            messages_are_precompiled: true,
        };
        let mut stream = endpoint(&format!("http://{addr}"))
            .stream_chat(request, cancel.clone())
            .await
            .unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, StreamChunk::Delta("Hel".to_string()));

        cancel.cancel();
        let rest = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap();
        assert!(rest.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_before_send_yields_empty_stream() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let options = CompletionOptions::default();
        let request = StreamRequest {
            options: &options,
            title: "m",
            messages: &[],
            messages_are_precompiled: true,
        };
        // Unroutable address; the cancelled token wins the select.
        let stream = endpoint("http://10.255.255.1:9")
            .stream_chat(request, cancel)
            .await
            .unwrap();
        let chunks: Vec<_> = stream.collect().await;
        assert!(chunks.is_empty());
    }
}
