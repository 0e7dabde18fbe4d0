//! Fire-and-forget telemetry.
//!
//! Sinks return errors so callers can log them; the dispatcher never lets a
//! telemetry failure affect the outcome of a request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::{ClientError, Result};

/// Event recorded after a completed chat.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    /// Event name.
    pub event: String,
    /// Model title.
    pub model: String,
    /// Rendered prompt length in bytes.
    pub prompt_bytes: usize,
    /// Completion length in bytes.
    pub completion_bytes: usize,
    /// Whether the compile step pruned content.
    pub did_prune: bool,
    /// Context window utilization reported by the compile step.
    pub context_percentage: f64,
}

/// Destination for telemetry events.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Records an event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event could not be delivered.
    async fn capture(&self, event: &TelemetryEvent) -> Result<()>;
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

#[async_trait]
impl TelemetrySink for NoopTelemetry {
    async fn capture(&self, _event: &TelemetryEvent) -> Result<()> {
        Ok(())
    }
}

/// Writes events to the log at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTelemetry;

#[async_trait]
impl TelemetrySink for LogTelemetry {
    async fn capture(&self, event: &TelemetryEvent) -> Result<()> {
        tracing::info!(
            event = %event.event,
            model = %event.model,
            prompt_bytes = event.prompt_bytes,
            completion_bytes = event.completion_bytes,
            did_prune = event.did_prune,
            context_percentage = event.context_percentage,
            "telemetry"
        );
        Ok(())
    }
}

/// Posts events as JSON to a collector URL.
pub struct HttpTelemetry {
    http: Client,
    url: String,
}

impl HttpTelemetry {
    /// Creates a sink posting to `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Telemetry(e.to_string()))?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl TelemetrySink for HttpTelemetry {
    async fn capture(&self, event: &TelemetryEvent) -> Result<()> {
        let response = self
            .http
            .post(&self.url)
            .json(&serde_json::json!({ "event": event.event, "properties": event }))
            .send()
            .await
            .map_err(|e| ClientError::Telemetry(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ClientError::Telemetry(format!(
                "collector returned {}",
                response.status()
            ))
            .into());
        }
        Ok(())
    }
}

/// Creates a sink: HTTP when a URL is configured, log otherwise.
///
/// # Errors
///
/// Returns an error if the HTTP sink cannot be built.
pub fn create_sink(url: Option<&str>, timeout: Duration) -> Result<Box<dyn TelemetrySink>> {
    match url {
        Some(url) if !url.trim().is_empty() => Ok(Box::new(HttpTelemetry::new(url, timeout)?)),
        _ => Ok(Box::new(LogTelemetry)),
    }
}
