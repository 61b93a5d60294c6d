//! Upstream-facing generation trait and its classified error model.

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::mpsc;

use retroreel_core::generation::GenerationRequest;

/// Upstream failure, classified for the retry policy.
///
/// `Retryable` covers rate limits, 5xx responses, timeouts, and network
/// failures. Everything else, including validation-class 4xx, is
/// `Permanent` and must never be retried.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Retryable upstream error: {0}")]
    Retryable(String),

    #[error("Permanent upstream error: {0}")]
    Permanent(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

/// One intermediate event observed while a generation is in flight.
///
/// Consumers use the running event count for heuristic progress; the
/// payloads are informational.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// Upstream status transition (`queued`, `running`, ...).
    Status(String),
    /// Free-form upstream log/message line.
    Log(String),
}

/// Successful generation result as reported by the upstream service.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct GenerationOutput {
    /// Artifact download URL.
    pub video_url: String,
    pub content_type: String,
    pub file_name: String,
    pub size_bytes: u64,
    pub duration_secs: f64,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    /// Provider-assigned seed (echoed or chosen upstream).
    pub seed: i64,
}

impl GenerationOutput {
    /// File extension for the artifact, from the reported file name
    /// with a content-type fallback.
    pub fn extension(&self) -> &str {
        if let Some((_, ext)) = self.file_name.rsplit_once('.') {
            if !ext.is_empty() {
                return ext;
            }
        }
        match self.content_type.as_str() {
            "video/webm" => "webm",
            "video/quicktime" => "mov",
            _ => "mp4",
        }
    }
}

/// One external generation call with streamed intermediate events.
///
/// Implementations send zero or more [`ProviderEvent`]s on `events`
/// while the call is in flight; the receiver side may lag or close
/// without affecting the call's outcome.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Run one generation to completion (no retries at this layer).
    async fn generate(
        &self,
        request: &GenerationRequest,
        events: mpsc::Sender<ProviderEvent>,
    ) -> Result<GenerationOutput, ProviderError>;

    /// Download an artifact URL into `dest`, returning the byte count.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, ProviderError>;
}
