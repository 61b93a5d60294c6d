//! Seedance HTTP client: submit, poll, and artifact fetch.
//!
//! Async submit + poll pattern against the ModelArk-compatible REST
//! surface. Every poll emits the upstream status (and any message line)
//! as a [`ProviderEvent`], which the caller consumes for heuristic
//! progress. This layer classifies failures but performs no retries;
//! the retry/backoff policy lives in the generation client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use retroreel_core::generation::GenerationRequest;

use crate::provider::{GenerationOutput, ProviderError, ProviderEvent, VideoProvider};

/// Default base URL for the generation service.
const DEFAULT_BASE_URL: &str = "https://ark.byteplus.com/api/v3";

/// Default model identifier.
const DEFAULT_MODEL_ID: &str = "seedance-1-0-lite";

/// Delay between status polls while a task is in flight.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Hard cap on artifact downloads (500 MiB).
const MAX_DOWNLOAD_BYTES: u64 = 500 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<&'a str>,
    duration: u32,
    resolution: &'a str,
    camera_fixed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default, flatten)]
    output: Option<GenerationOutput>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the Seedance generation service.
pub struct SeedanceClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model_id: String,
    poll_interval: Duration,
}

impl SeedanceClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::Permanent(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model_id(mut self, model: impl Into<String>) -> Self {
        self.model_id = model.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn submit_url(&self) -> String {
        format!("{}/video/generations", self.base_url)
    }

    fn poll_url(&self, task_id: &str) -> String {
        format!("{}/video/generations/{task_id}", self.base_url)
    }

    /// Map an HTTP response status onto the retry classification.
    ///
    /// Rate limits and 5xx are retryable; every other non-success
    /// status (validation-class 4xx included) is permanent.
    fn classify_status(status: StatusCode, body: &str) -> ProviderError {
        let truncated: String = body.chars().take(500).collect();
        let message = format!("Generation service returned {status}: {truncated}");
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            ProviderError::Retryable(message)
        } else {
            ProviderError::Permanent(message)
        }
    }

    /// Map a transport-level error; timeouts and connection failures
    /// are retryable.
    fn classify_transport(err: reqwest::Error) -> ProviderError {
        if err.is_timeout() || err.is_connect() {
            ProviderError::Retryable(format!("Network failure: {err}"))
        } else {
            ProviderError::Permanent(format!("Request failed: {err}"))
        }
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let body = SubmitRequest {
            model: &self.model_id,
            prompt: request.prompt.trim(),
            image_url: request.image_url.as_deref(),
            duration: request.duration.secs(),
            resolution: request.resolution.label(),
            camera_fixed: request.camera_fixed,
            seed: request.seed,
        };

        let resp = self
            .http
            .post(self.submit_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        let status = resp.status();
        let text = resp.text().await.map_err(Self::classify_transport)?;
        if !status.is_success() {
            return Err(Self::classify_status(status, &text));
        }

        let parsed: SubmitResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Permanent(format!("Malformed submit response: {e}")))?;
        tracing::info!(task_id = %parsed.id, "Generation task submitted");
        Ok(parsed.id)
    }

    async fn poll_once(&self, task_id: &str) -> Result<PollResponse, ProviderError> {
        let resp = self
            .http
            .get(self.poll_url(task_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        let status = resp.status();
        let text = resp.text().await.map_err(Self::classify_transport)?;
        if !status.is_success() {
            return Err(Self::classify_status(status, &text));
        }

        serde_json::from_str(&text)
            .map_err(|e| ProviderError::Permanent(format!("Malformed poll response: {e}")))
    }
}

#[async_trait]
impl VideoProvider for SeedanceClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
        events: mpsc::Sender<ProviderEvent>,
    ) -> Result<GenerationOutput, ProviderError> {
        let task_id = self.submit(request).await?;
        let _ = events.send(ProviderEvent::Status("submitted".into())).await;

        let mut last_status = String::new();
        loop {
            tokio::time::sleep(self.poll_interval).await;
            let poll = self.poll_once(&task_id).await?;

            if poll.status != last_status {
                tracing::debug!(task_id = %task_id, status = %poll.status, "Generation status");
                let _ = events.send(ProviderEvent::Status(poll.status.clone())).await;
                last_status = poll.status.clone();
            }
            if let Some(message) = poll.message {
                let _ = events.send(ProviderEvent::Log(message)).await;
            }

            match poll.status.as_str() {
                "queued" | "pending" | "processing" | "running" => continue,
                "completed" | "succeeded" => {
                    return poll.output.ok_or_else(|| {
                        ProviderError::Permanent(
                            "Completed task is missing its output payload".into(),
                        )
                    });
                }
                "failed" | "error" => {
                    return Err(ProviderError::Permanent(format!(
                        "Generation failed upstream: {}",
                        poll.error.unwrap_or_else(|| "unknown error".into()),
                    )));
                }
                other => {
                    // Unknown statuses are treated as still in flight.
                    tracing::warn!(task_id = %task_id, status = %other, "Unknown task status");
                }
            }
        }
    }

    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, ProviderError> {
        let mut resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        if !resp.status().is_success() {
            return Err(Self::classify_status(resp.status(), ""));
        }
        if let Some(len) = resp.content_length() {
            if len > MAX_DOWNLOAD_BYTES {
                return Err(ProviderError::Permanent(format!(
                    "Artifact too large: {len} bytes (limit {MAX_DOWNLOAD_BYTES})"
                )));
            }
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| ProviderError::Permanent(format!("Cannot create {}: {e}", dest.display())))?;

        let mut total = 0u64;
        while let Some(chunk) = resp.chunk().await.map_err(Self::classify_transport)? {
            total = total.saturating_add(chunk.len() as u64);
            if total > MAX_DOWNLOAD_BYTES {
                let _ = tokio::fs::remove_file(dest).await;
                return Err(ProviderError::Permanent(format!(
                    "Artifact exceeded download limit ({MAX_DOWNLOAD_BYTES} bytes)"
                )));
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| ProviderError::Permanent(format!("Write failed: {e}")))?;
        }
        file.flush()
            .await
            .map_err(|e| ProviderError::Permanent(format!("Flush failed: {e}")))?;

        tracing::info!(bytes = total, dest = %dest.display(), "Artifact downloaded");
        Ok(total)
    }
}
