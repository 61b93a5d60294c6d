//! Retrying generation client.
//!
//! Wraps a [`VideoProvider`] with the retry policy and turns its event
//! stream into heuristic progress for the queue. On success the artifact
//! is downloaded to scratch and persisted through the metadata store
//! before the job is reported complete.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use retroreel_core::generation::GenerationRequest;
use retroreel_seedance::{GenerationOutput, ProviderError, ProviderEvent, VideoProvider};
use retroreel_store::{MetadataStore, VideoMetadata};
use tokio::sync::mpsc;

use crate::engine::queue::JobResult;

/// Progress observer. `progress` is `0..=PROGRESS_CEILING` and
/// non-decreasing over the whole run, retries included; 100 is never
/// reported here (the queue owns the completion transition).
pub type ProgressFn<'a> = dyn Fn(u8, Option<String>) + Send + Sync + 'a;

/// Highest value the progress callback ever reports; reached when the
/// artifact download starts. The queue enforces the same ceiling.
pub const PROGRESS_CEILING: u8 = 95;

/// Assumed number of provider events for a full run; used to map the
/// running event count onto a progress percentage.
const ASSUMED_EVENTS: u64 = 30;
/// Progress ceiling while the provider call is in flight.
const PROVIDER_PROGRESS_CAP: u8 = 90;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

pub struct GenerationClient {
    provider: Arc<dyn VideoProvider>,
    store: Arc<MetadataStore>,
    retry: RetryConfig,
}

impl GenerationClient {
    pub fn new(provider: Arc<dyn VideoProvider>, store: Arc<MetadataStore>) -> Self {
        Self {
            provider,
            store,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Run one generation end to end.
    ///
    /// Retryable provider failures are retried with exponential backoff
    /// and jitter, up to `max_attempts` total attempts. A permanent
    /// failure propagates immediately with zero further attempts.
    pub async fn run(
        &self,
        request: &GenerationRequest,
        on_progress: &ProgressFn<'_>,
    ) -> Result<JobResult, String> {
        // A retry restarts the provider's event stream from zero, so
        // reported values are pinned to the high-water mark to keep the
        // callback non-decreasing across attempts.
        let high_water = AtomicU8::new(0);
        let monotonic = |progress: u8, message: Option<String>| {
            let previous = high_water.fetch_max(progress, Ordering::SeqCst);
            on_progress(progress.max(previous), message);
        };

        let mut attempt = 1;
        loop {
            match self.attempt(request, &monotonic).await {
                Ok(result) => return Ok(result),
                Err(error) if error.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.backoff_delay(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Generation attempt failed, retrying",
                    );
                    monotonic(
                        high_water.load(Ordering::SeqCst),
                        Some(format!("retrying (attempt {})", attempt + 1)),
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error.to_string()),
            }
        }
    }

    /// One attempt: provider call with event-driven progress, then
    /// download and persist.
    async fn attempt(
        &self,
        request: &GenerationRequest,
        on_progress: &ProgressFn<'_>,
    ) -> Result<JobResult, ProviderError> {
        let (events_tx, mut events_rx) = mpsc::channel::<ProviderEvent>(16);
        let provider = Arc::clone(&self.provider);
        let owned_request = request.clone();
        let call = tokio::spawn(async move {
            provider.generate(&owned_request, events_tx).await
        });

        // The channel closes when the provider call returns, ending
        // this loop; event count maps onto a bounded progress value.
        let mut event_count: u64 = 0;
        while let Some(event) = events_rx.recv().await {
            event_count += 1;
            let progress = progress_for_event_count(event_count);
            match event {
                ProviderEvent::Status(status) => on_progress(progress, Some(status)),
                ProviderEvent::Log(line) => {
                    tracing::debug!(line = %line, "Provider log");
                    on_progress(progress, None);
                }
            }
        }

        let output = call
            .await
            .map_err(|e| ProviderError::Permanent(format!("Generation task failed: {e}")))??;

        self.persist(request, &output, on_progress).await
    }

    /// Download the artifact and write the metadata row. Store failures
    /// are permanent: the clip was generated, retrying the whole
    /// pipeline would bill a second generation for a local fault.
    async fn persist(
        &self,
        request: &GenerationRequest,
        output: &GenerationOutput,
        on_progress: &ProgressFn<'_>,
    ) -> Result<JobResult, ProviderError> {
        let metadata = VideoMetadata::for_generation(request, output.extension());
        on_progress(PROGRESS_CEILING, Some("downloading".to_string()));

        let scratch = self.store.scratch_path(&metadata.filename);
        let bytes = self.provider.fetch(&output.video_url, &scratch).await?;
        tracing::debug!(video_id = %metadata.id, bytes, "Artifact downloaded");

        let metadata = self
            .store
            .save_artifact(&scratch, metadata)
            .await
            .map_err(|e| ProviderError::Permanent(format!("Failed to persist artifact: {e}")))?;

        Ok(JobResult {
            video_id: metadata.id,
            filename: metadata.filename,
        })
    }

    /// base * 2^(attempt-1), up to 10% uniform jitter, capped.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .retry
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let jitter = rand::rng().random_range(0.0..0.10);
        exp.mul_f64(1.0 + jitter).min(self.retry.max_delay)
    }
}

fn progress_for_event_count(events: u64) -> u8 {
    let scaled = events * u64::from(PROVIDER_PROGRESS_CAP) / ASSUMED_EVENTS;
    scaled.min(u64::from(PROVIDER_PROGRESS_CAP)) as u8
}
