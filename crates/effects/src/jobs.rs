//! In-memory effect job registry with a bounded retention policy.
//!
//! Jobs are independent of each other and of the generation queue.
//! Terminal jobs stay queryable until the retention sweep evicts them,
//! instead of accumulating for the lifetime of the process.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use retroreel_core::effects::EffectKind;

/// Effect job lifecycle. Transitions are one-directional:
/// `Queued → Processing → {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl EffectStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One tracked effect job.
#[derive(Debug, Clone, Serialize)]
pub struct EffectJob {
    pub id: Uuid,
    pub source_video_id: Uuid,
    pub kind: EffectKind,
    pub status: EffectStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_video_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl EffectJob {
    pub fn new(source_video_id: Uuid, kind: EffectKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_video_id,
            kind,
            status: EffectStatus::Queued,
            progress: 0,
            output_video_id: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Shared registry of effect jobs.
#[derive(Default)]
pub struct EffectJobStore {
    jobs: RwLock<HashMap<Uuid, EffectJob>>,
}

impl EffectJobStore {
    pub async fn insert(&self, job: EffectJob) {
        self.jobs.write().await.insert(job.id, job);
    }

    pub async fn get(&self, id: Uuid) -> Option<EffectJob> {
        self.jobs.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    pub async fn mark_processing(&self, id: Uuid) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(&id) {
            if job.status == EffectStatus::Queued {
                job.status = EffectStatus::Processing;
            }
        }
    }

    /// Update progress while processing. Values must be non-decreasing;
    /// out-of-order updates are ignored.
    pub async fn set_progress(&self, id: Uuid, progress: u8) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(&id) {
            if job.status == EffectStatus::Processing && progress > job.progress {
                job.progress = progress.min(100);
            }
        }
    }

    pub async fn complete(&self, id: Uuid, output_video_id: Uuid) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(&id) {
            if !job.status.is_terminal() {
                job.status = EffectStatus::Completed;
                job.progress = 100;
                job.output_video_id = Some(output_video_id);
                job.finished_at = Some(Utc::now());
            }
        }
    }

    pub async fn fail(&self, id: Uuid, error: String) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(&id) {
            if !job.status.is_terminal() {
                job.status = EffectStatus::Failed;
                job.error = Some(error);
                job.finished_at = Some(Utc::now());
            }
        }
    }

    /// Evict terminal jobs whose terminal transition is older than
    /// `max_age`. Returns the number of evicted jobs.
    pub async fn evict_terminal(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_age).unwrap_or_else(|_| chrono::Duration::hours(1));
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| {
            !(job.status.is_terminal() && job.finished_at.is_some_and(|t| t < cutoff))
        });
        before - jobs.len()
    }
}

/// Periodic sweep applying the retention policy until cancelled.
pub fn spawn_retention_sweep(
    store: Arc<EffectJobStore>,
    retention: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let evicted = store.evict_terminal(retention).await;
                    if evicted > 0 {
                        tracing::debug!(evicted, "Evicted terminal effect jobs");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn processing_job(store: &EffectJobStore) -> Uuid {
        let job = EffectJob::new(Uuid::new_v4(), EffectKind::VhsV1);
        let id = job.id;
        store.insert(job).await;
        store.mark_processing(id).await;
        id
    }

    #[tokio::test]
    async fn progress_is_monotonic() {
        let store = EffectJobStore::default();
        let id = processing_job(&store).await;

        store.set_progress(id, 40).await;
        store.set_progress(id, 20).await; // out-of-order, ignored
        assert_eq!(store.get(id).await.unwrap().progress, 40);
        store.set_progress(id, 90).await;
        assert_eq!(store.get(id).await.unwrap().progress, 90);
    }

    #[tokio::test]
    async fn progress_ignored_before_processing() {
        let store = EffectJobStore::default();
        let job = EffectJob::new(Uuid::new_v4(), EffectKind::Upscale);
        let id = job.id;
        store.insert(job).await;

        store.set_progress(id, 50).await;
        assert_eq!(store.get(id).await.unwrap().progress, 0);
    }

    #[tokio::test]
    async fn terminal_states_are_sticky() {
        let store = EffectJobStore::default();
        let id = processing_job(&store).await;
        let output = Uuid::new_v4();

        store.complete(id, output).await;
        store.fail(id, "late failure".into()).await;

        let job = store.get(id).await.unwrap();
        assert_eq!(job.status, EffectStatus::Completed);
        assert_eq!(job.output_video_id, Some(output));
        assert!(job.error.is_none());
        assert_eq!(job.progress, 100);
    }

    #[tokio::test]
    async fn eviction_removes_only_old_terminal_jobs() {
        let store = EffectJobStore::default();
        let done = processing_job(&store).await;
        store.fail(done, "boom".into()).await;
        let live = processing_job(&store).await;

        // Zero retention: anything terminal is already past the cutoff.
        let evicted = store.evict_terminal(Duration::ZERO).await;
        assert_eq!(evicted, 1);
        assert!(store.get(done).await.is_none());
        assert!(store.get(live).await.is_some());
    }
}
