//! In-memory generation queue.
//!
//! Strict FIFO with a single-flight driver: at most one generation is
//! in flight at any time, enforced by a one-permit semaphore the driver
//! holds for the duration of a dispatch. The driver is woken by
//! [`Notify`] on enqueue and re-checks for pending work immediately
//! after each terminal transition; it never ticks on a fixed interval.
//!
//! State transitions are one-way: Pending -> Processing ->
//! {Completed | Failed}. A pending job may instead be removed outright.
//! Terminal jobs stay visible until the retention sweep evicts them.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use retroreel_core::generation::{validate_request, GenerationRequest};
use retroreel_core::CoreError;

use crate::engine::client::{GenerationClient, PROGRESS_CEILING};

/// How often the retention sweep wakes up.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, GenerationStatus::Completed | GenerationStatus::Failed)
    }
}

/// Outcome of a completed generation.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub video_id: Uuid,
    pub filename: String,
}

/// One queued generation, visible through the queue snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationJob {
    pub id: Uuid,
    pub status: GenerationStatus,
    /// 0..=100; strictly monotonic over the job's lifetime.
    pub progress: u8,
    pub status_message: Option<String>,
    pub request: GenerationRequest,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Recomputed from the job's live queue position for pending jobs.
    pub estimated_wait_secs: u64,
    pub result: Option<JobResult>,
    pub error: Option<String>,
}

/// Returned to the caller on enqueue.
#[derive(Debug, Clone, Serialize)]
pub struct EnqueueReceipt {
    pub id: Uuid,
    /// 1-based count of pending jobs, this one included. A job already
    /// in flight does not count.
    pub position: usize,
    pub estimated_wait_secs: u64,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    /// Newest-first.
    pub jobs: Vec<GenerationJob>,
    pub stats: QueueStats,
}

struct QueueInner {
    jobs: HashMap<Uuid, GenerationJob>,
    /// Pending ids in FIFO order. Processing/terminal jobs are not here.
    order: VecDeque<Uuid>,
    processing: Option<Uuid>,
}

/// The queue proper. Cheap to share behind an `Arc`; all mutation goes
/// through a short non-async critical section, so progress callbacks
/// can update it from sync context.
pub struct GenerationQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    single_flight: Semaphore,
    avg_processing_secs: u64,
}

impl GenerationQueue {
    pub fn new(avg_processing_secs: u64) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                jobs: HashMap::new(),
                order: VecDeque::new(),
                processing: None,
            }),
            notify: Notify::new(),
            single_flight: Semaphore::new(1),
            avg_processing_secs,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Validate and enqueue a request. The receipt's position is the
    /// pending count including the new job; a job already in flight is
    /// no longer pending and does not count.
    pub fn enqueue(&self, request: GenerationRequest) -> Result<EnqueueReceipt, CoreError> {
        validate_request(&request)?;

        let mut inner = self.lock();
        let position = inner.order.len() + 1;
        let estimated_wait_secs = (position as u64 - 1) * self.avg_processing_secs;

        let job = GenerationJob {
            id: Uuid::new_v4(),
            status: GenerationStatus::Pending,
            progress: 0,
            status_message: None,
            request,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            estimated_wait_secs,
            result: None,
            error: None,
        };
        let id = job.id;
        inner.order.push_back(id);
        inner.jobs.insert(id, job);
        drop(inner);

        tracing::info!(job_id = %id, position, "Generation enqueued");
        self.notify.notify_one();

        Ok(EnqueueReceipt {
            id,
            position,
            estimated_wait_secs,
        })
    }

    /// Remove a job from the queue. Only pending jobs can be removed;
    /// a job that already started (or finished) is a conflict.
    pub fn remove(&self, id: Uuid) -> Result<(), CoreError> {
        let mut inner = self.lock();
        let Some(job) = inner.jobs.get(&id) else {
            return Err(CoreError::NotFound {
                entity: "GenerationJob",
                id,
            });
        };
        if job.status != GenerationStatus::Pending {
            return Err(CoreError::Conflict(format!(
                "Job {id} is not pending and cannot be removed"
            )));
        }
        inner.order.retain(|queued| *queued != id);
        inner.jobs.remove(&id);
        drop(inner);

        tracing::info!(job_id = %id, "Pending generation removed");
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<GenerationJob> {
        self.lock().jobs.get(&id).cloned()
    }

    /// Read-only view: jobs newest-first plus per-status counts.
    /// Pending jobs get their wait estimate recomputed from the live
    /// queue position.
    pub fn snapshot(&self) -> QueueSnapshot {
        let inner = self.lock();

        let mut jobs: Vec<GenerationJob> = inner
            .jobs
            .values()
            .map(|job| {
                let mut job = job.clone();
                if job.status == GenerationStatus::Pending {
                    if let Some(ahead) = inner.order.iter().position(|id| *id == job.id) {
                        job.estimated_wait_secs = ahead as u64 * self.avg_processing_secs;
                    }
                }
                job
            })
            .collect();
        jobs.sort_by(|a, b| b.enqueued_at.cmp(&a.enqueued_at));

        let mut stats = QueueStats::default();
        for job in &jobs {
            match job.status {
                GenerationStatus::Pending => stats.pending += 1,
                GenerationStatus::Processing => stats.processing += 1,
                GenerationStatus::Completed => stats.completed += 1,
                GenerationStatus::Failed => stats.failed += 1,
            }
        }

        QueueSnapshot { jobs, stats }
    }

    /// Pop the oldest pending job and mark it processing. Driver-only.
    fn claim_next(&self) -> Option<GenerationJob> {
        let mut inner = self.lock();
        let id = inner.order.pop_front()?;
        inner.processing = Some(id);
        let job = inner.jobs.get_mut(&id)?;
        job.status = GenerationStatus::Processing;
        job.started_at = Some(Utc::now());
        job.estimated_wait_secs = 0;
        Some(job.clone())
    }

    /// Monotonic progress update; regressions and values above the
    /// callback ceiling are ignored (100 is reserved for the
    /// completion transition).
    pub fn set_progress(&self, id: Uuid, progress: u8, message: Option<String>) {
        let mut inner = self.lock();
        if let Some(job) = inner.jobs.get_mut(&id) {
            if job.status != GenerationStatus::Processing {
                return;
            }
            if progress > job.progress && progress <= PROGRESS_CEILING {
                job.progress = progress;
            }
            if message.is_some() {
                job.status_message = message;
            }
        }
    }

    fn finish(&self, id: Uuid, outcome: Result<JobResult, String>) {
        let mut inner = self.lock();
        if inner.processing == Some(id) {
            inner.processing = None;
        }
        if let Some(job) = inner.jobs.get_mut(&id) {
            if job.status.is_terminal() {
                return;
            }
            job.finished_at = Some(Utc::now());
            match outcome {
                Ok(result) => {
                    job.status = GenerationStatus::Completed;
                    job.progress = 100;
                    job.result = Some(result);
                }
                Err(error) => {
                    job.status = GenerationStatus::Failed;
                    job.error = Some(error);
                }
            }
        }
    }

    /// Drop terminal jobs older than `max_age`. Pending and processing
    /// jobs are never evicted.
    pub fn evict_terminal(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::zero());
        let mut inner = self.lock();
        let before = inner.jobs.len();
        inner.jobs.retain(|_, job| {
            !(job.status.is_terminal() && job.finished_at.is_some_and(|at| at < cutoff))
        });
        before - inner.jobs.len()
    }
}

/// Run the FIFO driver until cancelled. One long-lived task; a failed
/// generation terminates only its own job, never the loop.
pub fn spawn_generation_driver(
    queue: Arc<GenerationQueue>,
    client: Arc<GenerationClient>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Generation driver started");
        loop {
            if cancel.is_cancelled() {
                break;
            }

            // Hold the single permit for the whole dispatch. The
            // semaphore is never closed, so acquire cannot fail.
            let Ok(permit) = queue.single_flight.acquire().await else {
                break;
            };

            let Some(job) = queue.claim_next() else {
                drop(permit);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = queue.notify.notified() => {}
                }
                continue;
            };

            tracing::info!(job_id = %job.id, "Generation dispatched");
            let progress_queue = Arc::clone(&queue);
            let job_id = job.id;
            let outcome = client
                .run(&job.request, &move |progress, message| {
                    progress_queue.set_progress(job_id, progress, message);
                })
                .await;

            match &outcome {
                Ok(result) => {
                    tracing::info!(job_id = %job_id, video_id = %result.video_id, "Generation completed");
                }
                Err(error) => {
                    tracing::error!(job_id = %job_id, error = %error, "Generation failed");
                }
            }
            queue.finish(job_id, outcome);
            drop(permit);
        }
        tracing::info!("Generation driver shutting down");
    })
}

/// Periodically evict terminal jobs older than `retention`.
pub fn spawn_queue_retention_sweep(
    queue: Arc<GenerationQueue>,
    retention: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let evicted = queue.evict_terminal(retention);
                    if evicted > 0 {
                        tracing::debug!(evicted, "Evicted terminal generation jobs");
                    }
                }
            }
        }
    })
}
