//! Effect job orchestrator: spawns external processors, follows their
//! stdout protocol, and derives new metadata rows from successful runs.
//!
//! Each submitted job runs in its own spawned task backed by its own
//! child process; a bounded semaphore caps how many processors run at
//! once. Once spawned, a job cannot be cancelled; dropping a status
//! watcher never touches the running work. All metadata writes go
//! through the store's serialized update path.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Semaphore;
use uuid::Uuid;

use retroreel_core::effects::{EffectKind, EffectParameters};
use retroreel_core::CoreError;
use retroreel_store::{MetadataStore, VideoMetadata};

use crate::jobs::{EffectJob, EffectJobStore};
use crate::protocol::{parse_line, ProcessorLine};

/// Cap on captured informational/stderr output kept for the side-log.
const MAX_LOG_BYTES: usize = 256 * 1024;

/// Orchestrator tunables.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Directory holding `{kind}_processor.py` programs.
    pub processor_dir: PathBuf,
    /// Interpreter used to run processors (`python3`).
    pub interpreter: String,
    /// Concurrency ceiling for running processors.
    pub max_concurrency: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            processor_dir: PathBuf::from("scripts"),
            interpreter: "python3".to_string(),
            max_concurrency: 2,
        }
    }
}

/// Orchestrates external effect processors.
pub struct EffectOrchestrator {
    store: Arc<MetadataStore>,
    jobs: Arc<EffectJobStore>,
    limiter: Arc<Semaphore>,
    config: OrchestratorConfig,
}

impl EffectOrchestrator {
    pub fn new(store: Arc<MetadataStore>, config: OrchestratorConfig) -> Self {
        Self {
            store,
            jobs: Arc::new(EffectJobStore::default()),
            limiter: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            config,
        }
    }

    /// The job registry (shared with the retention sweep and handlers).
    pub fn jobs(&self) -> Arc<EffectJobStore> {
        Arc::clone(&self.jobs)
    }

    /// Validate and start an effect job.
    ///
    /// Fails without creating any job object when the parameters are
    /// invalid or the source video does not resolve. On success the job
    /// is registered as queued and runs in the background; the caller
    /// polls the registry for progress.
    pub async fn submit(
        self: &Arc<Self>,
        source_video_id: Uuid,
        kind: EffectKind,
        params: Option<serde_json::Value>,
    ) -> Result<Uuid, CoreError> {
        let params = EffectParameters::for_kind(kind, params)?;
        let source = self
            .store
            .find(source_video_id)
            .await
            .map_err(CoreError::from)?
            .ok_or(CoreError::NotFound {
                entity: "Video",
                id: source_video_id,
            })?;

        let job = EffectJob::new(source_video_id, kind);
        let job_id = job.id;
        self.jobs.insert(job).await;

        tracing::info!(
            job_id = %job_id,
            video_id = %source_video_id,
            effect = %kind,
            "Effect job submitted",
        );

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator.run_job(job_id, source, params).await;
        });

        Ok(job_id)
    }

    /// Drive one job to a terminal state. Never propagates an error:
    /// a failure terminates only this job.
    async fn run_job(self: Arc<Self>, job_id: Uuid, source: VideoMetadata, params: EffectParameters) {
        // Queued until a worker slot frees up. The semaphore is never
        // closed, so acquire cannot fail.
        let Ok(_permit) = self.limiter.acquire().await else {
            self.jobs.fail(job_id, "Worker pool shut down".into()).await;
            return;
        };
        self.jobs.mark_processing(job_id).await;

        let kind = params.kind();
        let output_scratch = self.store.scratch_path(&format!("{job_id}.mp4"));

        match self.execute(job_id, &source, &params, &output_scratch).await {
            Ok(output_video_id) => {
                tracing::info!(
                    job_id = %job_id,
                    output_video_id = %output_video_id,
                    effect = %kind,
                    "Effect job completed",
                );
                self.jobs.complete(job_id, output_video_id).await;
            }
            Err(error) => {
                tracing::error!(job_id = %job_id, effect = %kind, error = %error, "Effect job failed");
                // Best-effort removal of any partially written output.
                if let Err(e) = tokio::fs::remove_file(&output_scratch).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(job_id = %job_id, error = %e, "Could not remove partial output");
                    }
                }
                self.jobs.fail(job_id, error).await;
            }
        }
    }

    /// Spawn the processor, follow its stdout protocol, and on a clean
    /// exit persist the derived artifact. Returns the new video id.
    async fn execute(
        &self,
        job_id: Uuid,
        source: &VideoMetadata,
        params: &EffectParameters,
        output_scratch: &std::path::Path,
    ) -> Result<Uuid, String> {
        let kind = params.kind();
        let input = self.store.video_path(&source.filename);
        if !tokio::fs::try_exists(&input).await.unwrap_or(false) {
            return Err(format!("Source artifact missing: {}", source.filename));
        }

        let script = self
            .config
            .processor_dir
            .join(format!("{}_processor.py", kind.as_str()));
        let params_json = params.to_processor_json().to_string();

        let mut child = Command::new(&self.config.interpreter)
            .arg(&script)
            .arg(&input)
            .arg(output_scratch)
            .arg(&params_json)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("Failed to spawn {}: {e}", script.display()))?;

        // Stderr drains in its own task so a chatty processor cannot
        // deadlock against the stdout reader.
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = (&mut stderr)
                    .take(MAX_LOG_BYTES as u64)
                    .read_to_end(&mut buf)
                    .await;
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        let mut log = String::new();
        let mut saw_completed = false;
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match parse_line(&line) {
                    ProcessorLine::Progress(value) => {
                        self.jobs.set_progress(job_id, value).await;
                    }
                    ProcessorLine::Completed => saw_completed = true,
                    ProcessorLine::Info(text) => {
                        tracing::debug!(job_id = %job_id, line = %text, "Processor output");
                        if log.len() < MAX_LOG_BYTES {
                            log.push_str(&text);
                            log.push('\n');
                        }
                    }
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| format!("Failed to wait for processor: {e}"))?;

        if let Some(task) = stderr_task {
            if let Ok(stderr) = task.await {
                if !stderr.is_empty() {
                    log.push_str("--- stderr ---\n");
                    log.push_str(&stderr);
                }
            }
        }

        if !status.success() {
            let code = status.code().unwrap_or(-1);
            return Err(format!("Effect processor exited with code {code}"));
        }
        if !saw_completed {
            tracing::warn!(job_id = %job_id, "Processor exited 0 without COMPLETED marker");
        }
        if !tokio::fs::try_exists(output_scratch).await.unwrap_or(false) {
            return Err("Processor exited 0 but produced no output artifact".into());
        }

        let mut derived = source.derive(kind);
        if !log.is_empty() {
            match self.store.save_side_log(derived.id, &log).await {
                Ok(filename) => derived.processor_log = Some(filename),
                Err(e) => {
                    tracing::warn!(job_id = %job_id, error = %e, "Could not write side-log");
                }
            }
        }

        let derived = self
            .store
            .save_artifact(output_scratch, derived)
            .await
            .map_err(|e| format!("Failed to persist derived artifact: {e}"))?;

        Ok(derived.id)
    }
}
