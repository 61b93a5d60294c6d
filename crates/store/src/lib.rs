//! Durable metadata store: the single shared mutable resource.
//!
//! One JSON document (`metadata.json`, newest-first array) plus managed
//! artifact and side-log directories under a data root:
//!
//! ```text
//! {root}/metadata.json
//! {root}/videos/   generated and derived artifacts
//! {root}/logs/     processor side-logs
//! {root}/scratch/  in-flight downloads and effect outputs
//! ```
//!
//! Every load-modify-persist sequence holds the store mutex across its
//! await points, so a suspension inside a write can never expose a
//! half-written collection to a concurrent caller. No caller caches
//! rows across an operation boundary; the document on disk is the
//! single source of truth.

pub mod models;

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use uuid::Uuid;

use retroreel_core::CoreError;

pub use models::{VideoMetadata, VideoStatus};

/// Store-level failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Video not found: {0}")]
    NotFound(Uuid),

    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata collection is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => CoreError::NotFound {
                entity: "Video",
                id,
            },
            other => CoreError::Internal(other.to_string()),
        }
    }
}

/// Aggregate artifact statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub count: usize,
    pub total_bytes: u64,
}

/// Filesystem-backed metadata store.
pub struct MetadataStore {
    root: PathBuf,
    /// Serializes every read-modify-write of the collection.
    lock: Mutex<()>,
}

impl MetadataStore {
    /// Open (or initialize) a store rooted at `root`, creating the
    /// managed directories if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        for dir in ["videos", "logs", "scratch"] {
            tokio::fs::create_dir_all(root.join(dir)).await?;
        }
        let store = Self {
            root,
            lock: Mutex::new(()),
        };
        // Fail fast on a corrupt collection rather than at first use.
        store.read_collection().await?;
        Ok(store)
    }

    fn collection_path(&self) -> PathBuf {
        self.root.join("metadata.json")
    }

    /// Absolute path of a stored artifact.
    pub fn video_path(&self, filename: &str) -> PathBuf {
        self.root.join("videos").join(filename)
    }

    /// Absolute path of a side-log.
    pub fn log_path(&self, filename: &str) -> PathBuf {
        self.root.join("logs").join(filename)
    }

    /// Scratch path for in-flight files (downloads, effect outputs).
    pub fn scratch_path(&self, filename: &str) -> PathBuf {
        self.root.join("scratch").join(filename)
    }

    async fn read_collection(&self) -> Result<Vec<VideoMetadata>, StoreError> {
        match tokio::fs::read(self.collection_path()).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist via temp file + rename so a crash never truncates the
    /// collection.
    async fn write_collection(&self, rows: &[VideoMetadata]) -> Result<(), StoreError> {
        let tmp = self.root.join("metadata.json.tmp");
        let bytes = serde_json::to_vec_pretty(rows)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, self.collection_path()).await?;
        Ok(())
    }

    /// Move `source` into managed storage and upsert `metadata`,
    /// keyed by id. Idempotent: an existing row with the same id is
    /// replaced. New rows are inserted at the front (newest-first).
    pub async fn save_artifact(
        &self,
        source: &Path,
        metadata: VideoMetadata,
    ) -> Result<VideoMetadata, StoreError> {
        let _guard = self.lock.lock().await;

        let dest = self.video_path(&metadata.filename);
        // Rename when possible; fall back to copy for cross-device moves.
        if tokio::fs::rename(source, &dest).await.is_err() {
            tokio::fs::copy(source, &dest).await?;
            if let Err(e) = tokio::fs::remove_file(source).await {
                tracing::warn!(source = %source.display(), error = %e, "Failed to remove staged artifact");
            }
        }

        let mut rows = self.read_collection().await?;
        rows.retain(|r| r.id != metadata.id);
        rows.insert(0, metadata.clone());
        self.write_collection(&rows).await?;

        tracing::info!(
            video_id = %metadata.id,
            filename = %metadata.filename,
            "Artifact saved to store",
        );
        Ok(metadata)
    }

    /// All rows, newest-first.
    pub async fn load_all(&self) -> Result<Vec<VideoMetadata>, StoreError> {
        let _guard = self.lock.lock().await;
        self.read_collection().await
    }

    /// Look up one row by id.
    pub async fn find(&self, id: Uuid) -> Result<Option<VideoMetadata>, StoreError> {
        let _guard = self.lock.lock().await;
        let rows = self.read_collection().await?;
        Ok(rows.into_iter().find(|r| r.id == id))
    }

    /// Delete a row, its artifact, and any side-log.
    ///
    /// An already-missing artifact or side-log is logged and tolerated;
    /// an unknown id fails with [`StoreError::NotFound`] and leaves the
    /// store unchanged.
    pub async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;

        let mut rows = self.read_collection().await?;
        let Some(pos) = rows.iter().position(|r| r.id == id) else {
            return Err(StoreError::NotFound(id));
        };
        let row = rows.remove(pos);
        self.write_collection(&rows).await?;

        if let Err(e) = tokio::fs::remove_file(self.video_path(&row.filename)).await {
            tracing::warn!(video_id = %id, error = %e, "Artifact already missing during delete");
        }
        if let Some(log) = &row.processor_log {
            if let Err(e) = tokio::fs::remove_file(self.log_path(log)).await {
                tracing::debug!(video_id = %id, error = %e, "Side-log missing during delete");
            }
        }

        tracing::info!(video_id = %id, filename = %row.filename, "Video deleted");
        Ok(())
    }

    /// Count rows and sum artifact sizes, statting each file lazily.
    /// A missing artifact is skipped, not fatal to the call.
    pub async fn stats(&self) -> Result<StoreStats, StoreError> {
        let _guard = self.lock.lock().await;
        let rows = self.read_collection().await?;

        let mut total_bytes = 0u64;
        for row in &rows {
            match tokio::fs::metadata(self.video_path(&row.filename)).await {
                Ok(meta) => total_bytes += meta.len(),
                Err(e) => {
                    tracing::warn!(
                        video_id = %row.id,
                        filename = %row.filename,
                        error = %e,
                        "Artifact missing while computing stats",
                    );
                }
            }
        }

        Ok(StoreStats {
            count: rows.len(),
            total_bytes,
        })
    }

    /// Write a processor side-log for a video and return its filename.
    pub async fn save_side_log(
        &self,
        video_id: Uuid,
        contents: &str,
    ) -> Result<String, StoreError> {
        let filename = format!("{video_id}.log");
        tokio::fs::write(self.log_path(&filename), contents).await?;
        Ok(filename)
    }
}
