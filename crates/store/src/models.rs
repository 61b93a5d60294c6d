//! Persisted metadata row for one stored video artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use retroreel_core::effects::EffectKind;
use retroreel_core::generation::GenerationRequest;
use retroreel_core::naming;

/// One row of the durable metadata collection.
///
/// Rows are immutable after creation. Applying an effect derives a new
/// row via [`VideoMetadata::derive`]; the source row is never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Echo of the originating request (for derived rows: the source's).
    pub params: GenerationRequest,
    /// Artifact filename, relative to the store's videos directory.
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub status: VideoStatus,
    /// Ordered list of effects applied to reach this artifact.
    #[serde(default)]
    pub effects_applied: Vec<EffectKind>,
    /// Side-log filename, relative to the store's logs directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor_log: Option<String>,
}

/// Lifecycle status of a stored artifact.
///
/// Rows are only written once the artifact exists, so `Completed` is
/// the sole live value; it is kept explicit for the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Completed,
}

impl VideoMetadata {
    /// Build the row for a freshly generated original.
    pub fn for_generation(request: &GenerationRequest, ext: &str) -> Self {
        let created_at = Utc::now();
        let title = retroreel_core::generation::title_from_prompt(&request.prompt);
        let slug = naming::slugify(&title);
        let filename = naming::original_filename(
            &slug,
            created_at,
            request.resolution,
            request.duration,
            ext,
        );
        Self {
            id: Uuid::new_v4(),
            title,
            description: format!(
                "{} ({}s, {})",
                request.prompt.trim(),
                request.duration.secs(),
                request.resolution.label(),
            ),
            tags: Vec::new(),
            created_at,
            params: request.clone(),
            filename,
            thumbnail: None,
            status: VideoStatus::Completed,
            effects_applied: Vec::new(),
            processor_log: None,
        }
    }

    /// Derive the row for an effect output from this source row.
    ///
    /// New id and timestamp, title/description annotated with the effect
    /// name, a fresh storage filename, and `effects_applied` extended by
    /// `kind`. `self` is untouched.
    pub fn derive(&self, kind: EffectKind) -> Self {
        let created_at = Utc::now();
        let source_slug = naming::slug_of_filename(&self.filename);
        let ext = self
            .filename
            .rsplit_once('.')
            .map_or("mp4", |(_, e)| e);
        let mut effects_applied = self.effects_applied.clone();
        effects_applied.push(kind);
        Self {
            id: Uuid::new_v4(),
            title: format!("{} [{}]", self.title, kind.display_name()),
            description: format!("{} - {} applied", self.description, kind.display_name()),
            tags: self.tags.clone(),
            created_at,
            params: self.params.clone(),
            filename: naming::derived_filename(source_slug, kind, created_at, ext),
            thumbnail: None,
            status: VideoStatus::Completed,
            effects_applied,
            processor_log: None,
        }
    }
}
