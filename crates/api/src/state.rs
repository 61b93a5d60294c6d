use std::sync::Arc;

use retroreel_effects::{EffectJobStore, EffectOrchestrator};
use retroreel_store::MetadataStore;

use crate::config::ServerConfig;
use crate::engine::GenerationQueue;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (accessed by middleware and handlers).
    pub config: Arc<ServerConfig>,
    /// File-backed video metadata store.
    pub store: Arc<MetadataStore>,
    /// Generation queue; the driver task consumes it.
    pub queue: Arc<GenerationQueue>,
    /// Effect job orchestrator (spawns external processors).
    pub effects: Arc<EffectOrchestrator>,
    /// Effect job registry, shared with the orchestrator.
    pub effect_jobs: Arc<EffectJobStore>,
}
