//! Effect processing: job registry, processor stdout protocol, and the
//! orchestrator that runs external effect programs against stored videos.

pub mod jobs;
pub mod orchestrator;
pub mod protocol;

pub use jobs::{spawn_retention_sweep, EffectJob, EffectJobStore, EffectStatus};
pub use orchestrator::{EffectOrchestrator, OrchestratorConfig};
