//! Handlers for the `/effects` resource.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use retroreel_core::effects::EffectKind;
use retroreel_core::CoreError;
use retroreel_effects::EffectJob;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for effect submission. `effect` is the kind's
/// snake_case name; unknown names are a validation error. Omitted
/// `params` fields take the kind's documented defaults.
#[derive(Debug, Deserialize)]
pub struct SubmitEffectRequest {
    pub video_id: Uuid,
    pub effect: String,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
}

/// POST /api/v1/effects
///
/// Validate kind, parameters, and source video, then start a job.
/// Returns 400 for an unknown kind or out-of-range parameters and 404
/// for an unknown source video; no job object exists in either case.
async fn submit(
    State(state): State<AppState>,
    payload: Result<Json<SubmitEffectRequest>, JsonRejection>,
) -> AppResult<Json<serde_json::Value>> {
    let Json(body) =
        payload.map_err(|e| AppError::Core(CoreError::Validation(e.body_text())))?;
    let kind: EffectKind = body.effect.parse().map_err(AppError::Core)?;
    let job_id = state.effects.submit(body.video_id, kind, body.params).await?;
    Ok(Json(serde_json::json!({ "job_id": job_id })))
}

/// GET /api/v1/effects/{id}
///
/// Current job record, including progress and any terminal outcome.
async fn status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<EffectJob>>> {
    let job = state
        .effect_jobs
        .get(id)
        .await
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "EffectJob",
            id,
        }))?;
    Ok(Json(DataResponse { data: job }))
}

/// Routes mounted at `/api/v1`.
///
/// ```text
/// POST /effects       -> submit
/// GET  /effects/{id}  -> status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/effects", post(submit))
        .route("/effects/{id}", get(status))
}
