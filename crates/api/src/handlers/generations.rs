//! Handlers for the `/generations` resource and the queue view.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use uuid::Uuid;

use retroreel_core::generation::GenerationRequest;
use retroreel_core::CoreError;

use crate::engine::{EnqueueReceipt, QueueSnapshot};
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/generations
///
/// Validate and enqueue a generation request. Returns 201 with the job
/// id, 1-based queue position, and the wait estimate derived from it.
/// A body that fails to deserialize (out-of-enum duration/resolution,
/// wrong types) is a validation failure, not a bare rejection.
async fn enqueue(
    State(state): State<AppState>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<DataResponse<EnqueueReceipt>>)> {
    let Json(request) =
        payload.map_err(|e| AppError::Core(CoreError::Validation(e.body_text())))?;
    let receipt = state.queue.enqueue(request)?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: receipt })))
}

/// DELETE /api/v1/generations/{id}
///
/// Remove a pending job. Returns 404 for an unknown id and 409 once the
/// job has started or finished.
async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    state.queue.remove(id)?;
    Ok(Json(serde_json::json!({ "removed": true, "id": id })))
}

/// GET /api/v1/queue
///
/// Read-only queue snapshot: jobs newest-first plus per-status counts.
async fn queue_snapshot(State(state): State<AppState>) -> Json<DataResponse<QueueSnapshot>> {
    Json(DataResponse {
        data: state.queue.snapshot(),
    })
}

/// Routes mounted at `/api/v1`.
///
/// ```text
/// POST   /generations       -> enqueue
/// DELETE /generations/{id}  -> remove (pending only)
/// GET    /queue             -> queue_snapshot
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generations", post(enqueue))
        .route("/generations/{id}", delete(remove))
        .route("/queue", get(queue_snapshot))
}
