//! Handlers for the `/videos` resource (stored library).

use axum::extract::{Path, State};
use axum::routing::{delete, get};
use axum::{Json, Router};
use uuid::Uuid;

use retroreel_store::{StoreStats, VideoMetadata};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/videos
///
/// All stored videos, newest-first.
async fn list(State(state): State<AppState>) -> AppResult<Json<DataResponse<Vec<VideoMetadata>>>> {
    let videos = state.store.load_all().await?;
    Ok(Json(DataResponse { data: videos }))
}

/// GET /api/v1/videos/stats
///
/// Row count and total artifact bytes on disk.
async fn stats(State(state): State<AppState>) -> AppResult<Json<DataResponse<StoreStats>>> {
    let stats = state.store.stats().await?;
    Ok(Json(DataResponse { data: stats }))
}

/// DELETE /api/v1/videos/{id}
///
/// Delete the metadata row, artifact, and side-log. 404 for unknown id.
async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    state.store.delete(id).await?;
    Ok(Json(serde_json::json!({ "deleted": true, "id": id })))
}

/// Routes mounted at `/api/v1`.
///
/// ```text
/// GET    /videos        -> list
/// GET    /videos/stats  -> stats
/// DELETE /videos/{id}   -> remove
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/videos", get(list))
        .route("/videos/stats", get(stats))
        .route("/videos/{id}", delete(remove))
}
