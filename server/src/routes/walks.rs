//! Walk endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use trailsync_engine::{
    remote::{CreateWalkRequest, CreatedResponse},
    WalkPatch,
};

use crate::error::{AppError, Result};
use crate::repo::StoredWalk;
use crate::AppState;

/// Create walk routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/walks", post(create_walk))
        .route("/walks/{id}", get(get_walk).patch(update_walk))
}

pub(crate) fn require_client_ref(client_ref: &str) -> Result<()> {
    if client_ref.trim().is_empty() {
        return Err(AppError::BadRequest("clientRef must not be blank".into()));
    }
    Ok(())
}

/// POST /walks - Create a walk, or return the id already assigned to its client reference.
async fn create_walk(
    State(state): State<AppState>,
    Json(request): Json<CreateWalkRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>)> {
    require_client_ref(&request.client_ref)?;
    request.walk.validate()?;

    let created = state
        .repo
        .create_walk(&request.client_ref, &request.walk)
        .await?;

    let status = if created.existing {
        tracing::debug!(client_ref = %request.client_ref, id = %created.id, "Repeated walk create");
        StatusCode::OK
    } else {
        tracing::info!(client_ref = %request.client_ref, id = %created.id, "Walk created");
        StatusCode::CREATED
    };
    Ok((status, Json(CreatedResponse { id: created.id })))
}

/// PATCH /walks/{id} - Apply a partial update.
async fn update_walk(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<WalkPatch>,
) -> Result<StatusCode> {
    patch.validate()?;

    if !state.repo.update_walk(&id, &patch).await? {
        return Err(AppError::NotFound(format!("walk not found: {id}")));
    }
    tracing::debug!(%id, "Walk updated");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /walks/{id}
async fn get_walk(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StoredWalk>> {
    state
        .repo
        .get_walk(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("walk not found: {id}")))
}
