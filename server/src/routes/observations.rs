//! Observation endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use trailsync_engine::remote::{CreateObservationRequest, CreatedResponse};

use crate::error::{AppError, Result};
use crate::repo::StoredObservation;
use crate::routes::walks::require_client_ref;
use crate::AppState;

/// Create observation routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/observations", post(create_observation))
        .route("/walks/{id}/observations", get(list_observations))
}

/// POST /observations - Create an observation under an existing walk.
async fn create_observation(
    State(state): State<AppState>,
    Json(request): Json<CreateObservationRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>)> {
    require_client_ref(&request.client_ref)?;
    request.observation.validate()?;

    let created = state
        .repo
        .create_observation(&request.client_ref, &request.walk_id, &request.observation)
        .await?
        .ok_or_else(|| AppError::Unprocessable(format!("walk not found: {}", request.walk_id)))?;

    let status = if created.existing {
        StatusCode::OK
    } else {
        tracing::info!(
            client_ref = %request.client_ref,
            walk_id = %request.walk_id,
            id = %created.id,
            "Observation created"
        );
        StatusCode::CREATED
    };
    Ok((status, Json(CreatedResponse { id: created.id })))
}

/// GET /walks/{id}/observations
async fn list_observations(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<StoredObservation>>> {
    state
        .repo
        .observations_for_walk(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("walk not found: {id}")))
}
