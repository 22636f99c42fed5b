//! Trailsync Server - reference remote store for walk journals.
//!
//! Assigns permanent ids to walks and observations created by Trailsync
//! clients. Creates are idempotent by client reference, so a client that
//! retries after a lost response gets back the id it was given the first
//! time.

pub mod config;
pub mod db;
pub mod error;
pub mod repo;
pub mod routes;

use crate::repo::Repository;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
}

impl AppState {
    pub fn new(repo: impl Repository + 'static) -> Self {
        Self {
            repo: Arc::new(repo),
        }
    }
}

/// Build the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
