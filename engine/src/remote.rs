//! Remote store contract.
//!
//! The authoritative backend is reached through [`RemoteStore`]. Permanent ids
//! are assigned by the backend on create; every create carries the entity's
//! provisional id as a client reference so a retried create can be answered
//! with the id assigned the first time.

use crate::{error::RemoteError, ObservationFields, WalkFields, WalkPatch};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result type for remote store calls.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Narrow interface to the authoritative backend.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create a walk, returning its permanent id.
    async fn create_walk(&self, client_ref: &str, walk: &WalkFields) -> RemoteResult<String>;

    /// Apply a partial update. `id` must be permanent.
    async fn update_walk(&self, id: &str, patch: &WalkPatch) -> RemoteResult<()>;

    /// Create an observation under a walk, returning its permanent id.
    /// `walk_id` must be permanent.
    async fn create_observation(
        &self,
        client_ref: &str,
        walk_id: &str,
        observation: &ObservationFields,
    ) -> RemoteResult<String>;
}

/// Request body for creating a walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalkRequest {
    pub client_ref: String,
    pub walk: WalkFields,
}

/// Request body for creating an observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateObservationRequest {
    pub client_ref: String,
    pub walk_id: String,
    pub observation: ObservationFields,
}

/// Response to a successful create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedResponse {
    pub id: String,
}

/// Error body returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
