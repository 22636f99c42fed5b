//! Walk and observation persistence.
//!
//! Handlers talk to a [`Repository`]; `main` picks [`PgRepository`] when a
//! database is configured and [`MemoryRepository`] otherwise.
//!
//! [`PgRepository`]: crate::db::PgRepository

use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use serde::{Deserialize, Serialize};
use trailsync_engine::{ObservationFields, WalkFields, WalkPatch};

/// A walk as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredWalk {
    pub id: String,
    pub client_ref: String,
    #[serde(flatten)]
    pub walk: WalkFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An observation as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObservation {
    pub id: String,
    pub client_ref: String,
    pub walk_id: String,
    #[serde(flatten)]
    pub observation: ObservationFields,
    pub created_at: DateTime<Utc>,
}

/// Outcome of an idempotent create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub id: String,
    /// The client reference had been seen before; `id` is the original id.
    pub existing: bool,
}

/// Storage behind the HTTP API.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn create_walk(&self, client_ref: &str, walk: &WalkFields) -> Result<Created>;

    /// Returns false if the walk does not exist.
    async fn update_walk(&self, id: &str, patch: &WalkPatch) -> Result<bool>;

    async fn get_walk(&self, id: &str) -> Result<Option<StoredWalk>>;

    /// Returns `None` if the parent walk does not exist.
    async fn create_observation(
        &self,
        client_ref: &str,
        walk_id: &str,
        observation: &ObservationFields,
    ) -> Result<Option<Created>>;

    /// Returns `None` if the walk does not exist.
    async fn observations_for_walk(&self, walk_id: &str) -> Result<Option<Vec<StoredObservation>>>;

    /// Check that the backing storage is reachable.
    async fn ping(&self) -> Result<()>;

    fn backend_tag(&self) -> &'static str;
}

pub fn new_walk_id() -> String {
    format!("w_{}", uuid::Uuid::new_v4().simple())
}

pub fn new_observation_id() -> String {
    format!("o_{}", uuid::Uuid::new_v4().simple())
}

/// Repository kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    walks: DashMap<String, StoredWalk>,
    observations: DashMap<String, StoredObservation>,
    walk_refs: DashMap<String, String>,
    observation_refs: DashMap<String, String>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create_walk(&self, client_ref: &str, walk: &WalkFields) -> Result<Created> {
        match self.walk_refs.entry(client_ref.to_string()) {
            Entry::Occupied(existing) => Ok(Created {
                id: existing.get().clone(),
                existing: true,
            }),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let id = new_walk_id();
                self.walks.insert(
                    id.clone(),
                    StoredWalk {
                        id: id.clone(),
                        client_ref: client_ref.to_string(),
                        walk: walk.clone(),
                        created_at: now,
                        updated_at: now,
                    },
                );
                slot.insert(id.clone());
                Ok(Created {
                    id,
                    existing: false,
                })
            }
        }
    }

    async fn update_walk(&self, id: &str, patch: &WalkPatch) -> Result<bool> {
        let Some(mut stored) = self.walks.get_mut(id) else {
            return Ok(false);
        };
        let mut updated = stored.walk.clone();
        patch.apply_to(&mut updated);
        updated.validate()?;
        stored.walk = updated;
        stored.updated_at = Utc::now();
        Ok(true)
    }

    async fn get_walk(&self, id: &str) -> Result<Option<StoredWalk>> {
        Ok(self.walks.get(id).map(|walk| walk.clone()))
    }

    async fn create_observation(
        &self,
        client_ref: &str,
        walk_id: &str,
        observation: &ObservationFields,
    ) -> Result<Option<Created>> {
        match self.observation_refs.entry(client_ref.to_string()) {
            Entry::Occupied(existing) => Ok(Some(Created {
                id: existing.get().clone(),
                existing: true,
            })),
            Entry::Vacant(slot) => {
                if !self.walks.contains_key(walk_id) {
                    return Ok(None);
                }
                let id = new_observation_id();
                self.observations.insert(
                    id.clone(),
                    StoredObservation {
                        id: id.clone(),
                        client_ref: client_ref.to_string(),
                        walk_id: walk_id.to_string(),
                        observation: observation.clone(),
                        created_at: Utc::now(),
                    },
                );
                slot.insert(id.clone());
                Ok(Some(Created {
                    id,
                    existing: false,
                }))
            }
        }
    }

    async fn observations_for_walk(&self, walk_id: &str) -> Result<Option<Vec<StoredObservation>>> {
        if !self.walks.contains_key(walk_id) {
            return Ok(None);
        }
        let mut observations: Vec<StoredObservation> = self
            .observations
            .iter()
            .filter(|entry| entry.walk_id == walk_id)
            .map(|entry| entry.value().clone())
            .collect();
        observations.sort_by(|a, b| {
            a.observation
                .observed_at
                .cmp(&b.observation.observed_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(Some(observations))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend_tag(&self) -> &'static str {
        "memory"
    }
}

/// Decode a JSONB payload column.
pub(crate) fn decode_payload<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
) -> Result<T> {
    serde_json::from_value(value).map_err(|e| AppError::Internal(format!("stored payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use trailsync_engine::Location;

    fn walk() -> WalkFields {
        WalkFields::new("ana", "Forest loop", Utc::now())
    }

    fn heron() -> ObservationFields {
        ObservationFields::new("ana", "Heron", "bird", Location::new(51.0, 0.0), Utc::now())
    }

    #[tokio::test]
    async fn create_walk_is_idempotent() {
        let repo = MemoryRepository::new();
        let first = repo.create_walk("tmp_1", &walk()).await.unwrap();
        let again = repo.create_walk("tmp_1", &walk()).await.unwrap();

        assert!(!first.existing);
        assert!(again.existing);
        assert_eq!(first.id, again.id);
        assert!(first.id.starts_with("w_"));
    }

    #[tokio::test]
    async fn update_applies_patch() {
        let repo = MemoryRepository::new();
        let id = repo.create_walk("tmp_1", &walk()).await.unwrap().id;

        let patch = WalkPatch {
            name: Some("Renamed".into()),
            ..WalkPatch::default()
        };
        assert!(repo.update_walk(&id, &patch).await.unwrap());
        assert!(!repo.update_walk("w_missing", &patch).await.unwrap());
        assert_eq!(repo.get_walk(&id).await.unwrap().unwrap().walk.name, "Renamed");
    }

    #[tokio::test]
    async fn update_keeps_walk_valid() {
        let repo = MemoryRepository::new();
        let fields = walk();
        let started = fields.started_at;
        let id = repo.create_walk("tmp_1", &fields).await.unwrap().id;

        let patch = WalkPatch::complete(started - chrono::Duration::hours(1), None, 10.0);
        assert!(matches!(
            repo.update_walk(&id, &patch).await,
            Err(AppError::Engine(_))
        ));
        assert_eq!(repo.get_walk(&id).await.unwrap().unwrap().walk.ended_at, None);
    }

    #[tokio::test]
    async fn observation_needs_existing_walk() {
        let repo = MemoryRepository::new();
        assert_eq!(
            repo.create_observation("tmp_a", "w_missing", &heron())
                .await
                .unwrap(),
            None
        );

        let walk_id = repo.create_walk("tmp_1", &walk()).await.unwrap().id;
        let created = repo
            .create_observation("tmp_a", &walk_id, &heron())
            .await
            .unwrap()
            .unwrap();
        let listed = repo.observations_for_walk(&walk_id).await.unwrap().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);
        assert_eq!(repo.observations_for_walk("w_missing").await.unwrap(), None);
    }
}
