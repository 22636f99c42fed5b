//! Database operations for the observations table.

use crate::db::walks::walk_exists;
use crate::error::{AppError, Result};
use crate::repo::{decode_payload, new_observation_id, Created, StoredObservation};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use trailsync_engine::ObservationFields;

/// An observation row from the database.
#[derive(Debug)]
pub struct ObservationRow {
    pub id: String,
    pub client_ref: String,
    pub walk_id: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ObservationRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(ObservationRow {
            id: row.try_get("id")?,
            client_ref: row.try_get("client_ref")?,
            walk_id: row.try_get("walk_id")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl ObservationRow {
    pub fn into_observation(self) -> Result<StoredObservation> {
        Ok(StoredObservation {
            id: self.id,
            client_ref: self.client_ref,
            walk_id: self.walk_id,
            observation: decode_payload(self.payload)?,
            created_at: self.created_at,
        })
    }
}

async fn find_by_client_ref(pool: &PgPool, client_ref: &str) -> Result<Option<String>> {
    let id = sqlx::query_scalar("SELECT id FROM observations WHERE client_ref = $1")
        .bind(client_ref)
        .fetch_optional(pool)
        .await?;
    Ok(id)
}

/// Insert an observation. Returns `None` if the parent walk is unknown.
pub async fn insert_observation(
    pool: &PgPool,
    client_ref: &str,
    walk_id: &str,
    observation: &ObservationFields,
) -> Result<Option<Created>> {
    if let Some(id) = find_by_client_ref(pool, client_ref).await? {
        return Ok(Some(Created { id, existing: true }));
    }
    if !walk_exists(pool, walk_id).await? {
        return Ok(None);
    }

    let payload =
        serde_json::to_value(observation).map_err(|e| AppError::Internal(e.to_string()))?;
    let inserted: Option<String> = sqlx::query_scalar(
        r#"
        INSERT INTO observations (id, client_ref, walk_id, payload)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (client_ref) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(new_observation_id())
    .bind(client_ref)
    .bind(walk_id)
    .bind(payload)
    .fetch_optional(pool)
    .await?;

    match inserted {
        Some(id) => Ok(Some(Created {
            id,
            existing: false,
        })),
        // Lost a race with a concurrent retry of the same create.
        None => Ok(find_by_client_ref(pool, client_ref)
            .await?
            .map(|id| Created { id, existing: true })),
    }
}

/// Observations of a walk, oldest first.
pub async fn observations_for_walk(pool: &PgPool, walk_id: &str) -> Result<Vec<StoredObservation>> {
    sqlx::query_as::<_, ObservationRow>(
        r#"
        SELECT id, client_ref, walk_id, payload, created_at
        FROM observations
        WHERE walk_id = $1
        ORDER BY payload->>'observedAt', id
        "#,
    )
    .bind(walk_id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(ObservationRow::into_observation)
    .collect()
}
