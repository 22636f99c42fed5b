//! Database operations for the walks table.

use crate::error::{AppError, Result};
use crate::repo::{decode_payload, new_walk_id, Created, StoredWalk};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use trailsync_engine::{WalkFields, WalkPatch};

/// A walk row from the database.
#[derive(Debug)]
pub struct WalkRow {
    pub id: String,
    pub client_ref: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for WalkRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(WalkRow {
            id: row.try_get("id")?,
            client_ref: row.try_get("client_ref")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl WalkRow {
    pub fn into_walk(self) -> Result<StoredWalk> {
        Ok(StoredWalk {
            id: self.id,
            client_ref: self.client_ref,
            walk: decode_payload(self.payload)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn encode(walk: &WalkFields) -> Result<serde_json::Value> {
    serde_json::to_value(walk).map_err(|e| AppError::Internal(e.to_string()))
}

/// Insert a walk unless its client reference is already known.
pub async fn insert_walk(pool: &PgPool, client_ref: &str, walk: &WalkFields) -> Result<Created> {
    let inserted: Option<String> = sqlx::query_scalar(
        r#"
        INSERT INTO walks (id, client_ref, payload)
        VALUES ($1, $2, $3)
        ON CONFLICT (client_ref) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(new_walk_id())
    .bind(client_ref)
    .bind(encode(walk)?)
    .fetch_optional(pool)
    .await?;

    if let Some(id) = inserted {
        return Ok(Created {
            id,
            existing: false,
        });
    }

    let id: String = sqlx::query_scalar("SELECT id FROM walks WHERE client_ref = $1")
        .bind(client_ref)
        .fetch_one(pool)
        .await?;
    Ok(Created { id, existing: true })
}

/// Apply a patch inside a transaction. Returns false if the walk is unknown.
pub async fn update_walk(pool: &PgPool, id: &str, patch: &WalkPatch) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let payload: Option<serde_json::Value> =
        sqlx::query_scalar("SELECT payload FROM walks WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some(payload) = payload else {
        return Ok(false);
    };

    let mut walk: WalkFields = decode_payload(payload)?;
    patch.apply_to(&mut walk);
    walk.validate()?;

    sqlx::query("UPDATE walks SET payload = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(encode(&walk)?)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}

/// Get a walk by id.
pub async fn get_walk(pool: &PgPool, id: &str) -> Result<Option<StoredWalk>> {
    sqlx::query_as::<_, WalkRow>(
        r#"
        SELECT id, client_ref, payload, created_at, updated_at
        FROM walks
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .map(WalkRow::into_walk)
    .transpose()
}

pub async fn walk_exists(pool: &PgPool, id: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM walks WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}
