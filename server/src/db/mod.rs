//! Database module for PostgreSQL persistence.

mod observations;
mod walks;

pub use observations::*;
pub use walks::*;

use crate::error::Result;
use crate::repo::{Created, Repository, StoredObservation, StoredWalk};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use trailsync_engine::{ObservationFields, WalkFields, WalkPatch};

/// Repository backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> std::result::Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Bring the walks and observations tables up to date.
    pub async fn migrate(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn create_walk(&self, client_ref: &str, walk: &WalkFields) -> Result<Created> {
        insert_walk(&self.pool, client_ref, walk).await
    }

    async fn update_walk(&self, id: &str, patch: &WalkPatch) -> Result<bool> {
        walks::update_walk(&self.pool, id, patch).await
    }

    async fn get_walk(&self, id: &str) -> Result<Option<StoredWalk>> {
        walks::get_walk(&self.pool, id).await
    }

    async fn create_observation(
        &self,
        client_ref: &str,
        walk_id: &str,
        observation: &ObservationFields,
    ) -> Result<Option<Created>> {
        insert_observation(&self.pool, client_ref, walk_id, observation).await
    }

    async fn observations_for_walk(&self, walk_id: &str) -> Result<Option<Vec<StoredObservation>>> {
        if !walk_exists(&self.pool, walk_id).await? {
            return Ok(None);
        }
        observations::observations_for_walk(&self.pool, walk_id)
            .await
            .map(Some)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_tag(&self) -> &'static str {
        "postgres"
    }
}
