//! SeaORM-backed storage adapters that satisfy the domain storage traits
//! while keeping the database backend swappable (SQLite by default,
//! PostgreSQL via feature flag).

mod builder;
mod campaign_store;
mod creator_store;
mod entity;
mod event_store;
mod migration;
mod settlement_store;

use std::sync::Arc;

use builder::StorageBuilder;
use migration::run_migrations;
use sea_orm::{Database, DatabaseConnection};
use whistle_ads_domain::storage::{StorageError, StorageResult};

/// Shared storage handle used by the HTTP API and the settlement worker.
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmStorage {
    /// Connects to the provided database URL and ensures the schema is
    /// present.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        let db = Database::connect(database_url)
            .await
            .map_err(StorageError::from_source)?;
        run_migrations(&db).await?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn builder() -> StorageBuilder {
        StorageBuilder::new()
    }

    pub fn connection(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }
}
