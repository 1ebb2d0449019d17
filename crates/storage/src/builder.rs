use whistle_ads_domain::storage::{StorageError, StorageResult};

use crate::SeaOrmStorage;

/// Builder form of [`SeaOrmStorage::connect`] for callers that assemble the
/// connection target in steps.
#[derive(Debug, Default)]
pub struct StorageBuilder {
    database_url: Option<String>,
}

impl StorageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub async fn build(self) -> StorageResult<SeaOrmStorage> {
        match self.database_url {
            Some(url) => SeaOrmStorage::connect(&url).await,
            None => Err(StorageError::Database("missing database url".into())),
        }
    }
}
