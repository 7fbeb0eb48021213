use std::sync::Arc;

use thiserror::Error;

use crate::client::ResilientClient;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::kv::{KvError, KvStore, SqliteKvStore};
use crate::legacy::{LegacyError, SqliteLegacyStore};
use crate::migration::MigrationOrchestrator;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("state store: {0}")]
    Kv(#[from] KvError),
    #[error("legacy store: {0}")]
    Legacy(#[from] LegacyError),
    #[error("target service: {0}")]
    Api(#[from] ApiError),
}

/// Everything a run needs, wired from configuration.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub kv: SqliteKvStore,
    pub legacy: SqliteLegacyStore,
    pub client: Arc<ResilientClient>,
}

impl AppState {
    pub async fn connect(config: AppConfig) -> Result<Self, StartupError> {
        let kv = SqliteKvStore::connect(&config.state_database_url).await?;
        let purged = kv.purge_expired().await?;
        if purged > 0 {
            tracing::debug!(purged, "removed expired state entries");
        }

        let legacy = SqliteLegacyStore::connect(&config.legacy_database_url).await?;
        let store: Arc<dyn KvStore> = Arc::new(kv.clone());
        let client = Arc::new(ResilientClient::new(config.client.clone(), store)?);

        Ok(Self {
            config,
            kv,
            legacy,
            client,
        })
    }

    pub fn orchestrator(&self) -> MigrationOrchestrator<ResilientClient> {
        MigrationOrchestrator::new(self.client.clone(), self.config.migration.clone())
    }
}
