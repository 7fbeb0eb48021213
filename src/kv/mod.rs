mod memory;
mod sqlite;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("invalid value for {key}: {message}")]
    Parse { key: String, message: String },
}

/// Key-value store with per-entry expiry. Holds the circuit state and the
/// cached auth token so both survive restarts and are shared between
/// processes pointed at the same store.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// `ttl = None` stores the entry without expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError>;

    async fn delete(&self, key: &str) -> Result<(), KvError>;
}

pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, KvError> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|err| KvError::Parse {
            key: key.to_string(),
            message: err.to_string(),
        })
}

pub async fn set_json<T: Serialize + Sync>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<(), KvError> {
    let raw = serde_json::to_string(value).map_err(|err| KvError::Parse {
        key: key.to_string(),
        message: err.to_string(),
    })?;
    store.set(key, &raw, ttl).await
}
