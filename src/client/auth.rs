use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::kv::{self, KvError, KvStore};
use crate::types::AuthToken;

/// Bearer token cached in the state store under one key.
#[derive(Clone)]
pub struct TokenCache {
    store: Arc<dyn KvStore>,
    key: String,
    default_ttl: Duration,
}

impl TokenCache {
    pub fn new(store: Arc<dyn KvStore>, key: impl Into<String>, default_ttl: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            default_ttl,
        }
    }

    /// Cached token if one is present and not yet expired.
    pub async fn current(&self) -> Result<Option<AuthToken>, KvError> {
        let token: Option<AuthToken> = kv::get_json(self.store.as_ref(), &self.key).await?;
        Ok(token.filter(|token| !token.is_expired_at(Utc::now())))
    }

    /// Caches `value` for the configured TTL, or `expires_in` seconds when
    /// the service grants less.
    pub async fn store(&self, value: String, expires_in: Option<u64>) -> Result<AuthToken, KvError> {
        let ttl = match expires_in {
            Some(secs) => self.default_ttl.min(Duration::from_secs(secs)),
            None => self.default_ttl,
        };
        let token = AuthToken {
            value,
            acquired_at: Utc::now(),
            ttl_secs: ttl.as_secs(),
        };
        kv::set_json(self.store.as_ref(), &self.key, &token, Some(ttl)).await?;
        Ok(token)
    }

    pub async fn invalidate(&self) -> Result<(), KvError> {
        self.store.delete(&self.key).await
    }
}
