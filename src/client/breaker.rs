use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::client::CircuitBreakerConfig;
use crate::error::ApiError;
use crate::kv::{self, KvError, KvStore};
use crate::types::{CircuitMetrics, CircuitState, CircuitStatus};

/// Tri-state gate in front of the target service. State lives in the
/// [`KvStore`] so it survives restarts and is seen by every client
/// pointed at the same store. Concurrent read-modify-write of the failure
/// count may lose an increment.
#[derive(Clone)]
pub struct CircuitBreaker {
    store: Arc<dyn KvStore>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(store: Arc<dyn KvStore>, config: CircuitBreakerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub async fn state(&self) -> Result<CircuitState, KvError> {
        Ok(kv::get_json(self.store.as_ref(), &self.config.key)
            .await?
            .unwrap_or_default())
    }

    pub async fn can_execute(&self) -> Result<(), ApiError> {
        if !self.config.enabled {
            return Ok(());
        }

        let mut state = self.state().await?;
        match state.state {
            CircuitStatus::Closed | CircuitStatus::HalfOpen => Ok(()),
            CircuitStatus::Open => {
                let now = Utc::now();
                let retry_at = self.retry_at(&state).unwrap_or(now);
                if now < retry_at {
                    return Err(ApiError::CircuitOpen { retry_at });
                }

                state.state = CircuitStatus::HalfOpen;
                self.save(&state).await?;
                tracing::info!(
                    failure_count = state.failure_count,
                    "circuit half-open, allowing probe"
                );
                Ok(())
            }
        }
    }

    pub async fn record_success(&self) -> Result<(), KvError> {
        if !self.config.enabled {
            return Ok(());
        }

        let mut state = self.state().await?;
        if state.state == CircuitStatus::Closed && state.failure_count == 0 {
            return Ok(());
        }

        if state.state != CircuitStatus::Closed {
            tracing::info!(from = state.state.as_str(), "circuit closed");
        }
        state.state = CircuitStatus::Closed;
        state.failure_count = 0;
        state.opened_at = None;
        self.save(&state).await
    }

    pub async fn record_failure(&self, err: &ApiError) -> Result<(), KvError> {
        if !self.config.enabled {
            return Ok(());
        }

        let now = Utc::now();
        let mut state = self.state().await?;
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure_at = Some(now);
        state.last_error = Some(err.to_string());

        let should_open = state.state == CircuitStatus::HalfOpen
            || state.failure_count >= self.config.failure_threshold;
        if should_open && state.state != CircuitStatus::Open {
            state.state = CircuitStatus::Open;
            state.opened_at = Some(now);
            tracing::warn!(
                failure_count = state.failure_count,
                threshold = self.config.failure_threshold,
                error = %err,
                "circuit opened"
            );
        }

        self.save(&state).await
    }

    pub async fn force_reset(&self) -> Result<(), KvError> {
        self.save(&CircuitState::default()).await?;
        tracing::info!("circuit reset");
        Ok(())
    }

    pub async fn metrics(&self) -> Result<CircuitMetrics, KvError> {
        let state = self.state().await?;
        let next_retry_time = match state.state {
            CircuitStatus::Open => self.retry_at(&state),
            _ => None,
        };
        let can_execute = !self.config.enabled
            || state.state != CircuitStatus::Open
            || next_retry_time.is_none_or(|at| at <= Utc::now());

        Ok(CircuitMetrics {
            enabled: self.config.enabled,
            state: state.state,
            failure_count: state.failure_count,
            failure_threshold: self.config.failure_threshold,
            can_execute,
            next_retry_time,
            last_error: state.last_error,
        })
    }

    fn retry_at(&self, state: &CircuitState) -> Option<DateTime<Utc>> {
        let timeout = chrono::Duration::from_std(self.config.timeout).ok()?;
        state.opened_at?.checked_add_signed(timeout)
    }

    async fn save(&self, state: &CircuitState) -> Result<(), KvError> {
        kv::set_json(
            self.store.as_ref(),
            &self.config.key,
            state,
            Some(self.config.state_ttl),
        )
        .await
    }
}
