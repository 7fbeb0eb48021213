mod auth;
mod breaker;
mod config;
mod rate_limit;
mod resilient;
mod retry;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::ApiError;
use crate::types::{
    CreatedReservation, ExistingReservation, HealthStatus, ReservationPayload, Room,
};

pub use auth::TokenCache;
pub use breaker::CircuitBreaker;
pub use config::{CircuitBreakerConfig, ClientConfig, RetryConfig};
pub use rate_limit::{RateLimitMetrics, RateLimiter};
pub use resilient::{ClientMetrics, ResilientClient};
pub use retry::{backoff_delay, retry_delay};

/// Typed operations of the target reservation service.
#[async_trait]
pub trait ReservationApi: Send + Sync {
    async fn list_rooms(&self) -> Result<Vec<Room>, ApiError>;

    async fn list_reservations(
        &self,
        room_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<ExistingReservation>, ApiError>;

    async fn create_reservation(
        &self,
        payload: &ReservationPayload,
    ) -> Result<CreatedReservation, ApiError>;

    /// `purge` also removes every instance of a recurring reservation.
    async fn delete_reservation(&self, id: i64, purge: bool) -> Result<(), ApiError>;

    async fn health(&self) -> Result<HealthStatus, ApiError>;
}
