mod sqlite;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::types::LegacyReservation;

pub use sqlite::SqliteLegacyStore;

#[derive(Debug, Error)]
pub enum LegacyError {
    #[error("legacy database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Filters for the legacy query. Empty `room_labels` means every room.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyQuery {
    pub from: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    pub approved_only: bool,
    pub room_labels: Vec<String>,
}

/// Read-only access to the legacy scheduling database.
#[async_trait]
pub trait LegacyStore: Send + Sync {
    /// Rows in stable order: date, start time, source id.
    async fn fetch_reservations(
        &self,
        query: &LegacyQuery,
    ) -> Result<Vec<LegacyReservation>, LegacyError>;
}
