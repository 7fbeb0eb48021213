use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::{LegacyError, LegacyQuery, LegacyStore};
use crate::types::LegacyReservation;

/// Reads `legacy_reservations` from an exported copy of the legacy
/// database. Dates are stored as `YYYY-MM-DD` text.
#[derive(Debug, Clone)]
pub struct SqliteLegacyStore {
    pool: SqlitePool,
}

impl SqliteLegacyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, LegacyError> {
        let options = SqliteConnectOptions::from_str(database_url)?.read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl LegacyStore for SqliteLegacyStore {
    async fn fetch_reservations(
        &self,
        query: &LegacyQuery,
    ) -> Result<Vec<LegacyReservation>, LegacyError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT \
                source_id, \
                date, \
                start_time, \
                end_time, \
                title, \
                requester, \
                email, \
                participant_count, \
                room_label, \
                requisition_id, \
                activity_type, \
                approval_status, \
                regular \
            FROM legacy_reservations \
            WHERE 1 = 1",
        );

        if let Some(from) = query.from {
            builder
                .push(" AND date >= ")
                .push_bind(from.format("%Y-%m-%d").to_string());
        }
        if let Some(until) = query.until {
            builder
                .push(" AND date <= ")
                .push_bind(until.format("%Y-%m-%d").to_string());
        }
        if query.approved_only {
            builder.push(" AND lower(coalesce(approval_status, '')) = 'approved'");
        }
        if !query.room_labels.is_empty() {
            builder.push(" AND room_label IN (");
            let mut labels = builder.separated(", ");
            for label in &query.room_labels {
                labels.push_bind(label.clone());
            }
            labels.push_unseparated(")");
        }
        builder.push(" ORDER BY date ASC, start_time ASC, source_id ASC");

        let rows = builder
            .build_query_as::<LegacyReservation>()
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(rows = rows.len(), "fetched legacy reservations");
        Ok(rows)
    }
}
