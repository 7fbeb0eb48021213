use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use thiserror::Error;

use crate::client::ReservationApi;
use crate::error::ApiError;
use crate::types::Room;

/// Labels that name a room directly instead of following the building-code
/// scheme.
pub const DEFAULT_ROOM_OVERRIDES: &[(&str, &str)] = &[
    ("AUDITORIO", "Auditorium"),
    ("AUD-A", "Auditorium A"),
    ("AUD-B", "Auditorium B"),
    ("MINIAUD", "Mini Auditorium"),
];

#[derive(Debug, Clone, Error)]
pub enum RoomError {
    #[error("room '{label}' (resolved as '{resolved_name}') does not exist on the target service")]
    NotMappable { label: String, resolved_name: String },
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomMapping {
    pub label: String,
    pub resolved_name: String,
    pub target_room_id: Option<i64>,
    pub mappable: bool,
    pub error: Option<String>,
}

pub struct RoomResolver<A: ?Sized> {
    api: Arc<A>,
    overrides: HashMap<String, String>,
    memo: Cache<String, RoomMapping>,
    rooms: Cache<(), Arc<Vec<Room>>>,
}

impl<A: ReservationApi + ?Sized + 'static> RoomResolver<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self::with_ttl(api, Duration::from_secs(60 * 60))
    }

    pub fn with_ttl(api: Arc<A>, ttl: Duration) -> Self {
        Self {
            api,
            overrides: DEFAULT_ROOM_OVERRIDES
                .iter()
                .map(|(label, name)| ((*label).to_string(), (*name).to_string()))
                .collect(),
            memo: Cache::builder().time_to_live(ttl).build(),
            rooms: Cache::builder().time_to_live(ttl).max_capacity(1).build(),
        }
    }

    pub fn with_override(mut self, label: impl Into<String>, name: impl Into<String>) -> Self {
        self.overrides.insert(label.into(), name.into());
        self
    }

    /// Name the label is expected to carry on the target service.
    pub fn resolved_name(&self, label: &str) -> String {
        let label = label.trim();
        match self.overrides.get(label) {
            Some(name) => name.clone(),
            None => padded_room_name(label),
        }
    }

    /// Memoized mapping for `label`, mappable or not. The resolved name must
    /// equal a target room name exactly, surrounding whitespace aside.
    /// Failures fetching the room list are returned and not memoized.
    pub async fn mapping(&self, label: &str) -> Result<RoomMapping, ApiError> {
        let key = label.trim().to_string();
        if let Some(mapping) = self.memo.get(&key).await {
            return Ok(mapping);
        }

        let resolved_name = self.resolved_name(&key);
        let rooms = self.rooms().await?;
        let target_room_id = rooms
            .iter()
            .find(|room| room.name.trim() == resolved_name)
            .map(|room| room.id);

        let mapping = RoomMapping {
            label: key.clone(),
            mappable: target_room_id.is_some(),
            error: target_room_id
                .is_none()
                .then(|| format!("no target room named '{resolved_name}'")),
            resolved_name,
            target_room_id,
        };
        if !mapping.mappable {
            tracing::debug!(label = %mapping.label, resolved = %mapping.resolved_name, "room not mappable");
        }
        self.memo.insert(key, mapping.clone()).await;
        Ok(mapping)
    }

    pub async fn resolve(&self, label: &str) -> Result<i64, RoomError> {
        let mapping = self.mapping(label).await?;
        mapping.target_room_id.ok_or(RoomError::NotMappable {
            label: mapping.label,
            resolved_name: mapping.resolved_name,
        })
    }

    pub async fn invalidate(&self) {
        self.memo.invalidate_all();
        self.rooms.invalidate_all();
        self.memo.run_pending_tasks().await;
        self.rooms.run_pending_tasks().await;
    }

    async fn rooms(&self) -> Result<Arc<Vec<Room>>, ApiError> {
        let api = self.api.clone();
        self.rooms
            .try_get_with((), async move {
                let rooms = api.list_rooms().await?;
                tracing::info!(count = rooms.len(), "fetched target room list");
                Ok::<_, ApiError>(Arc::new(rooms))
            })
            .await
            .map_err(|err| (*err).clone())
    }
}

/// Legacy labels drop a zero from the room number: `B01` is `B001`.
/// Four-character labels are already in target form.
pub fn padded_room_name(label: &str) -> String {
    let label = label.trim();
    let chars: Vec<char> = label.chars().collect();
    if chars.len() == 4 || chars.len() < 3 {
        return label.to_string();
    }

    let mut padded = String::with_capacity(4);
    padded.push(chars[0]);
    padded.push('0');
    padded.extend(&chars[1..3]);
    padded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_inserts_zero_after_building_code() {
        assert_eq!(padded_room_name("B01"), "B001");
        assert_eq!(padded_room_name("A12"), "A012");
        assert_eq!(padded_room_name("B001"), "B001");
        assert_eq!(padded_room_name(" B01 "), "B001");
    }

    #[test]
    fn padding_is_idempotent() {
        for label in ["B01", "C15", "B001", "LAB1"] {
            let once = padded_room_name(label);
            assert_eq!(padded_room_name(&once), once);
        }
    }
}
