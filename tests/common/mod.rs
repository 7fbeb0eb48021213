#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use bridge::client::ReservationApi;
use bridge::error::ApiError;
use bridge::types::{
    CreatedReservation, ExistingReservation, HealthStatus, LegacyReservation, ReservationPayload,
    Room, hhmm,
};
use chrono::NaiveDate;
use parking_lot::Mutex;

/// In-process stand-in for the target service with call counters and
/// failure injection.
pub struct FakeApi {
    rooms: Vec<Room>,
    existing: HashMap<(i64, NaiveDate), Vec<ExistingReservation>>,
    pub created: Mutex<Vec<ReservationPayload>>,
    pub deleted: Mutex<Vec<(i64, bool)>>,
    pub list_rooms_calls: AtomicUsize,
    pub list_reservations_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    fail_list_rooms: AtomicUsize,
    fail_create_at: Option<usize>,
    create_without_id_at: Option<usize>,
    fail_delete_ids: HashSet<i64>,
    next_id: AtomicI64,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            rooms: vec![
                Room {
                    id: 10,
                    name: "B001".to_string(),
                },
                Room {
                    id: 20,
                    name: "B002".to_string(),
                },
                Room {
                    id: 30,
                    name: "Auditorium A".to_string(),
                },
            ],
            existing: HashMap::new(),
            created: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            list_rooms_calls: AtomicUsize::new(0),
            list_reservations_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            fail_list_rooms: AtomicUsize::new(0),
            fail_create_at: None,
            create_without_id_at: None,
            fail_delete_ids: HashSet::new(),
            next_id: AtomicI64::new(100),
        }
    }

    pub fn with_existing(
        mut self,
        room_id: i64,
        date: &str,
        id: i64,
        start: &str,
        end: &str,
    ) -> Self {
        let reservation = ExistingReservation {
            id,
            name: format!("existing {id}"),
            start_time: hhmm::parse(start).expect("start time"),
            end_time: hhmm::parse(end).expect("end time"),
            recurrent: false,
        };
        self.existing
            .entry((room_id, date_of(date)))
            .or_default()
            .push(reservation);
        self
    }

    /// The `n`th create call (1-based) fails with a server error.
    pub fn failing_create_at(mut self, n: usize) -> Self {
        self.fail_create_at = Some(n);
        self
    }

    /// The `n`th create call succeeds without returning an id.
    pub fn create_without_id_at(mut self, n: usize) -> Self {
        self.create_without_id_at = Some(n);
        self
    }

    pub fn failing_delete_of(mut self, id: i64) -> Self {
        self.fail_delete_ids.insert(id);
        self
    }

    /// The next `n` room list fetches fail with a connection error.
    pub fn failing_room_list(self, n: usize) -> Self {
        self.fail_list_rooms.store(n, Ordering::SeqCst);
        self
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Delete attempts, failed ones included.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn mutating_calls(&self) -> usize {
        self.create_calls() + self.delete_calls()
    }

    pub fn deleted(&self) -> Vec<(i64, bool)> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl ReservationApi for FakeApi {
    async fn list_rooms(&self) -> Result<Vec<Room>, ApiError> {
        self.list_rooms_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_list_rooms.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_list_rooms.store(remaining - 1, Ordering::SeqCst);
            return Err(ApiError::Connection("connection refused".to_string()));
        }
        Ok(self.rooms.clone())
    }

    async fn list_reservations(
        &self,
        room_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<ExistingReservation>, ApiError> {
        self.list_reservations_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .existing
            .get(&(room_id, date))
            .cloned()
            .unwrap_or_default())
    }

    async fn create_reservation(
        &self,
        payload: &ReservationPayload,
    ) -> Result<CreatedReservation, ApiError> {
        let call = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_create_at == Some(call) {
            return Err(ApiError::Server {
                status: 500,
                message: "boom".to_string(),
            });
        }

        self.created.lock().push(payload.clone());
        let id = (self.create_without_id_at != Some(call))
            .then(|| self.next_id.fetch_add(1, Ordering::SeqCst));
        Ok(CreatedReservation {
            id,
            recurrent: payload.schedule.is_recurring(),
            instances_created: None,
        })
    }

    async fn delete_reservation(&self, id: i64, purge: bool) -> Result<(), ApiError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete_ids.contains(&id) {
            return Err(ApiError::Server {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        self.deleted.lock().push((id, purge));
        Ok(())
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        Ok(HealthStatus {
            status: "ok".to_string(),
        })
    }
}

pub fn date_of(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
}

pub fn legacy_row(
    source_id: &str,
    date: &str,
    start: &str,
    end: &str,
    room: &str,
    requisition: Option<&str>,
) -> LegacyReservation {
    LegacyReservation {
        source_id: source_id.to_string(),
        date: Some(date.to_string()),
        start_time: Some(start.to_string()),
        end_time: Some(end.to_string()),
        title: Some(format!("Booking {source_id}")),
        requester: Some("Secretariat".to_string()),
        email: Some("secretariat@example.org".to_string()),
        participant_count: Some(30),
        room_label: Some(room.to_string()),
        requisition_id: requisition.map(str::to_string),
        activity_type: Some("class".to_string()),
        approval_status: Some("approved".to_string()),
        regular: Some(false),
    }
}
