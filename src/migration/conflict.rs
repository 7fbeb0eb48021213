use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;

use crate::client::ReservationApi;
use crate::error::ApiError;
use crate::types::{ExistingReservation, TimeWindow};

pub type Slot = (i64, NaiveDate);

/// Existing reservations per (room, date), fetched once before any
/// candidate is checked. A failed fetch is kept for its slot.
#[derive(Debug, Default)]
pub struct ReservationSnapshot {
    slots: HashMap<Slot, Result<Vec<ExistingReservation>, ApiError>>,
}

impl ReservationSnapshot {
    pub async fn prefetch<A: ReservationApi + ?Sized>(
        api: &A,
        slots: impl IntoIterator<Item = Slot>,
    ) -> Self {
        let slots: BTreeSet<Slot> = slots.into_iter().collect();
        let mut snapshot = Self::default();
        for (room_id, date) in slots {
            let result = api.list_reservations(room_id, date).await;
            if let Err(err) = &result {
                tracing::warn!(room_id, %date, error = %err, "failed to fetch existing reservations");
            }
            snapshot.slots.insert((room_id, date), result);
        }
        tracing::info!(slots = snapshot.slots.len(), "conflict snapshot taken");
        snapshot
    }

    pub fn get(&self, room_id: i64, date: NaiveDate) -> Option<&Result<Vec<ExistingReservation>, ApiError>> {
        self.slots.get(&(room_id, date))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

pub fn find_overlap<'a>(
    existing: &'a [ExistingReservation],
    window: &TimeWindow,
) -> Option<&'a ExistingReservation> {
    existing
        .iter()
        .find(|reservation| reservation.window().overlaps(window))
}

#[derive(Debug)]
struct Planned {
    unit: usize,
    source_id: String,
    window: TimeWindow,
}

/// Windows already accepted in this run, so two units cannot book the same
/// slot against each other.
#[derive(Debug, Default)]
pub struct PlannedWindows {
    slots: HashMap<Slot, Vec<Planned>>,
}

impl PlannedWindows {
    /// Source id of a different unit whose window overlaps.
    pub fn conflict(&self, slot: Slot, unit: usize, window: &TimeWindow) -> Option<&str> {
        self.slots.get(&slot)?.iter().find_map(|planned| {
            (planned.unit != unit && planned.window.overlaps(window))
                .then_some(planned.source_id.as_str())
        })
    }

    pub fn add(&mut self, slot: Slot, unit: usize, source_id: &str, window: TimeWindow) {
        self.slots.entry(slot).or_default().push(Planned {
            unit,
            source_id: source_id.to_string(),
            window,
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveTime;

    use super::*;

    fn window(start: u32, end: u32) -> TimeWindow {
        TimeWindow::new(
            NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
        )
    }

    #[test]
    fn planned_windows_ignore_their_own_unit() {
        let slot = (1, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        let mut planned = PlannedWindows::default();
        planned.add(slot, 0, "R-1", window(8, 10));

        assert_eq!(planned.conflict(slot, 0, &window(9, 11)), None);
        assert_eq!(planned.conflict(slot, 1, &window(9, 11)), Some("R-1"));
        assert_eq!(planned.conflict(slot, 1, &window(10, 11)), None);
    }
}
