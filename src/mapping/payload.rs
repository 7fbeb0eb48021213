use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime, Timelike};
use thiserror::Error;

use crate::client::ReservationApi;
use crate::rooms::{RoomError, RoomResolver};
use crate::types::{ReservationCandidate, ReservationPayload, Schedule, TimeWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingOptions {
    pub purpose_id: i64,
    /// Last day of the academic term; regular classes repeat until it.
    pub term_end: Option<NaiveDate>,
}

impl Default for MappingOptions {
    fn default() -> Self {
        Self {
            purpose_id: 1,
            term_end: None,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum MappingError {
    #[error("cannot map an empty group")]
    EmptyGroup,
    #[error("group {group_id} spans several rooms: {}", labels.join(", "))]
    MixedRooms { group_id: String, labels: Vec<String> },
    #[error("weekday {weekday} has two different windows: {first} and {second}")]
    AmbiguousWeekday {
        weekday: u8,
        first: TimeWindow,
        second: TimeWindow,
    },
    #[error(transparent)]
    Room(#[from] RoomError),
}

/// Turns candidates into creation payloads. Rooms go through the shared
/// resolver; everything else is pure.
pub struct PayloadMapper<A: ?Sized> {
    resolver: Arc<RoomResolver<A>>,
    options: MappingOptions,
}

impl<A: ReservationApi + ?Sized + 'static> PayloadMapper<A> {
    pub fn new(resolver: Arc<RoomResolver<A>>, options: MappingOptions) -> Self {
        Self { resolver, options }
    }

    pub fn options(&self) -> &MappingOptions {
        &self.options
    }

    pub async fn map_single(
        &self,
        candidate: &ReservationCandidate,
    ) -> Result<ReservationPayload, MappingError> {
        let room_id = self.resolver.resolve(&candidate.room_label).await?;
        Ok(single_payload(candidate, room_id, self.options.purpose_id))
    }

    pub async fn map_group(
        &self,
        candidates: &[ReservationCandidate],
    ) -> Result<ReservationPayload, MappingError> {
        let first = candidates.first().ok_or(MappingError::EmptyGroup)?;
        check_same_room(candidates, |label| self.resolver.resolved_name(label))?;
        let room_id = self.resolver.resolve(&first.room_label).await?;
        group_payload(candidates, room_id, &self.options)
    }
}

pub fn single_payload(
    candidate: &ReservationCandidate,
    room_id: i64,
    purpose_id: i64,
) -> ReservationPayload {
    ReservationPayload {
        name: candidate.title.clone(),
        start_date: candidate.date,
        schedule: Schedule::Single {
            start_time: candidate.start_time,
            end_time: adjust_end_time(candidate.end_time),
        },
        room_id,
        purpose_id,
    }
}

/// Recurring payload for a group already resolved to `room_id`. Identical
/// windows on every weekday give the weekly shape, anything else the
/// per-weekday shape. Room agreement is the caller's check.
pub fn group_payload(
    candidates: &[ReservationCandidate],
    room_id: i64,
    options: &MappingOptions,
) -> Result<ReservationPayload, MappingError> {
    let first = candidates.first().ok_or(MappingError::EmptyGroup)?;

    let day_times = build_day_times(candidates)?;
    let repeat_days = extract_repeat_days(candidates);
    let start_date = candidates.iter().map(|c| c.date).min().unwrap_or(first.date);
    let last_date = candidates.iter().map(|c| c.date).max().unwrap_or(first.date);
    let repeat_until = match options.term_end {
        Some(term_end) if candidates.iter().all(|c| c.regular) => term_end,
        _ => last_date,
    };

    let schedule = match day_times.values().next() {
        Some(window) if !has_distinct_times(&day_times) => Schedule::Weekly {
            start_time: window.start,
            end_time: window.end,
            repeat_days,
            repeat_until,
        },
        _ => Schedule::PerWeekday {
            day_times,
            repeat_days,
            repeat_until,
        },
    };

    let titles: Vec<&str> = candidates.iter().map(|c| c.title.as_str()).collect();
    Ok(ReservationPayload {
        name: compose_name(&titles),
        start_date,
        schedule,
        room_id,
        purpose_id: options.purpose_id,
    })
}

/// The target service treats end times as inclusive, so a window ending on
/// the hour stops a minute early: `10:00` becomes `09:59`, `16:30` stays.
pub fn adjust_end_time(end: NaiveTime) -> NaiveTime {
    if end.minute() == 0 {
        end - Duration::minutes(1)
    } else {
        end
    }
}

pub fn build_day_times(
    candidates: &[ReservationCandidate],
) -> Result<BTreeMap<u8, TimeWindow>, MappingError> {
    let mut day_times = BTreeMap::new();
    for candidate in candidates {
        let window = TimeWindow::new(candidate.start_time, adjust_end_time(candidate.end_time));
        let weekday = candidate.weekday();
        match day_times.get(&weekday) {
            Some(existing) if *existing != window => {
                return Err(MappingError::AmbiguousWeekday {
                    weekday,
                    first: *existing,
                    second: window,
                });
            }
            Some(_) => {}
            None => {
                day_times.insert(weekday, window);
            }
        }
    }
    Ok(day_times)
}

pub fn has_distinct_times(day_times: &BTreeMap<u8, TimeWindow>) -> bool {
    let mut windows = day_times.values();
    match windows.next() {
        Some(first) => windows.any(|window| window != first),
        None => false,
    }
}

pub fn extract_repeat_days(candidates: &[ReservationCandidate]) -> Vec<u8> {
    let mut days: Vec<u8> = candidates.iter().map(ReservationCandidate::weekday).collect();
    days.sort_unstable();
    days.dedup();
    days
}

/// `["MAC0110 T01", "MAC0110 T02"]` gives `"MAC0110 T01/T02"`; unrelated
/// titles are joined with `" + "`.
pub fn compose_name(titles: &[&str]) -> String {
    let mut distinct: Vec<&str> = Vec::new();
    for title in titles.iter().map(|title| title.trim()) {
        if !title.is_empty() && !distinct.contains(&title) {
            distinct.push(title);
        }
    }

    match distinct.as_slice() {
        [] => String::new(),
        [only] => (*only).to_string(),
        [first, rest @ ..] => {
            let code = subject_code(first);
            let suffixes: Vec<&str> = distinct
                .iter()
                .filter_map(|title| {
                    let (title_code, suffix) = split_title(title);
                    (title_code == code && !suffix.is_empty()).then_some(suffix)
                })
                .collect();

            if suffixes.len() == rest.len() + 1 {
                format!("{code} {}", suffixes.join("/"))
            } else {
                distinct.join(" + ")
            }
        }
    }
}

fn subject_code(title: &str) -> &str {
    split_title(title).0
}

fn split_title(title: &str) -> (&str, &str) {
    match title.split_once(char::is_whitespace) {
        Some((code, suffix)) => (code, suffix.trim()),
        None => (title, ""),
    }
}

/// Labels that name the same target room (`B01` and `B001`) agree; the
/// error lists the distinct resolved names.
pub fn check_same_room(
    candidates: &[ReservationCandidate],
    resolved_name: impl Fn(&str) -> String,
) -> Result<(), MappingError> {
    let mut names: Vec<String> = Vec::new();
    for candidate in candidates {
        let name = resolved_name(&candidate.room_label);
        if !names.contains(&name) {
            names.push(name);
        }
    }

    if names.len() > 1 {
        let group_id = candidates
            .iter()
            .find_map(|c| c.group_id.clone())
            .unwrap_or_else(|| "<ungrouped>".to_string());
        return Err(MappingError::MixedRooms {
            group_id,
            labels: names,
        });
    }
    Ok(())
}
