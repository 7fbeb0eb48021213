use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::payload::{TimeWindow, hhmm};
use crate::mapping::adjust_end_time;

/// Row as read from the legacy store. Everything except the key is loosely
/// typed; `ReservationCandidate::try_from` is the only way in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LegacyReservation {
    pub source_id: String,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub title: Option<String>,
    pub requester: Option<String>,
    pub email: Option<String>,
    pub participant_count: Option<i64>,
    pub room_label: Option<String>,
    pub requisition_id: Option<String>,
    pub activity_type: Option<String>,
    pub approval_status: Option<String>,
    pub regular: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationCandidate {
    pub source_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub title: String,
    pub requester: Option<String>,
    pub email: Option<String>,
    pub participant_count: Option<u32>,
    pub room_label: String,
    /// Legacy requisition; candidates sharing it book one reservation.
    pub group_id: Option<String>,
    pub activity_type: Option<String>,
    /// Weekly class of the academic term rather than an ad hoc booking.
    pub regular: bool,
}

impl ReservationCandidate {
    pub fn raw_window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time)
    }

    /// ISO weekday, Monday = 1 through Sunday = 7.
    pub fn weekday(&self) -> u8 {
        self.date.weekday().number_from_monday() as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{source_id}: {field} {message}")]
pub struct FieldValidationError {
    pub source_id: String,
    pub field: &'static str,
    pub value: Option<String>,
    pub message: String,
}

impl FieldValidationError {
    fn new(source_id: &str, field: &'static str, value: Option<&str>, message: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            field,
            value: value.map(str::to_string),
            message: message.to_string(),
        }
    }
}

impl TryFrom<LegacyReservation> for ReservationCandidate {
    type Error = FieldValidationError;

    fn try_from(row: LegacyReservation) -> Result<Self, Self::Error> {
        let source_id = row.source_id.trim().to_string();
        if source_id.is_empty() {
            return Err(FieldValidationError::new(
                "<unknown>",
                "source_id",
                None,
                "is required",
            ));
        }

        let date_raw = required(&source_id, "date", row.date.as_deref())?;
        let date = parse_date(date_raw)
            .ok_or_else(|| {
                FieldValidationError::new(&source_id, "date", Some(date_raw), "is not a valid date")
            })?;

        let start_raw = required(&source_id, "start_time", row.start_time.as_deref())?;
        let start_time = hhmm::parse(start_raw).ok_or_else(|| {
            FieldValidationError::new(&source_id, "start_time", Some(start_raw), "is not HH:MM")
        })?;
        let end_raw = required(&source_id, "end_time", row.end_time.as_deref())?;
        let end_time = hhmm::parse(end_raw).ok_or_else(|| {
            FieldValidationError::new(&source_id, "end_time", Some(end_raw), "is not HH:MM")
        })?;
        if end_time <= start_time {
            return Err(FieldValidationError::new(
                &source_id,
                "end_time",
                Some(end_raw),
                &format!("must be after start_time {}", hhmm::format(start_time)),
            ));
        }
        if adjust_end_time(end_time) <= start_time {
            return Err(FieldValidationError::new(
                &source_id,
                "end_time",
                Some(end_raw),
                &format!(
                    "leaves an empty window after start_time {} once moved to {}",
                    hhmm::format(start_time),
                    hhmm::format(adjust_end_time(end_time))
                ),
            ));
        }

        let title = required(&source_id, "title", row.title.as_deref())?.to_string();
        let room_label = required(&source_id, "room_label", row.room_label.as_deref())?.to_string();

        let email = non_empty(row.email.as_deref());
        if let Some(email) = email.as_deref()
            && !email.contains('@')
        {
            return Err(FieldValidationError::new(
                &source_id,
                "email",
                Some(email),
                "is not an email address",
            ));
        }

        let participant_count = match row.participant_count {
            Some(count) => Some(u32::try_from(count).map_err(|_| {
                FieldValidationError::new(
                    &source_id,
                    "participant_count",
                    Some(&count.to_string()),
                    "must be a non-negative count",
                )
            })?),
            None => None,
        };

        Ok(Self {
            source_id,
            date,
            start_time,
            end_time,
            title,
            requester: non_empty(row.requester.as_deref()),
            email,
            participant_count,
            room_label,
            group_id: non_empty(row.requisition_id.as_deref()),
            activity_type: non_empty(row.activity_type.as_deref()),
            regular: row.regular.unwrap_or(false),
        })
    }
}

fn required<'a>(
    source_id: &str,
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, FieldValidationError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(FieldValidationError::new(source_id, field, None, "is required")),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%d/%m/%Y"))
        .ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row() -> LegacyReservation {
        LegacyReservation {
            source_id: "R-1".to_string(),
            date: Some("2024-03-04".to_string()),
            start_time: Some("08:00".to_string()),
            end_time: Some("10:00".to_string()),
            title: Some("MAC0110 T01".to_string()),
            requester: Some("  ".to_string()),
            email: None,
            participant_count: Some(40),
            room_label: Some("B01".to_string()),
            requisition_id: Some("REQ-7".to_string()),
            activity_type: None,
            approval_status: Some("approved".to_string()),
            regular: Some(true),
        }
    }

    #[test]
    fn converts_a_complete_row() {
        let candidate = ReservationCandidate::try_from(row()).unwrap();

        assert_eq!(candidate.date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(candidate.weekday(), 1);
        assert_eq!(candidate.group_id.as_deref(), Some("REQ-7"));
        assert_eq!(candidate.requester, None);
        assert!(candidate.regular);
    }

    #[test]
    fn legacy_date_format_is_accepted() {
        let mut row = row();
        row.date = Some("06/03/2024".to_string());

        let candidate = ReservationCandidate::try_from(row).unwrap();
        assert_eq!(candidate.weekday(), 3);
    }

    #[test]
    fn missing_room_label_names_the_field() {
        let mut row = row();
        row.room_label = None;

        let err = ReservationCandidate::try_from(row).unwrap_err();
        assert_eq!(err.field, "room_label");
        assert_eq!(err.source_id, "R-1");
    }

    #[test]
    fn end_must_follow_start() {
        let mut row = row();
        row.end_time = Some("08:00".to_string());

        let err = ReservationCandidate::try_from(row).unwrap_err();
        assert_eq!(err.field, "end_time");
        assert_eq!(err.value.as_deref(), Some("08:00"));
    }

    #[test]
    fn window_emptied_by_the_hour_adjustment_is_rejected() {
        let mut row = row();
        row.start_time = Some("09:59".to_string());
        row.end_time = Some("10:00".to_string());

        let err = ReservationCandidate::try_from(row).unwrap_err();
        assert_eq!(err.field, "end_time");
        assert_eq!(err.value.as_deref(), Some("10:00"));
    }

    #[test]
    fn negative_participant_count_is_rejected() {
        let mut row = row();
        row.participant_count = Some(-3);

        let err = ReservationCandidate::try_from(row).unwrap_err();
        assert_eq!(err.field, "participant_count");
    }
}
