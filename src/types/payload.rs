use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// `HH:MM` wire format for times; `HH:MM:SS` is accepted on input.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn parse(value: &str) -> Option<NaiveTime> {
        let value = value.trim();
        NaiveTime::parse_from_str(value, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
            .ok()
    }

    pub fn format(time: NaiveTime) -> String {
        time.format("%H:%M").to_string()
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid time '{raw}', expected HH:MM")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Half-open overlap: windows that only touch do not overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", hhmm::format(self.start), hhmm::format(self.end))
    }
}

/// Creation request for `POST /reservations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationPayload {
    pub name: String,
    pub start_date: NaiveDate,
    #[serde(flatten)]
    pub schedule: Schedule,
    pub room_id: i64,
    pub purpose_id: i64,
}

/// The time representations accepted by the target service. Scalar
/// `startTime`/`endTime` and `dayTimes` are never emitted together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Schedule {
    #[serde(rename_all = "camelCase")]
    PerWeekday {
        day_times: BTreeMap<u8, TimeWindow>,
        repeat_days: Vec<u8>,
        repeat_until: NaiveDate,
    },
    #[serde(rename_all = "camelCase")]
    Weekly {
        #[serde(with = "hhmm")]
        start_time: NaiveTime,
        #[serde(with = "hhmm")]
        end_time: NaiveTime,
        repeat_days: Vec<u8>,
        repeat_until: NaiveDate,
    },
    #[serde(rename_all = "camelCase")]
    Single {
        #[serde(with = "hhmm")]
        start_time: NaiveTime,
        #[serde(with = "hhmm")]
        end_time: NaiveTime,
    },
}

impl Schedule {
    pub fn is_recurring(&self) -> bool {
        !matches!(self, Schedule::Single { .. })
    }

    pub fn scalar_window(&self) -> Option<TimeWindow> {
        match self {
            Schedule::Weekly {
                start_time,
                end_time,
                ..
            }
            | Schedule::Single {
                start_time,
                end_time,
            } => Some(TimeWindow::new(*start_time, *end_time)),
            Schedule::PerWeekday { .. } => None,
        }
    }

    pub fn day_times(&self) -> Option<&BTreeMap<u8, TimeWindow>> {
        match self {
            Schedule::PerWeekday { day_times, .. } => Some(day_times),
            _ => None,
        }
    }

    pub fn repeat_days(&self) -> &[u8] {
        match self {
            Schedule::PerWeekday { repeat_days, .. } | Schedule::Weekly { repeat_days, .. } => {
                repeat_days
            }
            Schedule::Single { .. } => &[],
        }
    }

    pub fn repeat_until(&self) -> Option<NaiveDate> {
        match self {
            Schedule::PerWeekday { repeat_until, .. } | Schedule::Weekly { repeat_until, .. } => {
                Some(*repeat_until)
            }
            Schedule::Single { .. } => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn per_weekday_payload_has_no_scalar_times() {
        let payload = ReservationPayload {
            name: "MAC0110 T01".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            schedule: Schedule::PerWeekday {
                day_times: BTreeMap::from([
                    (1, TimeWindow::new(t(8, 0), t(9, 59))),
                    (3, TimeWindow::new(t(14, 0), t(16, 30))),
                ]),
                repeat_days: vec![1, 3],
                repeat_until: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            },
            room_id: 12,
            purpose_id: 3,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("startTime").is_none());
        assert!(json.get("endTime").is_none());
        assert_eq!(json["dayTimes"]["3"]["start"], "14:00");
        assert_eq!(json["dayTimes"]["1"]["end"], "09:59");
        assert_eq!(json["repeatUntil"], "2024-07-01");
        assert_eq!(json["roomId"], 12);
    }

    #[test]
    fn single_payload_serializes_scalar_times() {
        let payload = ReservationPayload {
            name: "Defesa".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            schedule: Schedule::Single {
                start_time: t(8, 0),
                end_time: t(9, 59),
            },
            room_id: 4,
            purpose_id: 1,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["startTime"], "08:00");
        assert_eq!(json["endTime"], "09:59");
        assert!(json.get("dayTimes").is_none());
        assert!(json.get("repeatDays").is_none());

        let back: ReservationPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn hhmm_accepts_seconds_on_input() {
        assert_eq!(hhmm::parse("08:30:00"), Some(t(8, 30)));
        assert_eq!(hhmm::parse(" 8:05 "), Some(t(8, 5)));
        assert_eq!(hhmm::parse("25:00"), None);
    }

    #[test]
    fn touching_windows_do_not_overlap() {
        let morning = TimeWindow::new(t(8, 0), t(9, 59));
        assert!(!morning.overlaps(&TimeWindow::new(t(9, 59), t(11, 0))));
        assert!(morning.overlaps(&TimeWindow::new(t(9, 30), t(10, 30))));
    }
}
