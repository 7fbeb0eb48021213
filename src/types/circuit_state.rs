use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitState {
    pub state: CircuitStatus,
    pub failure_count: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Stamped on the transition to open; the probe timeout counts from here.
    pub opened_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Default for CircuitState {
    fn default() -> Self {
        Self {
            state: CircuitStatus::Closed,
            failure_count: 0,
            last_failure_at: None,
            opened_at: None,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitStatus::Closed => "closed",
            CircuitStatus::Open => "open",
            CircuitStatus::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CircuitMetrics {
    pub enabled: bool,
    pub state: CircuitStatus,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub can_execute: bool,
    pub next_retry_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}
