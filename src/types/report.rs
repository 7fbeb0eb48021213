use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::payload::ReservationPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    FieldValidation,
    UnmappableRoom,
    TimeConflict,
    ApiValidation,
    System,
    Creation,
    Rollback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationIssue {
    pub kind: IssueKind,
    pub source_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub message: String,
}

impl MigrationIssue {
    pub fn new(kind: IssueKind, source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            source_id: source_id.into(),
            field: None,
            value: None,
            message: message.into(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>, value: Option<String>) -> Self {
        self.field = Some(field.into());
        self.value = value;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    /// Position of the candidate in the input.
    pub index: usize,
    pub source_id: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<ReservationPayload>,
    pub issues: Vec<MigrationIssue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub processed: usize,
    pub passed: usize,
    pub failed: usize,
    pub halted_at: Option<String>,
    pub errors_by_kind: BTreeMap<IssueKind, usize>,
    pub records: Vec<VerificationRecord>,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.halted_at.is_none()
    }

    pub fn issues(&self) -> impl Iterator<Item = &MigrationIssue> {
        self.records.iter().flat_map(|record| record.issues.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationRecord {
    pub source_ids: Vec<String>,
    pub created_id: Option<i64>,
    pub recurrent: bool,
    pub simulated: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreationReport {
    pub requested: usize,
    pub created: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub batches: usize,
    pub records: Vec<CreationRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackFailure {
    pub reservation_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackReport {
    pub attempted: usize,
    pub deleted: usize,
    pub failures: Vec<RollbackFailure>,
    /// Creations that succeeded upstream without returning an id.
    pub manual_cleanup: Vec<String>,
}

impl RollbackReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.manual_cleanup.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Validating,
    Creating,
    RollingBack,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub dry_run: bool,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub verification: VerificationReport,
    pub creation: Option<CreationReport>,
    pub rollback: Option<RollbackReport>,
}

impl RunReport {
    /// 0 completed, 1 verification abort, 2 clean rollback, 3 partial rollback.
    pub fn exit_code(&self) -> u8 {
        match (self.state, &self.rollback) {
            (RunState::Completed, _) => 0,
            (_, Some(rollback)) if rollback.is_clean() => 2,
            (_, Some(_)) => 3,
            _ => 1,
        }
    }

    pub fn summary(&self) -> String {
        match (self.state, &self.creation, &self.rollback) {
            (RunState::Completed, Some(creation), _) => format!(
                "completed: {} of {} reservations created{}",
                creation.created,
                creation.requested,
                if self.dry_run { " (dry run)" } else { "" }
            ),
            (_, _, Some(rollback)) if rollback.is_clean() => format!(
                "aborted during creation: rolled back cleanly ({} deleted)",
                rollback.deleted
            ),
            (_, _, Some(rollback)) => format!(
                "aborted during creation: rollback partially failed ({} of {} deleted, {} need manual cleanup)",
                rollback.deleted,
                rollback.attempted,
                rollback.failures.len() + rollback.manual_cleanup.len()
            ),
            _ => format!(
                "aborted during verification at {}",
                self.verification.halted_at.as_deref().unwrap_or("<none>")
            ),
        }
    }
}
