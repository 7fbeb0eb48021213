pub mod auth_token;
pub mod candidate;
pub mod circuit_state;
pub mod payload;
pub mod report;
pub mod reservation;

pub use auth_token::AuthToken;
pub use candidate::{FieldValidationError, LegacyReservation, ReservationCandidate};
pub use circuit_state::{CircuitMetrics, CircuitState, CircuitStatus};
pub use payload::{ReservationPayload, Schedule, TimeWindow, hhmm};
pub use report::{
    CreationRecord, CreationReport, IssueKind, MigrationIssue, RollbackFailure, RollbackReport,
    RunReport, RunState, VerificationRecord, VerificationReport,
};
pub use reservation::{
    CreatedReservation, ExistingReservation, HealthStatus, ListEnvelope, Room, TokenResponse,
};
