mod config;
mod conflict;
mod create;
mod orchestrator;
mod verify;

pub use config::MigrationConfig;
pub use conflict::{PlannedWindows, ReservationSnapshot, find_overlap};
pub use create::CreatedRef;
pub use orchestrator::{MigrationError, MigrationOrchestrator, PlannedUnit};
pub use verify::check_payload;
