use crate::client::ReservationApi;
use crate::migration::orchestrator::{MigrationOrchestrator, PlannedUnit};
use crate::types::{CreatedReservation, CreationRecord, CreationReport, RollbackFailure, RollbackReport};

/// Reservation created by this run, kept for rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRef {
    pub id: i64,
    pub recurrent: bool,
    pub source_ids: Vec<String>,
}

pub(super) struct CreationOutcome {
    pub report: CreationReport,
    pub created: Vec<CreatedRef>,
    pub manual_cleanup: Vec<String>,
    pub failed: bool,
}

impl<A: ReservationApi + ?Sized + 'static> MigrationOrchestrator<A> {
    /// Creates units batch by batch and stops at the first failure. Batches
    /// only mark progress; rollback covers everything created in the run.
    pub(super) async fn create(&self, units: &[PlannedUnit]) -> CreationOutcome {
        let batch_size = self.config.batch_size.max(1);
        let total_batches = units.len().div_ceil(batch_size);
        let mut report = CreationReport {
            requested: units.len(),
            ..CreationReport::default()
        };
        let mut created = Vec::new();
        let mut manual_cleanup = Vec::new();
        let mut failed = false;

        'batches: for (batch_index, batch) in units.chunks(batch_size).enumerate() {
            report.batches += 1;
            for unit in batch {
                let recurring = unit.payload.schedule.is_recurring();

                if self.config.dry_run {
                    report.created += 1;
                    report.records.push(CreationRecord {
                        source_ids: unit.source_ids.clone(),
                        created_id: None,
                        recurrent: recurring,
                        simulated: true,
                        error: None,
                    });
                    continue;
                }

                match self.api.create_reservation(&unit.payload).await {
                    Ok(CreatedReservation {
                        id: Some(id),
                        recurrent,
                        ..
                    }) => {
                        let recurrent = recurrent || recurring;
                        report.created += 1;
                        report.records.push(CreationRecord {
                            source_ids: unit.source_ids.clone(),
                            created_id: Some(id),
                            recurrent,
                            simulated: false,
                            error: None,
                        });
                        created.push(CreatedRef {
                            id,
                            recurrent,
                            source_ids: unit.source_ids.clone(),
                        });
                    }
                    Ok(CreatedReservation { id: None, .. }) => {
                        let message =
                            "target accepted the reservation without returning an id; manual cleanup required";
                        tracing::error!(source_ids = ?unit.source_ids, "{message}");
                        manual_cleanup.push(unit.source_ids.join(","));
                        report.records.push(CreationRecord {
                            source_ids: unit.source_ids.clone(),
                            created_id: None,
                            recurrent: recurring,
                            simulated: false,
                            error: Some(message.to_string()),
                        });
                        failed = true;
                        break 'batches;
                    }
                    Err(err) => {
                        tracing::error!(source_ids = ?unit.source_ids, error = %err, "reservation creation failed");
                        report.records.push(CreationRecord {
                            source_ids: unit.source_ids.clone(),
                            created_id: None,
                            recurrent: recurring,
                            simulated: false,
                            error: Some(err.to_string()),
                        });
                        failed = true;
                        break 'batches;
                    }
                }
            }

            tracing::info!(
                batch = batch_index + 1,
                total_batches,
                created = report.created,
                requested = report.requested,
                "batch complete"
            );
        }

        report.failed = report
            .records
            .iter()
            .filter(|record| record.error.is_some())
            .count();
        report.success_rate = if report.requested == 0 {
            1.0
        } else {
            report.created as f64 / report.requested as f64
        };

        CreationOutcome {
            report,
            created,
            manual_cleanup,
            failed,
        }
    }

    /// Best effort: each delete is tried once, failures are recorded and
    /// the rest still run.
    pub(super) async fn rollback(
        &self,
        created: &[CreatedRef],
        manual_cleanup: Vec<String>,
    ) -> RollbackReport {
        let mut report = RollbackReport {
            attempted: created.len(),
            manual_cleanup,
            ..RollbackReport::default()
        };

        for item in created.iter().rev() {
            match self.api.delete_reservation(item.id, item.recurrent).await {
                Ok(()) => {
                    report.deleted += 1;
                    tracing::info!(reservation_id = item.id, purge = item.recurrent, "rolled back reservation");
                }
                Err(err) => {
                    tracing::error!(
                        reservation_id = item.id,
                        source_ids = ?item.source_ids,
                        error = %err,
                        "rollback delete failed, manual cleanup required"
                    );
                    report.failures.push(RollbackFailure {
                        reservation_id: item.id,
                        message: err.to_string(),
                    });
                }
            }
        }

        report
    }
}
