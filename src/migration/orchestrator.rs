use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::client::ReservationApi;
use crate::legacy::{LegacyError, LegacyQuery, LegacyStore};
use crate::mapping::PayloadMapper;
use crate::migration::MigrationConfig;
use crate::rooms::RoomResolver;
use crate::types::{LegacyReservation, ReservationPayload, RunReport, RunState, VerificationReport};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Legacy(#[from] LegacyError),
}

/// One reservation to create: a requisition group or a lone candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUnit {
    pub source_ids: Vec<String>,
    pub payload: ReservationPayload,
}

/// Two-phase migration. Verification checks every candidate without
/// mutating the target and stops at the first invalid one; creation runs
/// only after a clean verification and undoes the whole run on its first
/// failure.
pub struct MigrationOrchestrator<A: ?Sized> {
    pub(super) api: Arc<A>,
    pub(super) resolver: Arc<RoomResolver<A>>,
    pub(super) mapper: PayloadMapper<A>,
    pub(super) config: MigrationConfig,
}

impl<A: ReservationApi + ?Sized + 'static> MigrationOrchestrator<A> {
    pub fn new(api: Arc<A>, config: MigrationConfig) -> Self {
        let resolver = Arc::new(RoomResolver::new(api.clone()));
        Self::with_resolver(api, resolver, config)
    }

    pub fn with_resolver(
        api: Arc<A>,
        resolver: Arc<RoomResolver<A>>,
        config: MigrationConfig,
    ) -> Self {
        let mapper = PayloadMapper::new(resolver.clone(), config.mapping_options());
        Self {
            api,
            resolver,
            mapper,
            config,
        }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<RoomResolver<A>> {
        &self.resolver
    }

    pub async fn run(
        &self,
        store: &dyn LegacyStore,
        query: &LegacyQuery,
    ) -> Result<RunReport, MigrationError> {
        let rows = store.fetch_reservations(query).await?;
        tracing::info!(rows = rows.len(), "loaded legacy reservations");
        Ok(self.run_records(rows).await)
    }

    pub async fn run_records(&self, rows: Vec<LegacyReservation>) -> RunReport {
        let mut report = RunReport {
            run_id: Uuid::new_v4(),
            dry_run: self.config.dry_run,
            state: RunState::Validating,
            started_at: Utc::now(),
            finished_at: None,
            verification: VerificationReport::default(),
            creation: None,
            rollback: None,
        };
        let run_id = report.run_id;
        tracing::info!(%run_id, candidates = rows.len(), dry_run = report.dry_run, "verification started");

        let (verification, units) = self.verify(rows).await;
        report.verification = verification;

        if !report.verification.is_clean() {
            report.state = RunState::Aborted;
            tracing::warn!(
                %run_id,
                halted_at = report.verification.halted_at.as_deref().unwrap_or_default(),
                passed = report.verification.passed,
                "verification failed, nothing was created"
            );
            return finish(report);
        }

        report.state = RunState::Creating;
        tracing::info!(%run_id, units = units.len(), "creation started");
        let outcome = self.create(&units).await;
        let failed = outcome.failed;
        report.creation = Some(outcome.report);

        if failed {
            report.state = RunState::RollingBack;
            tracing::warn!(%run_id, created = outcome.created.len(), "creation failed, rolling back run");
            report.rollback = Some(self.rollback(&outcome.created, outcome.manual_cleanup).await);
            report.state = RunState::Aborted;
        } else {
            report.state = RunState::Completed;
        }

        finish(report)
    }
}

fn finish(mut report: RunReport) -> RunReport {
    report.finished_at = Some(Utc::now());
    tracing::info!(
        run_id = %report.run_id,
        state = ?report.state,
        exit_code = report.exit_code(),
        "{}",
        report.summary()
    );
    report
}
