use std::process::ExitCode;

use bridge::{client::ReservationApi, config::AppConfig, state::AppState, telemetry};

const STARTUP_FAILURE: u8 = 4;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            telemetry::init(false);
            tracing::error!(error = %err, "invalid configuration");
            return ExitCode::from(STARTUP_FAILURE);
        }
    };
    telemetry::init(config.log_json);

    let state = match AppState::connect(config).await {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(error = %err, "startup failed");
            return ExitCode::from(STARTUP_FAILURE);
        }
    };

    if state.config.reset_circuit
        && let Err(err) = state.client.breaker().force_reset().await
    {
        tracing::error!(error = %err, "failed to reset circuit");
        return ExitCode::from(STARTUP_FAILURE);
    }

    match state.client.health().await {
        Ok(health) if health.is_healthy() => {
            tracing::info!(status = %health.status, "target service healthy");
        }
        Ok(health) => {
            tracing::error!(status = %health.status, "target service reports unhealthy");
            return ExitCode::from(STARTUP_FAILURE);
        }
        Err(err) => {
            tracing::error!(error = %err, kind = err.kind(), "target service unreachable");
            return ExitCode::from(STARTUP_FAILURE);
        }
    }

    let orchestrator = state.orchestrator();
    let query = state.config.migration.legacy_query();
    let report = match orchestrator.run(&state.legacy, &query).await {
        Ok(report) => report,
        Err(err) => {
            tracing::error!(error = %err, "failed to load legacy reservations");
            return ExitCode::from(STARTUP_FAILURE);
        }
    };

    match serde_json::to_string(&report) {
        Ok(json) => tracing::info!(report = %json, "run report"),
        Err(err) => tracing::warn!(error = %err, "failed to serialize run report"),
    }
    match state.client.metrics().await {
        Ok(metrics) => tracing::info!(
            circuit = metrics.circuit.state.as_str(),
            failures = metrics.circuit.failure_count,
            throttled = metrics.rate_limit.throttled,
            throttle_wait_ms = metrics.rate_limit.total_wait_ms as u64,
            "client metrics"
        ),
        Err(err) => tracing::warn!(error = %err, "failed to read client metrics"),
    }

    ExitCode::from(report.exit_code())
}
