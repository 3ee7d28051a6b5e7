//! Startup boundary: turns configuration into storage settings and a readiness
//! policy, then runs the readiness sequence and logs what it found.

use std::path::Path;

use boilerplate_config::BoilerplateConfig;
use boilerplate_core::readiness::{self, ReconcileOutcome};
use boilerplate_core::{
    BootstrapPolicy, BootstrapReport, ConnectRetryPolicy, SqliteDatabase, SqliteSettings,
};

use crate::error::{AppError, AppResult};

pub fn sqlite_settings(config: &BoilerplateConfig) -> SqliteSettings {
    let runtime = config.database_runtime();
    SqliteSettings {
        path: runtime.path,
        busy_timeout: runtime.busy_timeout,
        probe_timeout: runtime.probe_timeout,
        wal_enabled: runtime.wal_enabled,
        synchronous: runtime.synchronous,
    }
}

pub fn bootstrap_policy(config: &BoilerplateConfig) -> BootstrapPolicy {
    let runtime = config.bootstrap_runtime();
    BootstrapPolicy {
        connect: ConnectRetryPolicy::new(
            runtime.max_connect_attempts,
            runtime.connect_retry_delay,
        ),
        functional_check: runtime.functional_check,
    }
}

pub fn ensure_database_directory(database_path: &Path) -> AppResult<()> {
    if let Some(parent) = database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|error| {
                AppError::configuration(format!(
                    "failed to create database directory '{}': {error}",
                    parent.display()
                ))
            })?;
        }
    }
    Ok(())
}

/// Runs the readiness sequence. Never fails; problems are logged and kept on
/// the returned report.
pub async fn prepare_database(
    database: &SqliteDatabase,
    policy: &BootstrapPolicy,
) -> BootstrapReport {
    tracing::info!(
        path = %database.path().display(),
        max_attempts = policy.connect.max_attempts(),
        "checking database readiness"
    );
    let report = readiness::run(database, policy).await;
    log_report(&report);
    report
}

fn log_report(report: &BootstrapReport) {
    if let Some(Ok(reconciliation)) = &report.reconciliation {
        let outcome = match &reconciliation.outcome {
            ReconcileOutcome::Verified => "verified",
            ReconcileOutcome::Repaired => "repaired",
            ReconcileOutcome::Degraded { .. } => "degraded",
        };
        tracing::info!(
            outcome,
            applied = ?reconciliation.applied,
            "database schema reconciliation finished"
        );
    }
    if let Some(Ok(smoke)) = &report.smoke {
        tracing::info!(info = %smoke.describe(), "database details");
    }

    let failures = report.failures();
    if failures.is_empty() {
        tracing::info!(
            attempts = report.connectivity.attempts(),
            "database bootstrap complete"
        );
        return;
    }
    for failure in &failures {
        tracing::warn!(error = %failure, "database bootstrap issue");
    }
    tracing::warn!(
        issues = failures.len(),
        database_ready = report.database_ready(),
        "database bootstrap finished degraded; serving anyway"
    );
}
