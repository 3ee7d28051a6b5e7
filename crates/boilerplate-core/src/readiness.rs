//! Startup database readiness.
//!
//! Runs once before the server accepts traffic: wait for the database, make
//! sure the schema is there (repairing a stale migration history if not),
//! then prove the store can serve reads and writes. Nothing here stops the
//! process; every stage result lands in a [`BootstrapReport`].

mod error;
mod functional;
mod gate;
mod reconcile;
mod schema;
mod smoke;

pub use error::ReadinessError;
pub use functional::{functional_check, FunctionalCheckSummary, TEST_EMAIL, TEST_USERNAME};
pub use gate::{
    await_ready, ConnectRetryPolicy, GateOutcome, RetryState, DEFAULT_CONNECT_RETRY_DELAY,
    DEFAULT_MAX_CONNECT_ATTEMPTS,
};
pub use reconcile::{reconcile, HistoryReset, ReconcileOutcome, ReconcileReport};
pub use schema::{verify, ExpectedSchema, SchemaStatus, EXPECTED_RELATIONS};
pub use smoke::{smoke_test, SmokeReport};

use crate::store::{now_unix_ms, StorageBackend, UserRepository};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapPolicy {
    pub connect: ConnectRetryPolicy,
    pub functional_check: bool,
}

impl Default for BootstrapPolicy {
    fn default() -> Self {
        Self {
            connect: ConnectRetryPolicy::default(),
            functional_check: true,
        }
    }
}

/// Per-stage results of one bootstrap run. A `None` stage never ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub connectivity: GateOutcome,
    pub reconciliation: Option<Result<ReconcileReport, ReadinessError>>,
    pub smoke: Option<Result<SmokeReport, ReadinessError>>,
    pub functional: Option<Result<FunctionalCheckSummary, ReadinessError>>,
}

impl BootstrapReport {
    /// Every stage failure and reconciliation warning, in stage order.
    pub fn failures(&self) -> Vec<ReadinessError> {
        let mut failures = Vec::new();
        if let GateOutcome::TimedOut {
            attempts,
            last_error,
            ..
        } = &self.connectivity
        {
            failures.push(ReadinessError::ConnectionTimeout {
                attempts: *attempts,
                last_error: last_error.clone(),
            });
        }
        match &self.reconciliation {
            Some(Ok(report)) => {
                failures.extend(report.migration_errors.iter().cloned());
                failures.extend(report.failure());
            }
            Some(Err(error)) => failures.push(error.clone()),
            None => {}
        }
        if let Some(Err(error)) = &self.smoke {
            failures.push(error.clone());
        }
        if let Some(Err(error)) = &self.functional {
            failures.push(error.clone());
        }
        failures
    }

    /// Reachable with a complete schema. Smoke and functional results do not
    /// count against this.
    pub fn database_ready(&self) -> bool {
        self.connectivity.is_ready()
            && matches!(
                &self.reconciliation,
                Some(Ok(report)) if !report.is_degraded()
            )
    }

    pub fn is_degraded(&self) -> bool {
        !self.failures().is_empty()
    }
}

/// Runs every readiness stage against `storage`. Always returns; a gate
/// timeout skips the remaining stages.
pub async fn run<S>(storage: &S, policy: &BootstrapPolicy) -> BootstrapReport
where
    S: StorageBackend + UserRepository + ?Sized,
{
    let connectivity = await_ready(storage, &policy.connect).await;
    if !connectivity.is_ready() {
        tracing::error!(
            attempts = connectivity.attempts(),
            "database unavailable; skipping schema checks and starting degraded"
        );
        return BootstrapReport {
            connectivity,
            reconciliation: None,
            smoke: None,
            functional: None,
        };
    }

    let reconciliation = reconcile(storage, &ExpectedSchema::application())
        .map_err(ReadinessError::from)
        .inspect_err(|error| {
            tracing::error!(error = %error, "schema reconciliation failed; continuing");
        });

    let smoke = smoke_test(storage).inspect_err(|error| {
        tracing::error!(error = %error, "database smoke test failed; continuing");
    });

    let functional = if policy.functional_check {
        Some(
            functional_check(storage, now_unix_ms()).inspect_err(|error| {
                tracing::error!(error = %error, "database functional check failed; continuing");
            }),
        )
    } else {
        None
    };

    BootstrapReport {
        connectivity,
        reconciliation: Some(reconciliation),
        smoke: Some(smoke),
        functional,
    }
}
