use super::error::ReadinessError;
use super::schema::{verify, ExpectedSchema, SchemaStatus};
use crate::error::CoreError;
use crate::store::StorageBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Verified,
    Repaired,
    Degraded { missing: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryReset {
    NotNeeded,
    Cleared,
    /// Drop failed (usually because no history existed); reapplication still ran.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub outcome: ReconcileOutcome,
    pub initial_status: SchemaStatus,
    pub final_status: SchemaStatus,
    pub history_reset: HistoryReset,
    pub applied: Vec<u32>,
    pub migration_errors: Vec<ReadinessError>,
}

impl ReconcileReport {
    pub fn failure(&self) -> Option<ReadinessError> {
        match &self.outcome {
            ReconcileOutcome::Degraded { missing } => Some(ReadinessError::RepairFailed {
                missing: missing.clone(),
            }),
            ReconcileOutcome::Verified | ReconcileOutcome::Repaired => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.outcome, ReconcileOutcome::Degraded { .. })
    }
}

/// Brings the schema in line with `expected`.
///
/// A complete schema only gets pending migrations applied. An incomplete one
/// has its migration history dropped and the full set replayed, then is
/// verified again. Only catalog query failures are returned as `Err`; failed
/// drops and applies are recorded on the report.
pub fn reconcile<S>(storage: &S, expected: &ExpectedSchema) -> Result<ReconcileReport, CoreError>
where
    S: StorageBackend + ?Sized,
{
    let initial_status = verify(storage, expected)?;
    let mut migration_errors = Vec::new();

    if initial_status.is_complete() {
        let applied = apply_with_fallback(storage, &mut migration_errors);
        tracing::info!(
            applied = applied.len(),
            warnings = migration_errors.len(),
            "database schema verified"
        );
        return Ok(ReconcileReport {
            outcome: ReconcileOutcome::Verified,
            final_status: initial_status.clone(),
            initial_status,
            history_reset: HistoryReset::NotNeeded,
            applied,
            migration_errors,
        });
    }

    let incomplete = ReadinessError::SchemaIncomplete {
        missing: initial_status.missing(),
    };
    tracing::warn!(error = %incomplete, "resetting migration history");

    let history_reset = match storage.drop_migration_history() {
        Ok(()) => HistoryReset::Cleared,
        Err(error) => {
            tracing::warn!(error = %error, "migration history reset failed; continuing");
            HistoryReset::Failed(error.to_string())
        }
    };

    let applied = apply_with_fallback(storage, &mut migration_errors);
    let final_status = verify(storage, expected)?;

    let outcome = if final_status.is_complete() {
        tracing::info!(
            applied = applied.len(),
            "database schema repaired after migration history reset"
        );
        ReconcileOutcome::Repaired
    } else {
        let missing = final_status.missing();
        tracing::error!(
            missing = %missing.join(", "),
            "database schema still incomplete after repair; continuing degraded"
        );
        ReconcileOutcome::Degraded { missing }
    };

    Ok(ReconcileReport {
        outcome,
        initial_status,
        final_status,
        history_reset,
        applied,
        migration_errors,
    })
}

// One unconditional retry; both failures land in `errors`.
fn apply_with_fallback<S>(storage: &S, errors: &mut Vec<ReadinessError>) -> Vec<u32>
where
    S: StorageBackend + ?Sized,
{
    match storage.apply_migrations() {
        Ok(applied) => return applied.iter().map(|migration| migration.version).collect(),
        Err(error) => {
            tracing::warn!(error = %error, "migration application failed; retrying once");
            errors.push(ReadinessError::MigrationApply(error.to_string()));
        }
    }

    match storage.apply_migrations() {
        Ok(applied) => applied.iter().map(|migration| migration.version).collect(),
        Err(error) => {
            tracing::error!(error = %error, "migration retry failed");
            errors.push(ReadinessError::MigrationApply(error.to_string()));
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedStorage;

    fn users() -> ExpectedSchema {
        ExpectedSchema::application()
    }

    #[test]
    fn present_schema_is_verified_without_touching_history() {
        let storage = ScriptedStorage::migrated();

        let report = reconcile(&storage, &users()).expect("reconcile");

        assert_eq!(report.outcome, ReconcileOutcome::Verified);
        assert_eq!(report.history_reset, HistoryReset::NotNeeded);
        assert!(report.applied.is_empty());
        assert!(report.failure().is_none());
        assert_eq!(storage.history_drops(), 0);
        assert!(storage.has_history());
    }

    #[test]
    fn reconciling_twice_is_verified_both_times() {
        let storage = ScriptedStorage::migrated();

        let first = reconcile(&storage, &users()).expect("first");
        let second = reconcile(&storage, &users()).expect("second");

        assert_eq!(first.outcome, ReconcileOutcome::Verified);
        assert_eq!(second.outcome, ReconcileOutcome::Verified);
        assert_eq!(storage.history_drops(), 0);
        assert!(storage.relation_exists("users").expect("lookup"));
    }

    #[test]
    fn verified_path_applies_pending_migrations() {
        let storage = ScriptedStorage::new().with_relations(&["users"]);

        let report = reconcile(&storage, &users()).expect("reconcile");

        assert_eq!(report.outcome, ReconcileOutcome::Verified);
        assert_eq!(report.applied, vec![1, 2]);
        assert_eq!(storage.history_drops(), 0);
    }

    #[test]
    fn empty_storage_tolerates_absent_history_and_repairs() {
        let storage = ScriptedStorage::new();

        let report = reconcile(&storage, &users()).expect("reconcile");

        assert_eq!(report.outcome, ReconcileOutcome::Repaired);
        assert!(matches!(report.history_reset, HistoryReset::Failed(_)));
        assert_eq!(report.initial_status.missing(), vec!["users".to_owned()]);
        assert!(report.final_status.is_complete());
        assert_eq!(storage.history_drops(), 1);
    }

    #[test]
    fn stale_history_is_cleared_so_the_full_set_replays() {
        let storage = ScriptedStorage::new().with_complete_history();

        let report = reconcile(&storage, &users()).expect("reconcile");

        assert_eq!(report.history_reset, HistoryReset::Cleared);
        assert_eq!(report.applied, vec![1, 2]);
        assert_eq!(report.outcome, ReconcileOutcome::Repaired);
    }

    #[test]
    fn migrations_that_create_nothing_leave_schema_degraded() {
        let storage = ScriptedStorage::new().with_migration_relations(&[]);

        let report = reconcile(&storage, &users()).expect("reconcile");

        assert_eq!(
            report.outcome,
            ReconcileOutcome::Degraded {
                missing: vec!["users".to_owned()]
            }
        );
        assert_eq!(
            report.failure(),
            Some(ReadinessError::RepairFailed {
                missing: vec!["users".to_owned()]
            })
        );
    }

    #[test]
    fn only_absent_relations_are_listed_when_degraded() {
        let storage = ScriptedStorage::new()
            .with_relations(&["users"])
            .with_migration_relations(&["users"]);
        let expected = ExpectedSchema::new(["users", "roles"]);

        let report = reconcile(&storage, &expected).expect("reconcile");

        assert_eq!(
            report.outcome,
            ReconcileOutcome::Degraded {
                missing: vec!["roles".to_owned()]
            }
        );
    }

    #[test]
    fn failed_history_drop_still_reapplies() {
        let storage = ScriptedStorage::new()
            .with_complete_history()
            .failing_history_drop("permission denied");

        let report = reconcile(&storage, &users()).expect("reconcile");

        assert_eq!(
            report.history_reset,
            HistoryReset::Failed("persistence error: permission denied".to_owned())
        );
        assert_eq!(storage.apply_calls(), 1);
        // History survived, so nothing replayed and the relation is still gone.
        assert!(report.is_degraded());
    }

    #[test]
    fn failed_reapply_is_retried_once() {
        let storage = ScriptedStorage::new().failing_applies(1);

        let report = reconcile(&storage, &users()).expect("reconcile");

        assert_eq!(report.outcome, ReconcileOutcome::Repaired);
        assert_eq!(report.migration_errors.len(), 1);
        assert!(matches!(
            report.migration_errors[0],
            ReadinessError::MigrationApply(_)
        ));
        assert_eq!(storage.apply_calls(), 2);
    }

    #[test]
    fn failed_retry_is_recorded_and_degrades() {
        let storage = ScriptedStorage::new().failing_applies(2);

        let report = reconcile(&storage, &users()).expect("reconcile");

        assert!(report.is_degraded());
        assert_eq!(report.migration_errors.len(), 2);
        assert_eq!(storage.apply_calls(), 2);
    }

    #[test]
    fn verified_path_surfaces_apply_failure_as_warning() {
        let storage = ScriptedStorage::migrated().failing_applies(2);

        let report = reconcile(&storage, &users()).expect("reconcile");

        assert_eq!(report.outcome, ReconcileOutcome::Verified);
        assert_eq!(report.migration_errors.len(), 2);
        assert!(report.failure().is_none());
    }
}
