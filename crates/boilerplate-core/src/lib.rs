pub mod error;
pub mod readiness;
pub mod store;
pub mod test_support;

pub use error::CoreError;
pub use readiness::{
    run as run_bootstrap, BootstrapPolicy, BootstrapReport, ConnectRetryPolicy, GateOutcome,
    ReadinessError, ReconcileOutcome,
};
pub use store::{
    now_unix_ms, rfc3339_from_unix_ms, AppliedMigration, DatabaseInfo, NewUser, SqliteDatabase,
    SqliteSettings, StorageBackend, UserRecord, UserRepository, LATEST_SCHEMA_VERSION,
};
