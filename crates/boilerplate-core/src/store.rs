//! Storage boundary: the primitives the readiness subsystem and the HTTP
//! surface are allowed to use, and the SQLite implementation behind them.

mod codec;
mod migrations;
mod sqlite_impl;
mod types;

pub use migrations::{Migration, LATEST_SCHEMA_VERSION, MIGRATIONS, MIGRATION_HISTORY_TABLE};
pub use sqlite_impl::{SqliteDatabase, SqliteSettings};
pub use types::{
    now_unix_ms, rfc3339_from_unix_ms, AppliedMigration, DatabaseInfo, NewUser, UserRecord,
    EMAIL_MAX_LEN, USERNAME_MAX_LEN,
};

use crate::error::CoreError;

/// Primitives consumed from the storage engine during startup.
///
/// Every call opens its own connection; implementations hold no connection
/// state between calls.
pub trait StorageBackend {
    /// Open a connection and run a trivial statement under a short command timeout.
    fn probe(&self) -> Result<(), CoreError>;

    /// Catalog lookup for a single relation, by exact name.
    fn relation_exists(&self, name: &str) -> Result<bool, CoreError>;

    /// Drop the migration history relation. Fails when it is absent.
    fn drop_migration_history(&self) -> Result<(), CoreError>;

    /// Apply every migration not yet recorded in the history relation.
    /// Reapplying an already-applied set is a no-op.
    fn apply_migrations(&self) -> Result<Vec<AppliedMigration>, CoreError>;

    fn database_info(&self) -> Result<DatabaseInfo, CoreError>;
}

pub trait UserRepository {
    fn count_users(&self) -> Result<u64, CoreError>;
    fn create_user(&self, user: &NewUser) -> Result<UserRecord, CoreError>;
    fn find_user_by_id(&self, id: i64) -> Result<Option<UserRecord>, CoreError>;
    fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>, CoreError>;
    fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, CoreError>;
    /// Newest first.
    fn list_users(&self) -> Result<Vec<UserRecord>, CoreError>;
    /// Users whose `created_at` is at or after `cutoff_unix_ms`, newest first.
    fn list_users_created_since(&self, cutoff_unix_ms: i64) -> Result<Vec<UserRecord>, CoreError>;
    fn username_exists(&self, username: &str) -> Result<bool, CoreError>;
    fn email_exists(&self, email: &str) -> Result<bool, CoreError>;
}
