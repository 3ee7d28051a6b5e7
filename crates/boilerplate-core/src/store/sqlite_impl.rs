use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use super::codec::{count_to_u64, map_insert_user_error, map_user_row, persistence, USER_COLUMNS};
use super::migrations::{
    CREATE_HISTORY_TABLE_SQL, LATEST_SCHEMA_VERSION, MIGRATIONS, MIGRATION_HISTORY_TABLE,
};
use super::types::{now_unix_ms, AppliedMigration, DatabaseInfo, NewUser, UserRecord};
use super::{StorageBackend, UserRepository};
use crate::error::CoreError;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_SYNCHRONOUS: &str = "NORMAL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteSettings {
    pub path: PathBuf,
    pub busy_timeout: Duration,
    pub probe_timeout: Duration,
    pub wal_enabled: bool,
    pub synchronous: String,
}

impl SqliteSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            wal_enabled: true,
            synchronous: DEFAULT_SYNCHRONOUS.to_owned(),
        }
    }
}

/// File-backed SQLite handle. Opens a fresh connection per operation, so
/// `:memory:` paths are not supported.
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    settings: SqliteSettings,
}

impl SqliteDatabase {
    pub fn new(settings: SqliteSettings) -> Self {
        Self { settings }
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(SqliteSettings::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.settings.path
    }

    pub fn settings(&self) -> &SqliteSettings {
        &self.settings
    }

    pub fn schema_version(&self) -> Result<u32, CoreError> {
        let conn = self.connect()?;
        Self::current_schema_version(&conn)
    }

    fn connect(&self) -> Result<Connection, CoreError> {
        self.connect_with_timeout(self.settings.busy_timeout)
    }

    fn connect_with_timeout(&self, timeout: Duration) -> Result<Connection, CoreError> {
        let unavailable = |err: rusqlite::Error| {
            CoreError::DependencyUnavailable(format!(
                "database '{}' is not reachable: {err}",
                self.settings.path.display()
            ))
        };

        let conn = Connection::open(&self.settings.path).map_err(unavailable)?;
        conn.busy_timeout(timeout).map_err(unavailable)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(unavailable)?;
        if self.settings.wal_enabled {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })
            .map_err(unavailable)?;
        }
        conn.pragma_update(None, "synchronous", self.settings.synchronous.as_str())
            .map_err(unavailable)?;

        Ok(conn)
    }

    fn table_exists(conn: &Connection, name: &str) -> Result<bool, CoreError> {
        conn.query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 LIMIT 1",
            params![name],
            |_| Ok(()),
        )
        .optional()
        .map(|opt| opt.is_some())
        .map_err(persistence)
    }

    fn current_schema_version(conn: &Connection) -> Result<u32, CoreError> {
        if !Self::table_exists(conn, MIGRATION_HISTORY_TABLE)? {
            return Ok(0);
        }

        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(persistence)
    }

    fn recorded_versions(conn: &Connection) -> Result<BTreeSet<u32>, CoreError> {
        let mut stmt = conn
            .prepare("SELECT version FROM schema_migrations")
            .map_err(persistence)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, u32>(0))
            .map_err(persistence)?;

        rows.collect::<Result<BTreeSet<_>, _>>()
            .map_err(persistence)
    }

    fn query_users(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<UserRecord>, CoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(sql).map_err(persistence)?;
        let rows = stmt.query_map(params, map_user_row).map_err(persistence)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(persistence)
    }

    fn query_one_user(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Option<UserRecord>, CoreError> {
        let conn = self.connect()?;
        conn.query_row(sql, params, map_user_row)
            .optional()
            .map_err(persistence)
    }

    fn query_exists(&self, sql: &str, value: &str) -> Result<bool, CoreError> {
        let conn = self.connect()?;
        conn.query_row(sql, params![value], |row| row.get::<_, bool>(0))
            .map_err(persistence)
    }
}

impl StorageBackend for SqliteDatabase {
    fn probe(&self) -> Result<(), CoreError> {
        let conn = self.connect_with_timeout(self.settings.probe_timeout)?;
        let value: i64 = conn
            .query_row("SELECT 1", [], |row| row.get(0))
            .map_err(|err| CoreError::DependencyUnavailable(err.to_string()))?;
        if value != 1 {
            return Err(CoreError::DependencyUnavailable(format!(
                "connectivity probe returned unexpected value {value}"
            )));
        }
        Ok(())
    }

    fn relation_exists(&self, name: &str) -> Result<bool, CoreError> {
        let conn = self.connect()?;
        Self::table_exists(&conn, name)
    }

    fn drop_migration_history(&self) -> Result<(), CoreError> {
        let conn = self.connect()?;
        conn.execute_batch("DROP TABLE schema_migrations;")
            .map_err(persistence)
    }

    fn apply_migrations(&self) -> Result<Vec<AppliedMigration>, CoreError> {
        let mut conn = self.connect()?;
        conn.execute_batch(CREATE_HISTORY_TABLE_SQL)
            .map_err(persistence)?;

        let recorded = Self::recorded_versions(&conn)?;
        if let Some(&found) = recorded.last() {
            if found > LATEST_SCHEMA_VERSION {
                return Err(CoreError::UnsupportedSchemaVersion {
                    supported: LATEST_SCHEMA_VERSION,
                    found,
                });
            }
        }

        let mut applied = Vec::new();
        for migration in MIGRATIONS
            .iter()
            .filter(|migration| !recorded.contains(&migration.version))
        {
            let tx = conn.transaction().map_err(persistence)?;
            tx.execute_batch(migration.sql).map_err(|err| {
                CoreError::Persistence(format!(
                    "migration {} ({}) failed: {err}",
                    migration.version, migration.name
                ))
            })?;
            tx.execute(
                "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))",
                params![migration.version, migration.name],
            )
            .map_err(persistence)?;
            tx.commit().map_err(persistence)?;

            applied.push(AppliedMigration {
                version: migration.version,
                name: migration.name.to_owned(),
            });
        }

        Ok(applied)
    }

    fn database_info(&self) -> Result<DatabaseInfo, CoreError> {
        let conn = self.connect()?;
        conn.query_row(
            "
            SELECT
                COALESCE((SELECT name FROM pragma_database_list WHERE seq = 0), ''),
                COALESCE((SELECT file FROM pragma_database_list WHERE seq = 0), ''),
                sqlite_version()
            ",
            [],
            |row| {
                Ok(DatabaseInfo {
                    database: row.get(0)?,
                    file: row.get(1)?,
                    version: row.get(2)?,
                })
            },
        )
        .map_err(persistence)
    }
}

impl UserRepository for SqliteDatabase {
    fn count_users(&self) -> Result<u64, CoreError> {
        let conn = self.connect()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .map_err(persistence)?;
        count_to_u64(count)
    }

    fn create_user(&self, user: &NewUser) -> Result<UserRecord, CoreError> {
        let conn = self.connect()?;
        let now = now_unix_ms();
        conn.execute(
            "INSERT INTO users (username, email, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![user.username(), user.email(), now, now],
        )
        .map_err(map_insert_user_error)?;

        Ok(UserRecord {
            id: conn.last_insert_rowid(),
            username: user.username().to_owned(),
            email: user.email().to_owned(),
            created_at_unix_ms: now,
            updated_at_unix_ms: now,
        })
    }

    fn find_user_by_id(&self, id: i64) -> Result<Option<UserRecord>, CoreError> {
        self.query_one_user(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
        )
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>, CoreError> {
        self.query_one_user(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            params![username],
        )
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, CoreError> {
        self.query_one_user(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
        )
    }

    fn list_users(&self) -> Result<Vec<UserRecord>, CoreError> {
        self.query_users(
            &format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC"),
            [],
        )
    }

    fn list_users_created_since(&self, cutoff_unix_ms: i64) -> Result<Vec<UserRecord>, CoreError> {
        self.query_users(
            &format!(
                "SELECT {USER_COLUMNS} FROM users WHERE created_at >= ?1 ORDER BY created_at DESC, id DESC"
            ),
            params![cutoff_unix_ms],
        )
    }

    fn username_exists(&self, username: &str) -> Result<bool, CoreError> {
        self.query_exists(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
            username,
        )
    }

    fn email_exists(&self, email: &str) -> Result<bool, CoreError> {
        self.query_exists("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)", email)
    }
}
