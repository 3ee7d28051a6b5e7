pub const MIGRATION_HISTORY_TABLE: &str = "schema_migrations";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

// DDL stays re-runnable so a cleared history can be replayed over surviving objects.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        sql: "
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL CHECK (length(username) <= 100),
                email TEXT NOT NULL CHECK (length(email) <= 255),
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS ix_users_username ON users(username);
            CREATE UNIQUE INDEX IF NOT EXISTS ix_users_email ON users(email);
        ",
    },
    Migration {
        version: 2,
        name: "index_users_created_at",
        sql: "CREATE INDEX IF NOT EXISTS ix_users_created_at ON users(created_at);",
    },
];

pub const LATEST_SCHEMA_VERSION: u32 = 2;

pub(crate) const CREATE_HISTORY_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS schema_migrations (
        version INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        applied_at TEXT NOT NULL
    );
";
