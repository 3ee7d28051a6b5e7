use rusqlite::OptionalExtension;

use crate::readiness::{reconcile, verify, ExpectedSchema, HistoryReset, ReconcileOutcome};
use crate::store::MIGRATION_HISTORY_TABLE;
use crate::test_support::TestDbPath;
use crate::*;

fn unique_db(tag: &str) -> TestDbPath {
    TestDbPath::new(&format!("core-tests-{tag}"))
}

fn object_exists(db: &TestDbPath, kind: &str, name: &str) -> bool {
    let conn = rusqlite::Connection::open(db.path()).expect("open sqlite for inspection");
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2",
        rusqlite::params![kind, name],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .expect("query object existence")
    .is_some()
}

fn migration_count(db: &TestDbPath) -> i64 {
    let conn = rusqlite::Connection::open(db.path()).expect("open sqlite for inspection");
    conn.query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
        row.get(0)
    })
    .expect("count migrations")
}

#[test]
fn applying_migrations_creates_schema_and_history() {
    let db = unique_db("init");
    let database = SqliteDatabase::open(db.path());

    let applied = database.apply_migrations().expect("apply migrations");

    assert_eq!(
        applied.iter().map(|migration| migration.version).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(
        database.schema_version().expect("schema version"),
        LATEST_SCHEMA_VERSION
    );
    assert!(object_exists(&db, "table", "users"));
    assert!(object_exists(&db, "table", MIGRATION_HISTORY_TABLE));
    for index in ["ix_users_username", "ix_users_email", "ix_users_created_at"] {
        assert!(object_exists(&db, "index", index), "missing index {index}");
    }
    assert_eq!(migration_count(&db), 2);
}

#[test]
fn reapplying_migrations_is_a_noop() {
    let db = unique_db("idempotent");
    let database = SqliteDatabase::open(db.path());

    database.apply_migrations().expect("first apply");
    let second = database.apply_migrations().expect("second apply");

    assert!(second.is_empty());
    assert_eq!(migration_count(&db), 2);
}

#[test]
fn newer_recorded_schema_version_is_rejected() {
    let db = unique_db("future-version");
    let database = SqliteDatabase::open(db.path());
    database.apply_migrations().expect("apply migrations");

    let conn = rusqlite::Connection::open(db.path()).expect("open sqlite");
    conn.execute(
        "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, 'from_the_future', '2026-01-01T00:00:00Z')",
        rusqlite::params![LATEST_SCHEMA_VERSION + 1],
    )
    .expect("insert future migration");
    drop(conn);

    let error = database
        .apply_migrations()
        .expect_err("future schema should be rejected");
    assert_eq!(
        error,
        CoreError::UnsupportedSchemaVersion {
            supported: LATEST_SCHEMA_VERSION,
            found: LATEST_SCHEMA_VERSION + 1,
        }
    );
}

#[test]
fn dropping_absent_history_fails() {
    let db = unique_db("drop-absent");
    let database = SqliteDatabase::open(db.path());

    let error = database
        .drop_migration_history()
        .expect_err("drop should fail without history");
    assert!(matches!(error, CoreError::Persistence(_)));
}

#[test]
fn relation_lookup_matches_exact_table_names_only() {
    let db = unique_db("relation-lookup");
    let database = SqliteDatabase::open(db.path());
    database.apply_migrations().expect("apply migrations");

    assert!(database.relation_exists("users").expect("lookup"));
    assert!(!database.relation_exists("user").expect("lookup"));
    assert!(!database.relation_exists("ix_users_email").expect("lookup"));
    assert!(!database
        .relation_exists("users' OR '1'='1")
        .expect("lookup"));
}

#[test]
fn verifier_reports_missing_users_on_empty_database() {
    let db = unique_db("verify-empty");
    let database = SqliteDatabase::open(db.path());

    let status = verify(&database, &ExpectedSchema::application()).expect("verify");

    assert_eq!(status.missing(), vec!["users".to_owned()]);
}

#[test]
fn reconcile_on_fresh_database_repairs_with_tolerated_missing_history() {
    let db = unique_db("reconcile-fresh");
    let database = SqliteDatabase::open(db.path());

    let report = reconcile(&database, &ExpectedSchema::application()).expect("reconcile");

    assert_eq!(report.outcome, ReconcileOutcome::Repaired);
    assert!(matches!(report.history_reset, HistoryReset::Failed(_)));
    assert_eq!(report.applied, vec![1, 2]);
    assert!(report.migration_errors.is_empty());
}

#[test]
fn reconcile_replays_history_when_users_table_was_dropped() {
    let db = unique_db("reconcile-partial");
    let database = SqliteDatabase::open(db.path());
    database.apply_migrations().expect("apply migrations");

    let conn = rusqlite::Connection::open(db.path()).expect("open sqlite");
    conn.execute_batch("DROP TABLE users;").expect("drop users");
    drop(conn);

    // History still claims every migration ran, so a plain apply would not help.
    assert!(database.apply_migrations().expect("apply").is_empty());
    assert!(!database.relation_exists("users").expect("lookup"));

    let report = reconcile(&database, &ExpectedSchema::application()).expect("reconcile");

    assert_eq!(report.outcome, ReconcileOutcome::Repaired);
    assert_eq!(report.history_reset, HistoryReset::Cleared);
    assert!(object_exists(&db, "table", "users"));
    assert_eq!(migration_count(&db), 2);
}

#[test]
fn reconcile_twice_leaves_existing_rows_in_place() {
    let db = unique_db("reconcile-twice");
    let database = SqliteDatabase::open(db.path());
    database.apply_migrations().expect("apply migrations");
    database
        .create_user(&NewUser::new("alice", "alice@example.com").expect("valid user"))
        .expect("create user");

    let first = reconcile(&database, &ExpectedSchema::application()).expect("first");
    let second = reconcile(&database, &ExpectedSchema::application()).expect("second");

    assert_eq!(first.outcome, ReconcileOutcome::Verified);
    assert_eq!(second.outcome, ReconcileOutcome::Verified);
    assert_eq!(second.history_reset, HistoryReset::NotNeeded);
    assert_eq!(database.count_users().expect("count"), 1);
}
