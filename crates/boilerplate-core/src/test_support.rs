use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::CoreError;
use crate::store::{
    now_unix_ms, AppliedMigration, DatabaseInfo, NewUser, StorageBackend, UserRecord,
    UserRepository, MIGRATIONS,
};

static TEST_PATH_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn unique_test_db_path(tag: &str) -> PathBuf {
    let safe_tag: String = tag
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '-'
            }
        })
        .collect();
    let now_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let counter = TEST_PATH_COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "boilerplate-{safe_tag}-{}-{now_nanos}-{counter}.db",
        std::process::id(),
    ))
}

/// Temp database path; removes the file and its WAL sidecars on drop.
pub struct TestDbPath {
    path: PathBuf,
}

impl TestDbPath {
    pub fn new(tag: &str) -> Self {
        Self {
            path: unique_test_db_path(tag),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TestDbPath {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut candidate = self.path.clone().into_os_string();
            candidate.push(suffix);
            let candidate = PathBuf::from(candidate);
            if let Err(err) = std::fs::remove_file(&candidate) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    eprintln!(
                        "warning: failed to remove temporary test database {}: {err}",
                        candidate.display()
                    );
                }
            }
        }
    }
}

#[derive(Debug)]
struct ScriptedState {
    probe_failures_remaining: Option<u32>,
    probe_calls: u32,
    relations: BTreeSet<String>,
    history: BTreeSet<u32>,
    migration_relations: Vec<String>,
    drop_error: Option<String>,
    history_drops: u32,
    apply_failures_remaining: u32,
    apply_calls: u32,
    relation_queries: u32,
    info_error: Option<String>,
    users: Vec<UserRecord>,
    user_error: Option<String>,
}

/// In-memory storage double with scripted failures.
///
/// Applying migrations creates `migration_relations` for every version not yet
/// present in the simulated history, mirroring an engine whose history can
/// disagree with the catalog.
#[derive(Debug)]
pub struct ScriptedStorage {
    state: Mutex<ScriptedState>,
}

impl Default for ScriptedStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedStorage {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScriptedState {
                probe_failures_remaining: Some(0),
                probe_calls: 0,
                relations: BTreeSet::new(),
                history: BTreeSet::new(),
                migration_relations: vec!["users".to_owned()],
                drop_error: None,
                history_drops: 0,
                apply_failures_remaining: 0,
                apply_calls: 0,
                relation_queries: 0,
                info_error: None,
                users: Vec::new(),
                user_error: None,
            }),
        }
    }

    /// Schema already migrated: relations exist and history is complete.
    pub fn migrated() -> Self {
        let storage = Self::new().with_relations(&["users"]);
        storage.lock().history = MIGRATIONS.iter().map(|migration| migration.version).collect();
        storage
    }

    pub fn with_relations(self, relations: &[&str]) -> Self {
        self.lock()
            .relations
            .extend(relations.iter().map(|name| (*name).to_owned()));
        self
    }

    /// History claims every migration ran regardless of what the catalog holds.
    pub fn with_complete_history(self) -> Self {
        self.lock().history = MIGRATIONS.iter().map(|migration| migration.version).collect();
        self
    }

    pub fn with_migration_relations(self, relations: &[&str]) -> Self {
        self.lock().migration_relations = relations.iter().map(|name| (*name).to_owned()).collect();
        self
    }

    pub fn failing_probes(self, failures: u32) -> Self {
        self.lock().probe_failures_remaining = Some(failures);
        self
    }

    pub fn unreachable(self) -> Self {
        self.lock().probe_failures_remaining = None;
        self
    }

    pub fn failing_history_drop(self, message: &str) -> Self {
        self.lock().drop_error = Some(message.to_owned());
        self
    }

    pub fn failing_applies(self, failures: u32) -> Self {
        self.lock().apply_failures_remaining = failures;
        self
    }

    pub fn failing_database_info(self, message: &str) -> Self {
        self.lock().info_error = Some(message.to_owned());
        self
    }

    pub fn failing_users(self, message: &str) -> Self {
        self.lock().user_error = Some(message.to_owned());
        self
    }

    pub fn with_users(self, users: &[(&str, &str)]) -> Self {
        {
            let mut state = self.lock();
            for (username, email) in users {
                let id = i64::try_from(state.users.len()).unwrap_or(i64::MAX) + 1;
                state.users.push(UserRecord {
                    id,
                    username: (*username).to_owned(),
                    email: (*email).to_owned(),
                    created_at_unix_ms: now_unix_ms(),
                    updated_at_unix_ms: now_unix_ms(),
                });
            }
        }
        self
    }

    pub fn probe_calls(&self) -> u32 {
        self.lock().probe_calls
    }

    pub fn history_drops(&self) -> u32 {
        self.lock().history_drops
    }

    pub fn apply_calls(&self) -> u32 {
        self.lock().apply_calls
    }

    pub fn relation_queries(&self) -> u32 {
        self.lock().relation_queries
    }

    pub fn has_history(&self) -> bool {
        !self.lock().history.is_empty()
    }

    pub fn drop_relation(&self, name: &str) {
        self.lock().relations.remove(name);
    }

    pub fn users(&self) -> Vec<UserRecord> {
        self.lock().users.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptedState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn user_guard(&self) -> Result<MutexGuard<'_, ScriptedState>, CoreError> {
        let state = self.lock();
        match &state.user_error {
            Some(message) => Err(CoreError::Persistence(message.clone())),
            None => Ok(state),
        }
    }
}

impl StorageBackend for ScriptedStorage {
    fn probe(&self) -> Result<(), CoreError> {
        let mut state = self.lock();
        state.probe_calls += 1;
        match state.probe_failures_remaining {
            None => Err(CoreError::DependencyUnavailable(
                "connection refused".to_owned(),
            )),
            Some(0) => Ok(()),
            Some(remaining) => {
                state.probe_failures_remaining = Some(remaining - 1);
                Err(CoreError::DependencyUnavailable(
                    "database is starting up".to_owned(),
                ))
            }
        }
    }

    fn relation_exists(&self, name: &str) -> Result<bool, CoreError> {
        let mut state = self.lock();
        state.relation_queries += 1;
        Ok(state.relations.contains(name))
    }

    fn drop_migration_history(&self) -> Result<(), CoreError> {
        let mut state = self.lock();
        state.history_drops += 1;
        if let Some(message) = &state.drop_error {
            return Err(CoreError::Persistence(message.clone()));
        }
        if state.history.is_empty() {
            return Err(CoreError::Persistence(
                "no such table: schema_migrations".to_owned(),
            ));
        }
        state.history.clear();
        Ok(())
    }

    fn apply_migrations(&self) -> Result<Vec<AppliedMigration>, CoreError> {
        let mut state = self.lock();
        state.apply_calls += 1;
        if state.apply_failures_remaining > 0 {
            state.apply_failures_remaining -= 1;
            return Err(CoreError::Persistence("database is locked".to_owned()));
        }

        let pending: Vec<AppliedMigration> = MIGRATIONS
            .iter()
            .filter(|migration| !state.history.contains(&migration.version))
            .map(|migration| AppliedMigration {
                version: migration.version,
                name: migration.name.to_owned(),
            })
            .collect();
        if !pending.is_empty() {
            let created = state.migration_relations.clone();
            state.relations.extend(created);
            state
                .history
                .extend(pending.iter().map(|migration| migration.version));
        }
        Ok(pending)
    }

    fn database_info(&self) -> Result<DatabaseInfo, CoreError> {
        let state = self.lock();
        match &state.info_error {
            Some(message) => Err(CoreError::DependencyUnavailable(message.clone())),
            None => Ok(DatabaseInfo {
                database: "main".to_owned(),
                file: "scripted".to_owned(),
                version: "scripted-1".to_owned(),
            }),
        }
    }
}

impl UserRepository for ScriptedStorage {
    fn count_users(&self) -> Result<u64, CoreError> {
        let state = self.user_guard()?;
        Ok(state.users.len() as u64)
    }

    fn create_user(&self, user: &NewUser) -> Result<UserRecord, CoreError> {
        let mut state = self.user_guard()?;
        if state
            .users
            .iter()
            .any(|existing| existing.username == user.username())
        {
            return Err(CoreError::Conflict("Username already exists".to_owned()));
        }
        let now = now_unix_ms();
        let record = UserRecord {
            id: i64::try_from(state.users.len()).unwrap_or(i64::MAX) + 1,
            username: user.username().to_owned(),
            email: user.email().to_owned(),
            created_at_unix_ms: now,
            updated_at_unix_ms: now,
        };
        state.users.push(record.clone());
        Ok(record)
    }

    fn find_user_by_id(&self, id: i64) -> Result<Option<UserRecord>, CoreError> {
        let state = self.user_guard()?;
        Ok(state.users.iter().find(|user| user.id == id).cloned())
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>, CoreError> {
        let state = self.user_guard()?;
        Ok(state
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, CoreError> {
        let state = self.user_guard()?;
        Ok(state.users.iter().find(|user| user.email == email).cloned())
    }

    fn list_users(&self) -> Result<Vec<UserRecord>, CoreError> {
        let state = self.user_guard()?;
        Ok(state.users.iter().rev().cloned().collect())
    }

    fn list_users_created_since(&self, cutoff_unix_ms: i64) -> Result<Vec<UserRecord>, CoreError> {
        let state = self.user_guard()?;
        Ok(state
            .users
            .iter()
            .rev()
            .filter(|user| user.created_at_unix_ms >= cutoff_unix_ms)
            .cloned()
            .collect())
    }

    fn username_exists(&self, username: &str) -> Result<bool, CoreError> {
        let state = self.user_guard()?;
        Ok(state.users.iter().any(|user| user.username == username))
    }

    fn email_exists(&self, email: &str) -> Result<bool, CoreError> {
        let state = self.user_guard()?;
        Ok(state.users.iter().any(|user| user.email == email))
    }
}
