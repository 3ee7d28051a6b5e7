use super::error::ReadinessError;
use crate::error::CoreError;
use crate::store::{NewUser, UserRecord, UserRepository};

pub const TEST_USERNAME: &str = "testuser";
pub const TEST_EMAIL: &str = "test@example.com";

const RECENT_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionalCheckSummary {
    pub initial_count: u64,
    /// Seeded user, present only when the table started empty.
    pub created: Option<UserRecord>,
    /// Whether the seeded user could be read back by username.
    pub retrieved: bool,
    pub existing: Vec<UserRecord>,
    pub recent_count: usize,
}

/// Exercises the user repository end to end: count, seed or list, then a
/// time-windowed query relative to `now_unix_ms`.
pub fn functional_check<R>(
    repo: &R,
    now_unix_ms: i64,
) -> Result<FunctionalCheckSummary, ReadinessError>
where
    R: UserRepository + ?Sized,
{
    let initial_count = repo.count_users().map_err(functional)?;
    tracing::info!(count = initial_count, "users in database");

    let mut created = None;
    let mut retrieved = false;
    let mut existing = Vec::new();

    if initial_count == 0 {
        let seed = NewUser::new(TEST_USERNAME, TEST_EMAIL).map_err(functional)?;
        let user = repo.create_user(&seed).map_err(functional)?;
        tracing::info!(user = %user, "created test user");

        match repo.find_user_by_username(TEST_USERNAME).map_err(functional)? {
            Some(found) => {
                tracing::info!(user = %found, "retrieved test user");
                retrieved = true;
            }
            None => {
                tracing::warn!(username = TEST_USERNAME, "test user not found after insert");
            }
        }
        created = Some(user);
    } else {
        existing = repo.list_users().map_err(functional)?;
        for user in &existing {
            tracing::debug!(user = %user, "existing user");
        }
    }

    let recent_count = repo
        .list_users_created_since(now_unix_ms.saturating_sub(RECENT_WINDOW_MS))
        .map_err(functional)?
        .len();
    tracing::info!(count = recent_count, "users created in the last 24 hours");

    Ok(FunctionalCheckSummary {
        initial_count,
        created,
        retrieved,
        existing,
        recent_count,
    })
}

fn functional(error: CoreError) -> ReadinessError {
    ReadinessError::FunctionalCheck(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::now_unix_ms;
    use crate::test_support::ScriptedStorage;

    #[test]
    fn empty_table_is_seeded_and_read_back() {
        let storage = ScriptedStorage::migrated();

        let summary = functional_check(&storage, now_unix_ms()).expect("functional check");

        assert_eq!(summary.initial_count, 0);
        let created = summary.created.expect("seeded user");
        assert_eq!(created.username, TEST_USERNAME);
        assert_eq!(created.email, TEST_EMAIL);
        assert!(summary.retrieved);
        assert!(summary.existing.is_empty());
        assert_eq!(summary.recent_count, 1);
    }

    #[test]
    fn populated_table_is_listed_not_seeded() {
        let storage = ScriptedStorage::migrated()
            .with_users(&[("alice", "alice@example.com"), ("bob", "bob@example.com")]);

        let summary = functional_check(&storage, now_unix_ms()).expect("functional check");

        assert_eq!(summary.initial_count, 2);
        assert!(summary.created.is_none());
        assert_eq!(summary.existing.len(), 2);
        assert_eq!(storage.users().len(), 2);
    }

    #[test]
    fn recent_window_excludes_users_older_than_a_day() {
        let storage = ScriptedStorage::migrated().with_users(&[("alice", "alice@example.com")]);
        let two_days_later = now_unix_ms() + 2 * RECENT_WINDOW_MS;

        let summary = functional_check(&storage, two_days_later).expect("functional check");

        assert_eq!(summary.recent_count, 0);
    }

    #[test]
    fn repository_failure_maps_to_functional_error() {
        let storage = ScriptedStorage::migrated().failing_users("no such table: users");

        let error = functional_check(&storage, now_unix_ms()).expect_err("should fail");

        assert_eq!(
            error,
            ReadinessError::FunctionalCheck("persistence error: no such table: users".to_owned())
        );
    }
}
