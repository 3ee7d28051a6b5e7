use rusqlite::ErrorCode;

use super::types::UserRecord;
use crate::error::CoreError;

pub(super) const USER_COLUMNS: &str = "id, username, email, created_at, updated_at";

pub(super) fn map_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        created_at_unix_ms: row.get(3)?,
        updated_at_unix_ms: row.get(4)?,
    })
}

pub(super) fn persistence(err: rusqlite::Error) -> CoreError {
    CoreError::Persistence(err.to_string())
}

pub(super) fn count_to_u64(count: i64) -> Result<u64, CoreError> {
    u64::try_from(count).map_err(|_| {
        CoreError::Persistence(format!("row count '{count}' cannot be represented as u64"))
    })
}

/// Unique-index violations on `users` surface as conflicts naming the column.
pub(super) fn map_insert_user_error(err: rusqlite::Error) -> CoreError {
    let conflict = match &err {
        rusqlite::Error::SqliteFailure(failure, Some(message))
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            if message.contains("users.username") {
                Some("Username already exists")
            } else if message.contains("users.email") {
                Some("Email already exists")
            } else {
                None
            }
        }
        _ => None,
    };

    match conflict {
        Some(message) => CoreError::Conflict(message.to_owned()),
        None => persistence(err),
    }
}
