use std::fmt;

use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::error::CoreError;

pub const USERNAME_MAX_LEN: usize = 100;
pub const EMAIL_MAX_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at_unix_ms: i64,
    pub updated_at_unix_ms: i64,
}

impl fmt::Display for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user #{} {} <{}>", self.id, self.username, self.email)
    }
}

/// A validated user ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    username: String,
    email: String,
}

impl NewUser {
    pub fn new(username: impl AsRef<str>, email: impl AsRef<str>) -> Result<Self, CoreError> {
        let username = username.as_ref().trim();
        let email = email.as_ref().trim();

        if username.is_empty() || email.is_empty() {
            return Err(CoreError::Validation(
                "Username and email are required".to_owned(),
            ));
        }
        if username.chars().count() > USERNAME_MAX_LEN {
            return Err(CoreError::Validation(format!(
                "Username must be at most {USERNAME_MAX_LEN} characters"
            )));
        }
        if email.chars().count() > EMAIL_MAX_LEN {
            return Err(CoreError::Validation(format!(
                "Email must be at most {EMAIL_MAX_LEN} characters"
            )));
        }
        if !looks_like_email(email) {
            return Err(CoreError::Validation(
                "Email is not a valid e-mail address".to_owned(),
            ));
        }

        Ok(Self {
            username: username.to_owned(),
            email: email.to_owned(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

fn looks_like_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    match value.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedMigration {
    pub version: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub database: String,
    pub file: String,
    pub version: String,
}

impl DatabaseInfo {
    pub fn describe(&self) -> String {
        format!(
            "Database: {}, File: {}, Version: {}",
            self.database, self.file, self.version
        )
    }
}

pub fn now_unix_ms() -> i64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
}

pub fn rfc3339_from_unix_ms(unix_ms: i64) -> Result<String, CoreError> {
    let timestamp =
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(unix_ms) * 1_000_000).map_err(
            |err| CoreError::Persistence(format!("timestamp '{unix_ms}' is out of range: {err}")),
        )?;
    timestamp
        .format(&Rfc3339)
        .map_err(|err| CoreError::Persistence(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_trims_and_accepts_valid_input() {
        let user = NewUser::new("  alice ", " alice@example.com ").expect("valid user");
        assert_eq!(user.username(), "alice");
        assert_eq!(user.email(), "alice@example.com");
    }

    #[test]
    fn new_user_requires_both_fields() {
        for (username, email) in [("", "a@b.c"), ("bob", "   "), (" ", "")] {
            let error = NewUser::new(username, email).expect_err("missing field rejected");
            assert_eq!(
                error,
                CoreError::Validation("Username and email are required".to_owned())
            );
        }
    }

    #[test]
    fn new_user_enforces_column_lengths() {
        let long_name = "u".repeat(USERNAME_MAX_LEN + 1);
        assert!(matches!(
            NewUser::new(&long_name, "a@b.c"),
            Err(CoreError::Validation(_))
        ));

        let long_email = format!("{}@example.com", "e".repeat(EMAIL_MAX_LEN));
        assert!(matches!(
            NewUser::new("carol", &long_email),
            Err(CoreError::Validation(_))
        ));

        let exact_name = "u".repeat(USERNAME_MAX_LEN);
        assert!(NewUser::new(&exact_name, "a@b.c").is_ok());
    }

    #[test]
    fn new_user_rejects_malformed_email() {
        for email in ["plain", "@example.com", "dave@", "a@b@c", "da ve@example.com"] {
            assert!(
                matches!(NewUser::new("dave", email), Err(CoreError::Validation(_))),
                "expected {email:?} to be rejected"
            );
        }
    }

    #[test]
    fn rfc3339_rendering_uses_utc() {
        let rendered = rfc3339_from_unix_ms(1_700_000_000_123).expect("format timestamp");
        assert_eq!(rendered, "2023-11-14T22:13:20.123Z");
    }

    #[test]
    fn database_info_description_lists_all_fields() {
        let info = DatabaseInfo {
            database: "main".to_owned(),
            file: "/tmp/app.db".to_owned(),
            version: "3.46.0".to_owned(),
        };
        assert_eq!(
            info.describe(),
            "Database: main, File: /tmp/app.db, Version: 3.46.0"
        );
    }
}
