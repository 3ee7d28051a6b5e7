use boilerplate_core::{now_unix_ms, rfc3339_from_unix_ms, CoreError, UserRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloResponse {
    pub message: String,
    pub timestamp: i64,
    pub database_healthy: bool,
}

impl HelloResponse {
    pub fn new(message: impl Into<String>, database_healthy: bool) -> Self {
        Self {
            message: message.into(),
            timestamp: now_unix_ms(),
            database_healthy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub timestamp: i64,
    pub database_info: Option<String>,
}

impl HealthResponse {
    pub fn new(healthy: bool, database_info: Option<String>) -> Self {
        let (status, database) = if healthy {
            ("UP", "CONNECTED")
        } else {
            ("DOWN", "DISCONNECTED")
        };
        Self {
            status: status.to_owned(),
            database: database.to_owned(),
            timestamp: now_unix_ms(),
            database_info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
    pub timestamp: i64,
}

impl CountResponse {
    pub fn new(count: u64) -> Self {
        Self {
            count,
            timestamp: now_unix_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<UserRecord> for UserDto {
    type Error = CoreError;

    fn try_from(user: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: user.id,
            created_at: rfc3339_from_unix_ms(user.created_at_unix_ms)?,
            updated_at: rfc3339_from_unix_ms(user.updated_at_unix_ms)?,
            username: user.username,
            email: user.email,
        })
    }
}

/// Missing fields deserialize as empty and are rejected by validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_serializes_camel_case() {
        let value = serde_json::to_value(HelloResponse::new("Hello, World!", true))
            .expect("serialize hello");
        assert_eq!(value["message"], "Hello, World!");
        assert_eq!(value["databaseHealthy"], true);
        assert!(value["timestamp"].as_i64().expect("timestamp") > 0);
    }

    #[test]
    fn unhealthy_health_response_has_no_info() {
        let response = HealthResponse::new(false, None);
        assert_eq!(response.status, "DOWN");
        assert_eq!(response.database, "DISCONNECTED");
        let value = serde_json::to_value(&response).expect("serialize health");
        assert!(value["databaseInfo"].is_null());
    }

    #[test]
    fn user_dto_renders_rfc3339_timestamps() {
        let dto = UserDto::try_from(UserRecord {
            id: 7,
            username: "alice".to_owned(),
            email: "alice@example.com".to_owned(),
            created_at_unix_ms: 0,
            updated_at_unix_ms: 1_000,
        })
        .expect("convert user");

        assert_eq!(dto.created_at, "1970-01-01T00:00:00Z");
        assert_eq!(dto.updated_at, "1970-01-01T00:00:01Z");
        let value = serde_json::to_value(&dto).expect("serialize user");
        assert_eq!(value["createdAt"], "1970-01-01T00:00:00Z");
    }

    #[test]
    fn create_request_tolerates_missing_fields() {
        let request: CreateUserRequest =
            serde_json::from_str(r#"{"username":"alice"}"#).expect("parse request");
        assert_eq!(request.email, "");
    }
}
