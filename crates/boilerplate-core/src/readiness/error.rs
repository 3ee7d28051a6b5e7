use thiserror::Error;

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadinessError {
    #[error("database unavailable after {attempts} connection attempts: {last_error}")]
    ConnectionTimeout { attempts: u32, last_error: String },
    #[error("schema incomplete; missing relations: {}", .missing.join(", "))]
    SchemaIncomplete { missing: Vec<String> },
    #[error("schema repair failed; relations still missing: {}", .missing.join(", "))]
    RepairFailed { missing: Vec<String> },
    #[error("migration application failed: {0}")]
    MigrationApply(String),
    #[error("database smoke test failed: {0}")]
    SmokeTest(String),
    #[error("functional check failed: {0}")]
    FunctionalCheck(String),
    #[error(transparent)]
    Storage(#[from] CoreError),
}
