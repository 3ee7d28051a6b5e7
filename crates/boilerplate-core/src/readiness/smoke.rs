use super::error::ReadinessError;
use crate::store::{DatabaseInfo, StorageBackend};

const VERSION_LOG_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeReport {
    pub info: DatabaseInfo,
}

impl SmokeReport {
    pub fn describe(&self) -> String {
        self.info.describe()
    }
}

/// Reads database name, file, and engine version to prove the connection can
/// serve a real multi-column query.
pub fn smoke_test<S>(storage: &S) -> Result<SmokeReport, ReadinessError>
where
    S: StorageBackend + ?Sized,
{
    let info = storage
        .database_info()
        .map_err(|error| ReadinessError::SmokeTest(error.to_string()))?;

    let version: String = info.version.chars().take(VERSION_LOG_LIMIT).collect();
    tracing::info!(
        database = info.database.as_str(),
        file = info.file.as_str(),
        version = version.as_str(),
        "database smoke test passed"
    );
    Ok(SmokeReport { info })
}
