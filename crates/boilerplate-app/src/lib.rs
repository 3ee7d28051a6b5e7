pub mod bootstrap;
pub mod error;
pub mod http;

use std::sync::Arc;

use axum::Router;
use boilerplate_config::BoilerplateConfig;
use boilerplate_core::{BootstrapReport, SqliteDatabase};

pub use error::{AppError, AppResult};
pub use http::AppState;

pub struct App {
    pub config: BoilerplateConfig,
    database: Arc<SqliteDatabase>,
}

impl App {
    pub fn from_config(config: BoilerplateConfig) -> Self {
        let database = SqliteDatabase::new(bootstrap::sqlite_settings(&config));
        Self {
            config,
            database: Arc::new(database),
        }
    }

    pub fn database(&self) -> &Arc<SqliteDatabase> {
        &self.database
    }

    /// Readiness sequence for the configured database. Failures stay on the
    /// report; the caller serves regardless.
    pub async fn prepare(&self) -> BootstrapReport {
        if let Err(error) = bootstrap::ensure_database_directory(self.database.path()) {
            tracing::warn!(error = %error, "database directory unavailable");
        }
        let policy = bootstrap::bootstrap_policy(&self.config);
        bootstrap::prepare_database(&self.database, &policy).await
    }

    pub fn router(&self) -> Router {
        http::router(AppState::new(Arc::clone(&self.database)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boilerplate_core::test_support::TestDbPath;

    fn config_for(db: &TestDbPath) -> BoilerplateConfig {
        let mut config = BoilerplateConfig::default();
        config.database.path = db.path().display().to_string();
        config.bootstrap.max_connect_attempts = 1;
        config.bootstrap.connect_retry_delay_ms = 1;
        config
    }

    #[test]
    fn database_follows_configured_path() {
        let db = TestDbPath::new("app-config-path");
        let app = App::from_config(config_for(&db));

        assert_eq!(app.database().path(), db.path());
        assert_eq!(app.database().settings().synchronous, "NORMAL");
    }

    #[tokio::test]
    async fn prepare_migrates_and_seeds() {
        let db = TestDbPath::new("app-prepare-seeds");
        let app = App::from_config(config_for(&db));

        let report = app.prepare().await;

        assert!(report.database_ready());
        assert_eq!(
            boilerplate_core::UserRepository::count_users(app.database().as_ref())
                .expect("count users"),
            1
        );
    }
}
