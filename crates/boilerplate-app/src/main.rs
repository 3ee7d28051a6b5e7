use anyhow::{Context, Result};
use boilerplate_app::{App, AppError};
use boilerplate_config::LoggingConfigToml;
use std::path::Path;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = boilerplate_config::load_from_env()?;
    init_logging(&config.logging)?;

    let app = App::from_config(config);
    let report = app.prepare().await;

    let bind_address = app.config.server.bind_address.clone();
    let listener = TcpListener::bind(bind_address.as_str())
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    let local_addr = listener.local_addr()?;
    tracing::info!(
        address = %local_addr,
        database = %app.database().path().display(),
        database_ready = report.database_ready(),
        "boilerplate-api listening"
    );

    axum::serve(listener, app.router())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated unexpectedly")?;

    tracing::info!("boilerplate-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_logging(config: &LoggingConfigToml) -> Result<(), AppError> {
    let Some(file) = config.file.as_deref().filter(|file| !file.trim().is_empty()) else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter(&config.filter))
            .init();
        return Ok(());
    };

    let log_path = Path::new(file);
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|error| {
                AppError::configuration(format!(
                    "failed to create log directory '{}': {error}",
                    parent.display()
                ))
            })?;
        }
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|error| {
            AppError::configuration(format!(
                "failed to open log file '{}': {error}",
                log_path.display()
            ))
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(&config.filter))
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .init();

    Ok(())
}
