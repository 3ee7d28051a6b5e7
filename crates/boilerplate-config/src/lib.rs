use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_BOILERPLATE_CONFIG: &str = "BOILERPLATE_CONFIG";
pub const ENV_BOILERPLATE_DATABASE_PATH: &str = "BOILERPLATE_DATABASE_PATH";

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_DATABASE_FILE_NAME: &str = "boilerplate.db";
const DEFAULT_DATABASE_BUSY_TIMEOUT_MS: u64 = 5000;
const DEFAULT_DATABASE_PROBE_TIMEOUT_MS: u64 = 5000;
const DEFAULT_DATABASE_WAL_ENABLED: bool = true;
const DEFAULT_DATABASE_SYNCHRONOUS: &str = "NORMAL";
const DEFAULT_BOOTSTRAP_MAX_CONNECT_ATTEMPTS: u32 = 30;
const DEFAULT_BOOTSTRAP_CONNECT_RETRY_DELAY_MS: u64 = 1000;
const DEFAULT_BOOTSTRAP_FUNCTIONAL_CHECK: bool = true;
const DEFAULT_LOGGING_FILTER: &str = "info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Message(String),
}

impl ConfigError {
    fn configuration(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoilerplateConfig {
    #[serde(default)]
    pub server: ServerConfigToml,
    #[serde(default)]
    pub database: DatabaseConfigToml,
    #[serde(default)]
    pub bootstrap: BootstrapConfigToml,
    #[serde(default)]
    pub logging: LoggingConfigToml,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfigToml {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfigToml {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfigToml {
    #[serde(default = "default_database_path")]
    pub path: String,
    #[serde(default = "default_database_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_database_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_database_wal_enabled")]
    pub wal_enabled: bool,
    #[serde(default = "default_database_synchronous")]
    pub synchronous: String,
}

impl Default for DatabaseConfigToml {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            busy_timeout_ms: default_database_busy_timeout_ms(),
            probe_timeout_ms: default_database_probe_timeout_ms(),
            wal_enabled: default_database_wal_enabled(),
            synchronous: default_database_synchronous(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BootstrapConfigToml {
    #[serde(default = "default_bootstrap_max_connect_attempts")]
    pub max_connect_attempts: u32,
    #[serde(default = "default_bootstrap_connect_retry_delay_ms")]
    pub connect_retry_delay_ms: u64,
    #[serde(default = "default_bootstrap_functional_check")]
    pub functional_check: bool,
}

impl Default for BootstrapConfigToml {
    fn default() -> Self {
        Self {
            max_connect_attempts: default_bootstrap_max_connect_attempts(),
            connect_retry_delay_ms: default_bootstrap_connect_retry_delay_ms(),
            functional_check: default_bootstrap_functional_check(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfigToml {
    #[serde(default = "default_logging_filter")]
    pub filter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingConfigToml {
    fn default() -> Self {
        Self {
            filter: default_logging_filter(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseRuntimeConfig {
    pub path: PathBuf,
    pub busy_timeout: Duration,
    pub probe_timeout: Duration,
    pub wal_enabled: bool,
    pub synchronous: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapRuntimeConfig {
    pub max_connect_attempts: u32,
    pub connect_retry_delay: Duration,
    pub functional_check: bool,
}

impl BoilerplateConfig {
    pub fn database_runtime(&self) -> DatabaseRuntimeConfig {
        DatabaseRuntimeConfig {
            path: PathBuf::from(self.database.path.as_str()),
            busy_timeout: Duration::from_millis(self.database.busy_timeout_ms),
            probe_timeout: Duration::from_millis(self.database.probe_timeout_ms),
            wal_enabled: self.database.wal_enabled,
            synchronous: self.database.synchronous.clone(),
        }
    }

    pub fn bootstrap_runtime(&self) -> BootstrapRuntimeConfig {
        BootstrapRuntimeConfig {
            max_connect_attempts: self.bootstrap.max_connect_attempts,
            connect_retry_delay: Duration::from_millis(self.bootstrap.connect_retry_delay_ms),
            functional_check: self.bootstrap.functional_check,
        }
    }
}

pub fn load_from_env() -> Result<BoilerplateConfig, ConfigError> {
    let path = config_path_from_env()?;
    let mut config = load_from_path(path)?;
    apply_env_overrides(&mut config)?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<BoilerplateConfig, ConfigError> {
    load_or_create_config(path.as_ref())
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = resolve_home_dir().ok_or_else(|| {
        ConfigError::configuration("Unable to resolve home directory from HOME or USERPROFILE")
    })?;

    Ok(home
        .join(".config")
        .join("boilerplate")
        .join("config.toml"))
}

fn config_path_from_env() -> Result<PathBuf, ConfigError> {
    match std::env::var(ENV_BOILERPLATE_CONFIG) {
        Ok(raw) => {
            if raw.trim().is_empty() {
                default_config_path()
            } else {
                Ok(raw.into())
            }
        }
        Err(std::env::VarError::NotPresent) => default_config_path(),
        Err(_) => Err(ConfigError::configuration(
            "BOILERPLATE_CONFIG contained invalid UTF-8",
        )),
    }
}

// Overrides are applied after persistence so they never leak into the file.
fn apply_env_overrides(config: &mut BoilerplateConfig) -> Result<(), ConfigError> {
    match std::env::var(ENV_BOILERPLATE_DATABASE_PATH) {
        Ok(raw) => {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                config.database.path = trimmed.to_owned();
            }
            Ok(())
        }
        Err(std::env::VarError::NotPresent) => Ok(()),
        Err(_) => Err(ConfigError::configuration(
            "BOILERPLATE_DATABASE_PATH contained invalid UTF-8",
        )),
    }
}

fn default_boilerplate_data_dir() -> PathBuf {
    resolve_data_local_dir().join("boilerplate")
}

fn resolve_data_local_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(path) = std::env::var("LOCALAPPDATA") {
            let path = path.trim();
            if !path.is_empty() {
                return absolutize_path(PathBuf::from(path));
            }
        }
        if let Some(home) = resolve_home_dir() {
            return home.join("AppData").join("Local");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = resolve_home_dir() {
            return home.join("Library").join("Application Support");
        }
    }

    #[cfg(all(not(target_os = "windows"), not(target_os = "macos")))]
    {
        if let Ok(path) = std::env::var("XDG_DATA_HOME") {
            let path = path.trim();
            if !path.is_empty() {
                return absolutize_path(PathBuf::from(path));
            }
        }
        if let Some(home) = resolve_home_dir() {
            return home.join(".local").join("share");
        }
    }

    std::env::temp_dir()
}

fn resolve_home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("USERPROFILE")
                .ok()
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
}

fn absolutize_path(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }

    if let Ok(current) = std::env::current_dir() {
        return current.join(path);
    }

    std::env::temp_dir().join(path)
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_owned()
}

fn default_database_path() -> String {
    default_boilerplate_data_dir()
        .join(DEFAULT_DATABASE_FILE_NAME)
        .to_string_lossy()
        .to_string()
}

fn default_database_busy_timeout_ms() -> u64 {
    DEFAULT_DATABASE_BUSY_TIMEOUT_MS
}

fn default_database_probe_timeout_ms() -> u64 {
    DEFAULT_DATABASE_PROBE_TIMEOUT_MS
}

fn default_database_wal_enabled() -> bool {
    DEFAULT_DATABASE_WAL_ENABLED
}

fn default_database_synchronous() -> String {
    DEFAULT_DATABASE_SYNCHRONOUS.to_owned()
}

fn default_bootstrap_max_connect_attempts() -> u32 {
    DEFAULT_BOOTSTRAP_MAX_CONNECT_ATTEMPTS
}

fn default_bootstrap_connect_retry_delay_ms() -> u64 {
    DEFAULT_BOOTSTRAP_CONNECT_RETRY_DELAY_MS
}

fn default_bootstrap_functional_check() -> bool {
    DEFAULT_BOOTSTRAP_FUNCTIONAL_CHECK
}

fn default_logging_filter() -> String {
    DEFAULT_LOGGING_FILTER.to_owned()
}

fn persist_config(path: &Path, config: &BoilerplateConfig) -> Result<(), ConfigError> {
    let rendered = toml::to_string_pretty(config).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to serialize BOILERPLATE_CONFIG for {}: {err}",
            path.display()
        ))
    })?;

    std::fs::write(path, rendered.as_bytes()).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to write BOILERPLATE_CONFIG to {}: {err}",
            path.display()
        ))
    })
}

fn load_or_create_config(path: &Path) -> Result<BoilerplateConfig, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|err| {
                        ConfigError::configuration(format!(
                            "Failed to create parent directory {} for BOILERPLATE_CONFIG: {err}",
                            parent.display()
                        ))
                    })?;
                }
            }

            let default_config = BoilerplateConfig::default();
            persist_config(path, &default_config)?;
            return Ok(default_config);
        }
        Err(err) => {
            return Err(ConfigError::configuration(format!(
                "Failed to read BOILERPLATE_CONFIG from {}: {err}",
                path.display()
            )));
        }
    };

    let mut config: BoilerplateConfig = toml::from_str(&raw).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to parse BOILERPLATE_CONFIG from {}: {err}",
            path.display()
        ))
    })?;

    if normalize_config(&mut config) {
        persist_config(path, &config)?;
    }

    Ok(config)
}

fn normalize_config(config: &mut BoilerplateConfig) -> bool {
    let mut changed = false;

    changed |= normalize_non_empty_string(&mut config.server.bind_address, default_bind_address());
    changed |= normalize_database_config(&mut config.database);
    changed |= normalize_bootstrap_config(&mut config.bootstrap);
    changed |= normalize_non_empty_string(&mut config.logging.filter, default_logging_filter());
    if let Some(file) = config.logging.file.as_mut() {
        let trimmed = file.trim().to_owned();
        if trimmed.is_empty() {
            config.logging.file = None;
            changed = true;
        } else if trimmed != *file {
            *file = trimmed;
            changed = true;
        }
    }

    changed
}

pub fn normalize_database_config(config: &mut DatabaseConfigToml) -> bool {
    let mut changed = normalize_non_empty_string(&mut config.path, default_database_path());

    changed |= normalize_timeout_ms(
        &mut config.busy_timeout_ms,
        default_database_busy_timeout_ms(),
    );
    changed |= normalize_timeout_ms(
        &mut config.probe_timeout_ms,
        default_database_probe_timeout_ms(),
    );

    let normalized_synchronous = normalize_database_synchronous(config.synchronous.as_str());
    if normalized_synchronous != config.synchronous {
        config.synchronous = normalized_synchronous;
        changed = true;
    }

    changed
}

pub fn normalize_bootstrap_config(config: &mut BootstrapConfigToml) -> bool {
    let mut changed = false;

    let normalized_attempts = if config.max_connect_attempts == 0 {
        default_bootstrap_max_connect_attempts()
    } else {
        config.max_connect_attempts.clamp(1, 600)
    };
    if normalized_attempts != config.max_connect_attempts {
        config.max_connect_attempts = normalized_attempts;
        changed = true;
    }

    let normalized_delay_ms = config.connect_retry_delay_ms.min(60_000);
    if normalized_delay_ms != config.connect_retry_delay_ms {
        config.connect_retry_delay_ms = normalized_delay_ms;
        changed = true;
    }

    changed
}

fn normalize_timeout_ms(value: &mut u64, default: u64) -> bool {
    let normalized = if *value == 0 {
        default
    } else {
        (*value).clamp(100, 60_000)
    };
    if normalized != *value {
        *value = normalized;
        return true;
    }
    false
}

fn normalize_non_empty_string(value: &mut String, default: String) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        if *value != default {
            *value = default;
            return true;
        }
        return false;
    }

    if trimmed != value {
        *value = trimmed.to_owned();
        return true;
    }
    false
}

fn normalize_database_synchronous(value: &str) -> String {
    let candidate = value.trim().to_ascii_uppercase();
    match candidate.as_str() {
        "OFF" | "NORMAL" | "FULL" | "EXTRA" => candidate,
        _ => default_database_synchronous(),
    }
}
