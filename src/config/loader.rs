//! Configuration Loader
//!
//! Environment-aware configuration loading. Sources are layered, later ones winning:
//!
//! 1. Built-in defaults (`ConnectorConfig::default()`)
//! 2. `{config_dir}/remote_jobs.yaml`
//! 3. `{config_dir}/remote_jobs.{environment}.yaml`
//! 4. Environment variables prefixed `TASKER_REMOTE_JOBS__` (e.g.
//!    `TASKER_REMOTE_JOBS__POLLING__INTERVAL_SECONDS=60`)

use super::error::{ConfigResult, ConfigurationError};
use super::ConnectorConfig;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_FILE_STEM: &str = "remote_jobs";
const ENV_PREFIX: &str = "TASKER_REMOTE_JOBS";

/// Loaded, validated configuration plus the context it was loaded from
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: ConnectorConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading remote job connector configuration"
        );

        let config = Self::build_config(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            discovery_attempts = config.discovery.max_attempts,
            poll_interval_seconds = config.polling.interval_seconds,
            database_configured = config.database.url.is_some(),
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration (used by embedders and tests)
    pub fn from_config(config: ConnectorConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            config_directory: Self::default_config_directory(),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect the current environment from the usual variables
    pub fn detect_environment() -> String {
        env::var("TASKER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        env::var("TASKER_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn build_config(config_directory: &Path, environment: &str) -> ConfigResult<ConnectorConfig> {
        let base_path = config_directory.join(format!("{BASE_FILE_STEM}.yaml"));
        let env_path = config_directory.join(format!("{BASE_FILE_STEM}.{environment}.yaml"));

        let settings = ::config::Config::builder()
            .add_source(::config::File::from(base_path.as_path()).required(false))
            .add_source(::config::File::from(env_path.as_path()).required(false))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::LoadFailed {
                path: config_directory.to_path_buf(),
                error: e.to_string(),
            })?;

        settings
            .try_deserialize::<ConnectorConfig>()
            .map_err(|e| ConfigurationError::DeserializationFailed {
                error: e.to_string(),
            })
    }
}
