//! Configuration manager implementation

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use tracing::{debug, warn};

use crate::{
    error::{ConfigError, Result},
    types::AppConfig,
};

/// Config file read when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "clearance.toml";

/// Prefix of environment overrides, e.g. `CLEARANCE__SERVER__PORT`
pub const ENV_PREFIX: &str = "CLEARANCE";

/// Configuration manager
pub struct ConfigManager {
    /// Configuration file path
    config_path: PathBuf,
    /// Missing file is an error when the path was given explicitly
    required: bool,
    /// Environment prefix
    env_prefix: String,
}

impl ConfigManager {
    /// Manager reading `./clearance.toml` if it exists
    pub fn new() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_FILE),
            required: false,
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Manager reading `path`, which must exist
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            required: true,
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// `path` when given, the default file otherwise
    pub fn from_arg(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::with_path(path),
            None => Self::new(),
        }
    }

    /// Use another environment prefix
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load, merge and validate the configuration
    pub fn load(&self) -> Result<AppConfig> {
        if self.required && !self.config_path.exists() {
            return Err(ConfigError::NotFound(
                self.config_path.display().to_string(),
            ));
        }

        let path = self.config_path.to_string_lossy();
        let builder = Config::builder()
            .add_source(File::new(&path, FileFormat::Toml).required(self.required))
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;
        app_config.validate()?;

        debug!(path = %self.config_path.display(), "Loaded configuration");
        if app_config.uses_dev_secrets() {
            warn!("Using development signing secret or scanner agent token; set them before deploying");
        }
        Ok(app_config)
    }

    /// Write `config` as TOML to the manager's path
    pub fn save(&self, config: &AppConfig) -> Result<()> {
        config.validate()?;
        let toml = toml::to_string_pretty(config)?;
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.config_path, toml)?;
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
