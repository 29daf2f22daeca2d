//! Clearance configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables (`CLEARANCE__SECTION__KEY`). The result is checked
//! by [`AppConfig::validate`] before any service starts.

pub mod error;
pub mod manager;
pub mod types;

pub use error::{ConfigError, Result};
pub use manager::{ConfigManager, DEFAULT_CONFIG_FILE, ENV_PREFIX};
pub use types::{
    AppConfig, MAX_UPLOAD_URL_TTL_SECS, AuthConfig, LoggingConfig, ScannerAgentConfig, ServerConfig, StorageConfig,
};
