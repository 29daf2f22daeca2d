//! Configuration sections and their defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

pub(crate) const DEV_SIGNING_SECRET: &str = "clearance-dev-signing-secret";
pub(crate) const DEV_AGENT_TOKEN: &str = "clearance-dev-agent-token";

/// Shortest password length `validate` accepts as a policy
const MIN_PASSWORD_POLICY: usize = 8;

/// Longest lifetime of a signed upload URL (one week)
pub const MAX_UPLOAD_URL_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub scanner_agent: ScannerAgentConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener of the API server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base URL clients use to reach the server; derived from host and port
    /// when unset
    pub public_url: Option<String>,
    /// Requests slower than this are logged as warnings
    pub slow_request_ms: u64,
}

/// Users and tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    pub session_ttl_hours: u64,
    pub min_password_length: usize,
    /// Admin account created on startup when no user exists yet
    pub bootstrap_admin_username: Option<String>,
    pub bootstrap_admin_password: Option<String>,
}

/// Uploaded archives, scan work directories and the store snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub work_dir: PathBuf,
    /// The store is loaded from and saved to this file when set
    pub snapshot_path: Option<PathBuf>,
    pub upload_url_ttl_secs: u64,
    /// Key for signing upload URLs
    pub signing_secret: String,
}

/// Scanner agent, embedded or standalone
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScannerAgentConfig {
    /// Shared bearer token between API and agent
    pub token: String,
    pub workers: usize,
    pub queue_capacity: usize,
    /// Remote agent used by `serve`; the agent runs in-process when unset
    pub url: Option<String>,
    /// API the standalone agent reports to
    pub api_url: Option<String>,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            public_url: None,
            slow_request_ms: 100,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: 24,
            min_password_length: MIN_PASSWORD_POLICY,
            bootstrap_admin_username: None,
            bootstrap_admin_password: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("data/uploads"),
            work_dir: PathBuf::from("data/work"),
            snapshot_path: None,
            upload_url_ttl_secs: 900,
            signing_secret: DEV_SIGNING_SECRET.to_string(),
        }
    }
}

impl Default for ScannerAgentConfig {
    fn default() -> Self {
        Self {
            token: DEV_AGENT_TOKEN.to_string(),
            workers: 2,
            queue_capacity: 64,
            url: None,
            api_url: None,
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL without a trailing slash
    pub fn public_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}", self.bind_addr()),
        }
    }
}

impl ScannerAgentConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl AppConfig {
    /// Check every section; the first problem found is returned
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::validation("server.host", "must not be empty"));
        }
        if self.server.port == 0 {
            return Err(ConfigError::validation("server.port", "must be greater than 0"));
        }

        if self.auth.session_ttl_hours == 0 {
            return Err(ConfigError::validation(
                "auth.session_ttl_hours",
                "must be greater than 0",
            ));
        }
        if self.auth.min_password_length < MIN_PASSWORD_POLICY {
            return Err(ConfigError::validation(
                "auth.min_password_length",
                format!("must be at least {}", MIN_PASSWORD_POLICY),
            ));
        }
        match (
            &self.auth.bootstrap_admin_username,
            &self.auth.bootstrap_admin_password,
        ) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(ConfigError::validation(
                    "auth.bootstrap_admin_password",
                    "bootstrap admin needs both a username and a password",
                ));
            }
            (Some(_), Some(password)) if password.len() < self.auth.min_password_length => {
                return Err(ConfigError::validation(
                    "auth.bootstrap_admin_password",
                    format!(
                        "must be at least {} characters",
                        self.auth.min_password_length
                    ),
                ));
            }
            _ => {}
        }

        if self.storage.upload_url_ttl_secs == 0
            || self.storage.upload_url_ttl_secs > MAX_UPLOAD_URL_TTL_SECS
        {
            return Err(ConfigError::validation(
                "storage.upload_url_ttl_secs",
                format!("must be between 1 and {}", MAX_UPLOAD_URL_TTL_SECS),
            ));
        }
        if self.storage.signing_secret.is_empty() {
            return Err(ConfigError::validation(
                "storage.signing_secret",
                "must not be empty",
            ));
        }

        if self.scanner_agent.token.is_empty() {
            return Err(ConfigError::validation("scanner_agent.token", "must not be empty"));
        }
        if self.scanner_agent.workers == 0 {
            return Err(ConfigError::validation(
                "scanner_agent.workers",
                "must be greater than 0",
            ));
        }
        if self.scanner_agent.queue_capacity == 0 {
            return Err(ConfigError::validation(
                "scanner_agent.queue_capacity",
                "must be greater than 0",
            ));
        }
        if self.scanner_agent.port == 0 {
            return Err(ConfigError::validation(
                "scanner_agent.port",
                "must be greater than 0",
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::validation("logging.level", "must not be empty"));
        }
        Ok(())
    }

    /// Whether the shared secrets still have their development values
    pub fn uses_dev_secrets(&self) -> bool {
        self.storage.signing_secret == DEV_SIGNING_SECRET
            || self.scanner_agent.token == DEV_AGENT_TOKEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.public_url(), "http://127.0.0.1:8080");
        assert!(config.uses_dev_secrets());
    }

    #[test]
    fn test_public_url_drops_trailing_slash() {
        let server = ServerConfig {
            public_url: Some("https://clearance.example.com/".to_string()),
            ..Default::default()
        };
        assert_eq!(server.public_url(), "https://clearance.example.com");
    }

    #[test]
    fn test_validation_names_the_field() {
        let mut config = AppConfig::default();
        config.scanner_agent.workers = 0;
        match config.validate() {
            Err(ConfigError::Validation { field, .. }) => {
                assert_eq!(field, "scanner_agent.workers")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_rejections() {
        let cases: Vec<fn(&mut AppConfig)> = vec![
            |c| c.server.port = 0,
            |c| c.auth.session_ttl_hours = 0,
            |c| c.auth.min_password_length = 4,
            |c| c.storage.signing_secret.clear(),
            |c| c.storage.upload_url_ttl_secs = 0,
            |c| c.storage.upload_url_ttl_secs = MAX_UPLOAD_URL_TTL_SECS + 1,
            |c| c.storage.upload_url_ttl_secs = u64::MAX,
            |c| c.scanner_agent.token.clear(),
            |c| c.auth.bootstrap_admin_username = Some("admin".to_string()),
            |c| {
                c.auth.bootstrap_admin_username = Some("admin".to_string());
                c.auth.bootstrap_admin_password = Some("short".to_string());
            },
        ];
        for mutate in cases {
            let mut config = AppConfig::default();
            mutate(&mut config);
            assert!(config.validate().is_err(), "{:?}", config);
        }
    }
}
