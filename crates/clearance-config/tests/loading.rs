use std::path::PathBuf;

use clearance_config::*;

fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("clearance.toml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_missing_default_file_gives_defaults() {
    let config = ConfigManager::from_arg(None)
        .env_prefix("CLEARANCE_TEST_NONE")
        .load()
        .unwrap();
    assert_eq!(config, AppConfig::default());
}

#[test]
fn test_explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = ConfigManager::with_path(dir.path().join("absent.toml")).load();
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

#[test]
fn test_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[server]
port = 9090
public_url = "https://clearance.example.com"

[scanner_agent]
workers = 4
url = "http://agent:5000"
"#,
    );

    let config = ConfigManager::with_path(&path)
        .env_prefix("CLEARANCE_TEST_FILE")
        .load()
        .unwrap();
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.public_url(), "https://clearance.example.com");
    assert_eq!(config.scanner_agent.workers, 4);
    assert_eq!(config.scanner_agent.url.as_deref(), Some("http://agent:5000"));
    assert_eq!(config.auth.min_password_length, 8);
}

#[test]
fn test_environment_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[server]\nport = 9090\n");
    std::env::set_var("CLEARANCE_TEST_ENV__SERVER__PORT", "7070");
    std::env::set_var("CLEARANCE_TEST_ENV__STORAGE__SIGNING_SECRET", "s3cret");

    let config = ConfigManager::with_path(&path)
        .env_prefix("CLEARANCE_TEST_ENV")
        .load()
        .unwrap();
    assert_eq!(config.server.port, 7070);
    assert_eq!(config.storage.signing_secret, "s3cret");
}

#[test]
fn test_invalid_values_are_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[scanner_agent]\nworkers = 0\n");
    let result = ConfigManager::with_path(&path)
        .env_prefix("CLEARANCE_TEST_INVALID")
        .load();
    assert!(matches!(result, Err(ConfigError::Validation { .. })));
}

#[test]
fn test_oversized_upload_ttl_is_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[storage]\nupload_url_ttl_secs = 9223372036854775807\n");
    let result = ConfigManager::with_path(&path)
        .env_prefix("CLEARANCE_TEST_TTL")
        .load();
    match result {
        Err(ConfigError::Validation { field, .. }) => {
            assert_eq!(field, "storage.upload_url_ttl_secs")
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn test_malformed_file_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[server\nport = ");
    let result = ConfigManager::with_path(&path)
        .env_prefix("CLEARANCE_TEST_MALFORMED")
        .load();
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("clearance.toml");
    let mut config = AppConfig::default();
    config.storage.snapshot_path = Some(PathBuf::from("/var/lib/clearance/store.json"));
    config.logging.level = "debug".to_string();

    let manager = ConfigManager::with_path(&path).env_prefix("CLEARANCE_TEST_SAVE");
    manager.save(&config).unwrap();
    assert_eq!(manager.load().unwrap(), config);
}
