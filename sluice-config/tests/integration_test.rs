//! Integration tests for sluice-config

use sluice_config::*;
use std::env;
use std::io::Write;
use std::path::PathBuf;

#[test]
fn test_toml_file_layer() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
database_url = "sqlite::memory:"
runtime_dir = "/tmp/sluice-it"

[queue]
sleep_ms = 10
max_executions = 3
name = "mail"

[mail]
smtp_host = "localhost"
default_from = "shop@example.com"
"#
    )
    .unwrap();

    let manager = ConfigManager::new();
    manager.load_file_auto(file.path()).unwrap();
    let config = SluiceConfig::from_manager(&manager).unwrap();

    assert_eq!(config.database_url, "sqlite::memory:");
    assert_eq!(config.runtime_dir, PathBuf::from("/tmp/sluice-it"));
    assert_eq!(config.queue.max_executions, 3);
    assert_eq!(config.queue.name.as_deref(), Some("mail"));
    assert_eq!(config.mail.smtp_host.as_deref(), Some("localhost"));
    assert_eq!(config.queue.lock_file, "queue.lock");
}

#[test]
fn test_json_file_layer() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, r#"{{"queue": {{"kill_file": "stop.now"}}}}"#).unwrap();

    let manager = ConfigManager::new();
    manager.load_file_auto(file.path()).unwrap();
    let config = SluiceConfig::from_manager(&manager).unwrap();

    assert!(config.kill_path().ends_with("stop.now"));
}

#[test]
fn test_env_overrides_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[queue]\nsleep_ms = 10").unwrap();

    let manager = ConfigManager::with_prefix("SLUICE_IT_LAYER");
    manager.load_file_auto(file.path()).unwrap();

    unsafe {
        env::set_var("SLUICE_IT_LAYER_QUEUE__SLEEP_MS", "75");
    }
    manager.load_env().unwrap();
    unsafe {
        env::remove_var("SLUICE_IT_LAYER_QUEUE__SLEEP_MS");
    }

    let config = SluiceConfig::from_manager(&manager).unwrap();
    assert_eq!(config.queue.sleep_ms, 75);
}

#[test]
fn test_dotenv_file_does_not_override_environment() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "SLUICE_IT_DOTENV_QUEUE__NAME=from_file").unwrap();
    writeln!(file, "SLUICE_IT_DOTENV_DATABASE_URL=sqlite://dotenv.db").unwrap();

    unsafe {
        env::set_var("SLUICE_IT_DOTENV_QUEUE__NAME", "from_env");
    }

    let manager = ConfigManager::with_prefix("SLUICE_IT_DOTENV");
    manager.load_dotenv(Some(file.path())).unwrap();

    assert_eq!(manager.get_string("queue.name").unwrap(), "from_env");
    assert_eq!(manager.get_string("database_url").unwrap(), "sqlite://dotenv.db");

    unsafe {
        env::remove_var("SLUICE_IT_DOTENV_QUEUE__NAME");
        env::remove_var("SLUICE_IT_DOTENV_DATABASE_URL");
    }
}

#[test]
fn test_unknown_extension() {
    let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
    let manager = ConfigManager::new();
    assert!(matches!(
        manager.load_file_auto(file.path()),
        Err(ConfigError::LoadError(_))
    ));
}

#[test]
fn test_invalid_value_surfaces() {
    let manager = ConfigManager::new();
    manager.set("queue.sleep_ms", "soon").unwrap();
    assert!(SluiceConfig::from_manager(&manager).is_err());
}
