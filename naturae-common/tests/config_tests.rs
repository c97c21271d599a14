//! Root folder resolution and config file loading
//!
//! These tests modify process environment variables and run serially.

use naturae_common::config::{self, Settings, TomlConfig, JWT_SECRET_ENV_VAR, ROOT_FOLDER_ENV_VARS};
use serial_test::serial;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn clear_env() {
    for name in ROOT_FOLDER_ENV_VARS {
        std::env::remove_var(name);
    }
    std::env::remove_var(JWT_SECRET_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_beats_config_file() {
    clear_env();
    std::env::set_var("NATURAE_ROOT", "/from/env");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..TomlConfig::default()
    };
    assert_eq!(config::resolve_root_folder(None, &config), PathBuf::from("/from/env"));

    std::env::set_var("NATURAE_ROOT_FOLDER", "/from/primary-env");
    assert_eq!(
        config::resolve_root_folder(None, &config),
        PathBuf::from("/from/primary-env")
    );

    assert_eq!(
        config::resolve_root_folder(Some(Path::new("/from/cli")), &config),
        PathBuf::from("/from/cli")
    );
    clear_env();
}

#[test]
#[serial]
fn test_config_file_then_default() {
    clear_env();

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..TomlConfig::default()
    };
    assert_eq!(config::resolve_root_folder(None, &config), PathBuf::from("/from/toml"));

    assert_eq!(
        config::resolve_root_folder(None, &TomlConfig::default()),
        config::default_root_folder()
    );
}

#[test]
#[serial]
fn test_missing_config_file_gives_defaults() {
    clear_env();
    let temp = TempDir::new().unwrap();
    let config = TomlConfig::load(&temp.path().join("absent.toml")).unwrap();
    assert_eq!(config.port, 5780);
    assert!(config.jwt_secret.is_empty());
}

#[test]
#[serial]
fn test_load_config_file_and_validate() {
    clear_env();
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("naturae.toml");
    std::fs::write(
        &path,
        r#"
        host = "0.0.0.0"
        jwt_secret = "file-secret"
        public_url = "https://naturae.example/"

        [external]
        timeout_secs = 5
        "#,
    )
    .unwrap();

    let config = TomlConfig::load(&path).unwrap();
    let settings = Settings::from_parts(temp.path().to_path_buf(), None, config);
    assert_eq!(settings.bind_addr, "0.0.0.0:5780");
    assert_eq!(settings.public_url, "https://naturae.example");
    assert_eq!(settings.jwt_secret, "file-secret");
    assert_eq!(settings.external.timeout_secs, 5);
    assert!(settings.validate().is_ok());

    settings.ensure_directories().unwrap();
    assert!(settings.media_dir.is_dir());
}

#[test]
#[serial]
fn test_jwt_secret_env_override_and_validation() {
    clear_env();
    let settings = Settings::from_parts(PathBuf::from("/data"), None, TomlConfig::default());
    assert!(settings.validate().is_err());

    std::env::set_var(JWT_SECRET_ENV_VAR, "env-secret");
    let settings = Settings::from_parts(PathBuf::from("/data"), None, TomlConfig::default());
    assert_eq!(settings.jwt_secret, "env-secret");
    assert!(settings.validate().is_ok());
    clear_env();
}

#[test]
#[serial]
fn test_malformed_config_file_is_an_error() {
    clear_env();
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("naturae.toml");
    std::fs::write(&path, "port = [").unwrap();
    assert!(TomlConfig::load(&path).is_err());
}
