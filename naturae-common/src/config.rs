//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`NATURAE_ROOT_FOLDER`, then `NATURAE_ROOT`)
//! 3. `root_folder` key in the TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing config file is not an error: every key has a default and the
//! service starts with a warning.

use crate::quota::QuotaLimits;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variables consulted for the root folder, in priority order
pub const ROOT_FOLDER_ENV_VARS: [&str; 2] = ["NATURAE_ROOT_FOLDER", "NATURAE_ROOT"];

/// Environment variable that overrides `jwt_secret` from the config file
pub const JWT_SECRET_ENV_VAR: &str = "NATURAE_JWT_SECRET";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "naturae.db";

/// Uploaded media folder inside the root folder
pub const MEDIA_FOLDER: &str = "media";

/// Auth provider settings (GoTrue-compatible REST endpoint)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Base URL, e.g. `https://project.example.co/auth/v1`
    pub url: String,
    /// Public API key sent as `apikey` header
    pub api_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:9999".to_string(),
            api_key: String::new(),
        }
    }
}

/// External data sources proxied by the service
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExternalConfig {
    pub gbif_url: String,
    /// Contains `{lang}` which is replaced by the requested language
    pub wikipedia_url: String,
    pub xeno_canto_url: String,
    pub xeno_canto_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            gbif_url: "https://api.gbif.org/v1".to_string(),
            wikipedia_url: "https://{lang}.wikipedia.org/api/rest_v1".to_string(),
            xeno_canto_url: "https://xeno-canto.org".to_string(),
            xeno_canto_key: None,
            timeout_secs: 15,
        }
    }
}

/// Contents of the TOML config file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// Origin the client is served from; redirects are relative to it
    pub public_url: String,
    pub jwt_secret: String,
    pub auth: AuthConfig,
    pub external: ExternalConfig,
    pub quota: QuotaLimits,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            host: "127.0.0.1".to_string(),
            port: 5780,
            log_level: "info".to_string(),
            public_url: String::new(),
            jwt_secret: String::new(),
            auth: AuthConfig::default(),
            external: ExternalConfig::default(),
            quota: QuotaLimits::default(),
        }
    }
}

impl TomlConfig {
    /// Load config from `path`; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse config file contents
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Resolved runtime settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub root_folder: PathBuf,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    pub bind_addr: String,
    pub log_level: String,
    pub public_url: String,
    pub jwt_secret: String,
    pub auth: AuthConfig,
    pub external: ExternalConfig,
    pub quota: QuotaLimits,
}

impl Settings {
    /// Combine the resolved root folder, CLI overrides and file config
    pub fn from_parts(root_folder: PathBuf, port_override: Option<u16>, config: TomlConfig) -> Self {
        let port = port_override.unwrap_or(config.port);
        let jwt_secret = std::env::var(JWT_SECRET_ENV_VAR).unwrap_or(config.jwt_secret);

        Self {
            db_path: root_folder.join(DATABASE_FILE),
            media_dir: root_folder.join(MEDIA_FOLDER),
            root_folder,
            bind_addr: format!("{}:{}", config.host, port),
            log_level: config.log_level,
            public_url: config.public_url.trim_end_matches('/').to_string(),
            jwt_secret,
            auth: config.auth,
            external: config.external,
            quota: config.quota,
        }
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.is_empty() {
            return Err(Error::Config(format!(
                "jwt_secret is empty; set it in the config file or {}",
                JWT_SECRET_ENV_VAR
            )));
        }
        if self.quota.max_upload_bytes <= 0 {
            return Err(Error::Config("quota.max_upload_bytes must be positive".to_string()));
        }
        Ok(())
    }

    /// Create root and media folders if missing
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        std::fs::create_dir_all(&self.media_dir)?;
        Ok(())
    }
}

/// Resolve the root folder following the priority order above
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    for name in ROOT_FOLDER_ENV_VARS {
        if let Ok(path) = std::env::var(name) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Default config file location (`~/.config/naturae/config.toml` on Linux)
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("naturae").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("/etc/naturae/config.toml"))
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("naturae"))
        .unwrap_or_else(|| PathBuf::from("./naturae_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_config_keeps_defaults() {
        let config = TomlConfig::parse(
            r#"
            port = 8080
            jwt_secret = "s3cret"

            [quota]
            free_bytes = 1000
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.quota.free_bytes, 1000);
        assert_eq!(config.quota.pro_bytes, QuotaLimits::default().pro_bytes);
        assert_eq!(config.external.gbif_url, "https://api.gbif.org/v1");
    }

    #[test]
    fn test_parse_rejects_wrong_types() {
        assert!(TomlConfig::parse("port = \"abc\"").is_err());
    }

    #[test]
    fn test_cli_argument_wins() {
        let config = TomlConfig {
            root_folder: Some(PathBuf::from("/from/toml")),
            ..TomlConfig::default()
        };
        let root = resolve_root_folder(Some(Path::new("/from/cli")), &config);
        assert_eq!(root, PathBuf::from("/from/cli"));
    }

    #[test]
    fn test_settings_paths_and_port_override() {
        let settings = Settings::from_parts(PathBuf::from("/data"), Some(9000), TomlConfig::default());
        assert_eq!(settings.db_path, PathBuf::from("/data/naturae.db"));
        assert_eq!(settings.media_dir, PathBuf::from("/data/media"));
        assert_eq!(settings.bind_addr, "127.0.0.1:9000");
    }
}
