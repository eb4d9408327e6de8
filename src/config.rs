//! Service configuration for academia

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the config file inside the service root
pub const CONFIG_FILE: &str = "academia.toml";

/// Configuration for one academia deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database file, relative to the root
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Address the REST service listens on
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Directory for uploaded assignment files, relative to the root
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Cap on rows returned by management listings
    #[serde(default = "default_listing_limit")]
    pub listing_limit: usize,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub import: ImportConfig,
}

/// Credential and token settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for bearer tokens
    #[serde(default)]
    pub token_secret: String,

    /// Token lifetime in minutes
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,

    /// PBKDF2 rounds for new password hashes
    #[serde(default = "default_hash_iterations")]
    pub hash_iterations: u32,
}

/// Bulk import settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Rows per committed transaction
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("academia.db")
}

fn default_bind_address() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_listing_limit() -> usize {
    100
}

fn default_token_ttl_minutes() -> i64 {
    60
}

fn default_hash_iterations() -> u32 {
    260_000
}

fn default_batch_size() -> usize {
    100
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: String::new(),
            token_ttl_minutes: default_token_ttl_minutes(),
            hash_iterations: default_hash_iterations(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            bind_address: default_bind_address(),
            upload_dir: default_upload_dir(),
            listing_limit: default_listing_limit(),
            auth: AuthConfig::default(),
            import: ImportConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the root or return defaults
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            let config: AppConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the root
    pub fn save(&self, root: &Path) -> Result<()> {
        std::fs::create_dir_all(root)?;

        let config_path = root.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Fresh defaults with a random token secret
    pub fn generate() -> Self {
        let mut config = Self::default();
        config.auth.token_secret = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );
        config
    }

    pub fn database_path(&self, root: &Path) -> PathBuf {
        root.join(&self.database_path)
    }

    pub fn upload_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.upload_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.bind_address, "127.0.0.1:8000");
        assert_eq!(config.auth.token_ttl_minutes, 60);
        assert_eq!(config.import.batch_size, 100);
        assert!(config.auth.token_secret.is_empty());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            bind_address = "0.0.0.0:9000"

            [auth]
            token_secret = "s3cret"
            "#,
        )
        .unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:9000");
        assert_eq!(config.auth.token_secret, "s3cret");
        assert_eq!(config.auth.hash_iterations, 260_000);
        assert_eq!(config.listing_limit, 100);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::generate();
        config.save(dir.path()).unwrap();

        let loaded = AppConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(loaded.auth.token_secret, config.auth.token_secret);
        assert_eq!(loaded.auth.token_secret.len(), 64);
        assert_eq!(
            loaded.database_path(dir.path()),
            dir.path().join("academia.db")
        );
    }
}
