use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::embedding::Pooling;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ShelfvecConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `"local"`, `"remote"` or `"disabled"`.
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
    /// Length of every stored vector. The catalog schema is created with it.
    pub dimensions: usize,
    pub timeout_ms: u64,
    pub pooling: Pooling,
    pub normalize: bool,
    /// Base URL of an OpenAI-compatible embeddings API (remote provider only).
    pub base_url: String,
    /// Name of the environment variable holding the remote API key.
    pub api_key_env: String,
    /// Send `dimensions` in remote requests. Only for models whose output
    /// length is adjustable (e.g. `text-embedding-3-*`).
    pub send_dimensions: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8787,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_shelfvec_dir()
            .join("catalog.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_shelfvec_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
            dimensions: 384,
            timeout_ms: 10_000,
            pooling: Pooling::Mean,
            normalize: true,
            base_url: "https://api.openai.com/v1".into(),
            api_key_env: "SHELFVEC_EMBEDDING_API_KEY".into(),
            send_dimensions: false,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Returns `~/.shelfvec/`, or `./.shelfvec/` when no home directory is known.
pub fn default_shelfvec_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".shelfvec")
}

/// Returns the default config file path: `~/.shelfvec/config.toml`
pub fn default_config_path() -> PathBuf {
    default_shelfvec_dir().join("config.toml")
}

impl ShelfvecConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            ShelfvecConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides (SHELFVEC_DB, SHELFVEC_LOG_LEVEL,
    /// SHELFVEC_EMBEDDING_PROVIDER, SHELFVEC_BIND).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SHELFVEC_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("SHELFVEC_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("SHELFVEC_EMBEDDING_PROVIDER") {
            self.embedding.provider = val;
        }
        if let Ok(val) = std::env::var("SHELFVEC_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                match port.parse() {
                    Ok(port) => {
                        self.server.host = host.to_string();
                        self.server.port = port;
                    }
                    Err(_) => {
                        tracing::warn!(value = %val, "ignoring SHELFVEC_BIND with invalid port")
                    }
                }
            }
        }
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.embedding.dimensions > 0,
            "embedding.dimensions must be greater than zero"
        );
        anyhow::ensure!(
            self.embedding.timeout_ms > 0,
            "embedding.timeout_ms must be greater than zero"
        );
        Ok(())
    }

    /// Resolve the catalog database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ShelfvecConfig::default();
        assert_eq!(config.server.port, 8787);
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.embedding.provider, "local");
        assert_eq!(config.embedding.dimensions, 384);
        assert_eq!(config.embedding.pooling, Pooling::Mean);
        assert!(config.embedding.normalize);
        assert!(!config.embedding.send_dimensions);
        assert!(config.storage.db_path.ends_with("catalog.db"));
        config.validate().unwrap();
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"
port = 9000

[storage]
db_path = "/tmp/catalog-test.db"

[embedding]
provider = "remote"
model = "text-embedding-3-small"
dimensions = 1536
timeout_ms = 2500
send_dimensions = true
"#;
        let config: ShelfvecConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.db_path, "/tmp/catalog-test.db");
        assert_eq!(config.embedding.provider, "remote");
        assert_eq!(config.embedding.dimensions, 1536);
        assert_eq!(config.embedding.timeout(), Duration::from_millis(2500));
        assert!(config.embedding.send_dimensions);
        // defaults still apply for unset fields
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.embedding.api_key_env, "SHELFVEC_EMBEDDING_API_KEY");
    }

    #[test]
    fn zero_dimensions_rejected() {
        let mut config = ShelfvecConfig::default();
        config.embedding.dimensions = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = ShelfvecConfig::default();
        std::env::set_var("SHELFVEC_DB", "/tmp/override.db");
        std::env::set_var("SHELFVEC_LOG_LEVEL", "trace");
        std::env::set_var("SHELFVEC_EMBEDDING_PROVIDER", "disabled");
        std::env::set_var("SHELFVEC_BIND", "0.0.0.0:3000");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.server.log_level, "trace");
        assert_eq!(config.embedding.provider, "disabled");
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");

        // Clean up
        std::env::remove_var("SHELFVEC_DB");
        std::env::remove_var("SHELFVEC_LOG_LEVEL");
        std::env::remove_var("SHELFVEC_EMBEDDING_PROVIDER");
        std::env::remove_var("SHELFVEC_BIND");
    }

    #[test]
    fn expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/var/lib/catalog.db"), PathBuf::from("/var/lib/catalog.db"));
    }
}
