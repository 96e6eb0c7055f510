use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const CONFIG_PATH_ENV: &str = "ARTI_STORE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "arti-store.yaml";

/// Top level configuration, read from a YAML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub checksum_cache: ChecksumCacheConfig,
    pub remote: RemoteConfig,
    pub storages: Vec<StorageConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}
impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksumCacheConfig {
    pub lifetime_secs: u64,
    pub sweep_interval_millis: u64,
}
impl Default for ChecksumCacheConfig {
    fn default() -> Self {
        ChecksumCacheConfig {
            lifetime_secs: 300,
            sweep_interval_millis: 60_000,
        }
    }
}
impl ChecksumCacheConfig {
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        // a zero interval would make tokio's interval panic
        Duration::from_millis(self.sweep_interval_millis.max(1))
    }
}

/// Timeouts and retry behavior for proxy repositories
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub max_retries: u32,
    pub initial_backoff_millis: u64,
    pub max_backoff_millis: u64,
    pub user_agent: String,
}
impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            connect_timeout_secs: 10,
            read_timeout_secs: 60,
            max_retries: 3,
            initial_backoff_millis: 200,
            max_backoff_millis: 5_000,
            // Maven Central returns a 403 without a user agent
            user_agent: concat!("arti-store/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
impl RemoteConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_millis)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_millis.max(self.initial_backoff_millis))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub id: String,
    /// `None` keeps the storage in memory
    #[serde(default)]
    pub basedir: Option<PathBuf>,
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub id: String,
    pub layout: String,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default, rename = "type")]
    pub repository_type: RepositoryTypeConfig,
    #[serde(default)]
    pub remote: Option<RemoteRepositoryConfig>,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub allows_redeployment: bool,
    #[serde(default = "default_true")]
    pub allows_delete: bool,
    #[serde(default)]
    pub trash_enabled: bool,
    #[serde(default = "default_true")]
    pub in_service: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyConfig {
    Release,
    Snapshot,
    #[default]
    Mixed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryTypeConfig {
    #[default]
    Hosted,
    Proxy,
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepositoryConfig {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl AppConfig {
    pub fn from_yaml(yaml: &str) -> anyhow::Result<AppConfig> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<AppConfig> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration from {}", path.display()))?;
        let config = AppConfig::from_yaml(&yaml)
            .with_context(|| format!("parsing configuration {}", path.display()))?;
        info!("loaded configuration from {} with {} storage(s)", path.display(), config.storages.len());
        Ok(config)
    }

    /// Loads the file named by `ARTI_STORE_CONFIG`, or `arti-store.yaml`. A missing default
    ///  file yields the default configuration, a missing explicitly configured file is an error.
    pub fn load() -> anyhow::Result<AppConfig> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => AppConfig::load_from(Path::new(&path)),
            Err(_) => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    AppConfig::load_from(path)
                }
                else {
                    warn!("no configuration file at {}, starting with defaults", path.display());
                    Ok(AppConfig::default())
                }
            }
        }
    }
}
