use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub network: NetworkConfig,

    pub providers: ProvidersConfig,

    pub downloads: DownloadsConfig,

    pub conversion: ConversionConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    /// Root directory for runtime state (download records, temp files).
    pub data_dir: String,

    /// Event bus buffer size (default: 100)
    pub event_bus_buffer_size: usize,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            data_dir: "./data".to_string(),
            event_bus_buffer_size: 100,
            worker_threads: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Per-request timeout in seconds (default: 30)
    pub timeout_seconds: u64,

    /// Total attempts per request, first try included (default: 3)
    pub max_retry_attempts: u32,

    /// Fixed pause between attempts in milliseconds (default: 1000)
    pub retry_delay_ms: u64,

    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            max_retry_attempts: 3,
            retry_delay_ms: 1000,
            user_agent: format!("vidarr/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Name of the provider used for browsing and resolution.
    pub active: String,

    pub tmdb: TmdbConfig,

    pub streamvault: StreamVaultConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            active: "tmdb".to_string(),
            tmdb: TmdbConfig::default(),
            streamvault: StreamVaultConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    pub base_url: String,

    pub image_base_url: String,

    pub api_key: String,

    /// Embed hosts tried in order when building playback pages.
    /// `{host}/embed/movie/{id}` and `{host}/embed/tv/{id}/{season}/{episode}`.
    pub embed_hosts: Vec<String>,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.themoviedb.org/3".to_string(),
            image_base_url: "https://image.tmdb.org/t/p/w500".to_string(),
            api_key: String::new(),
            embed_hosts: vec!["https://vidsrc.example".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamVaultConfig {
    pub base_url: String,
}

impl Default for StreamVaultConfig {
    fn default() -> Self {
        Self {
            base_url: "https://streamvault.app".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadsConfig {
    /// Directory completed and in-progress files land in.
    pub directory: String,

    /// Admission cap: how many transfers run at once (default: 3)
    pub max_concurrent: usize,

    /// Scheduler tick in seconds; also the snapshot cadence (default: 2)
    pub tick_seconds: u64,

    /// Seconds without byte progress before a transfer counts as stalled
    /// (default: 60)
    pub stall_timeout_seconds: u64,

    /// Automatic retries per download for transient transfer failures
    /// (default: 3)
    pub max_transfer_retries: u32,

    /// Download records file, relative to `general.data_dir` unless absolute.
    pub store_file: String,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            directory: "./downloads".to_string(),
            max_concurrent: 3,
            tick_seconds: 2,
            stall_timeout_seconds: 60,
            max_transfer_retries: 3,
            store_file: "downloads.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Remove the segmented package after a successful conversion.
    pub delete_original: bool,

    pub output_extension: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            delete_original: true,
            output_extension: "ts".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 6210,
            cors_allowed_origins: vec![
                "http://localhost:6210".to_string(),
                "http://127.0.0.1:6210".to_string(),
            ],
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            network: NetworkConfig::default(),
            providers: ProvidersConfig::default(),
            downloads: DownloadsConfig::default(),
            conversion: ConversionConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::config_paths().iter().find(|p| p.exists()) {
            info!("Loading config from: {}", path.display());
            return Self::load_from_path(path);
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::default_config_path();
        self.save_to_path(&path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("vidarr").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".vidarr").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.network.max_retry_attempts == 0 {
            anyhow::bail!("network.max_retry_attempts must be at least 1");
        }

        if self.downloads.max_concurrent == 0 {
            anyhow::bail!("downloads.max_concurrent must be at least 1");
        }

        if self.downloads.tick_seconds == 0 {
            anyhow::bail!("downloads.tick_seconds must be at least 1");
        }

        if self.providers.active.is_empty() {
            anyhow::bail!("providers.active cannot be empty");
        }

        Ok(())
    }

    /// Absolute path of the download records file.
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        let store = Path::new(&self.downloads.store_file);
        if store.is_absolute() {
            store.to_path_buf()
        } else {
            Path::new(&self.general.data_dir).join(store)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.max_retry_attempts, 3);
        assert_eq!(config.downloads.max_concurrent, 3);
        assert_eq!(config.providers.active, "tmdb");
        assert_eq!(config.downloads.tick_seconds, 2);
        assert!(config.conversion.delete_original);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[network]"));
        assert!(toml_str.contains("[downloads]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [downloads]
            max_concurrent = 1
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.downloads.max_concurrent, 1);

        assert_eq!(config.network.timeout_seconds, 30);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.downloads.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_path_resolution() {
        let config = Config::default();
        assert_eq!(config.store_path(), PathBuf::from("./data/downloads.json"));

        let mut config = Config::default();
        config.downloads.store_file = "/var/lib/vidarr/downloads.json".to_string();
        assert_eq!(
            config.store_path(),
            PathBuf::from("/var/lib/vidarr/downloads.json")
        );
    }
}
