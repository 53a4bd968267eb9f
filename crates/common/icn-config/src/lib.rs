use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the announcer config file.
pub const CONFIG_PATH_ENV: &str = "ICN_PROVIDER_CONFIG";

/// Config file used when `ICN_PROVIDER_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "provider.toml";

/// Top-level configuration for the CID announcement pipeline.
#[derive(Deserialize, Debug, Clone)]
pub struct AnnouncerConfig {
    pub store: StoreConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub reprovider: ReproviderConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf, // sled database directory
}

#[derive(Deserialize, Debug, Clone)]
pub struct QueueConfig {
    /// Key prefix of the queue inside the store, so several queues can share one database.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
        }
    }
}

fn default_namespace() -> String {
    "provider-v1/queue".to_string()
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ProviderConfig {
    /// Upper bound for a single announcement. Absent or zero means no bound.
    pub announce_timeout_secs: Option<u64>,
}

impl ProviderConfig {
    pub fn announce_timeout(&self) -> Option<Duration> {
        self.announce_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ReproviderConfig {
    /// Seconds between reprovide passes. Zero disables periodic reproviding.
    #[serde(default = "default_reprovide_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ReproviderConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_reprovide_interval_secs(),
        }
    }
}

fn default_reprovide_interval_secs() -> u64 {
    12 * 60 * 60
}

impl ReproviderConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Resolve the config path from `ICN_PROVIDER_CONFIG`, falling back to `provider.toml`.
pub fn config_path_from_env() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub fn parse_announcer_config(content: &str) -> anyhow::Result<AnnouncerConfig> {
    toml::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse TOML config: {}", e))
}

pub fn load_announcer_config<P: AsRef<Path>>(path: P) -> anyhow::Result<AnnouncerConfig> {
    let path = path.as_ref();
    let config_content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file from {}: {}", path.display(), e))?;
    let config: AnnouncerConfig = toml::from_str(&config_content)
        .map_err(|e| anyhow::anyhow!("Failed to parse TOML config from {}: {}", path.display(), e))?;
    Ok(config)
}

/// Load the config file named by `ICN_PROVIDER_CONFIG` (or `provider.toml`).
pub fn load_announcer_config_from_env() -> anyhow::Result<AnnouncerConfig> {
    load_announcer_config(config_path_from_env())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_announcer_config(
            r#"
            [store]
            path = "./data/provider"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.path, PathBuf::from("./data/provider"));
        assert_eq!(config.queue.namespace, "provider-v1/queue");
        assert_eq!(config.provider.announce_timeout(), None);
        assert_eq!(config.reprovider.interval(), Duration::from_secs(43200));
    }

    #[test]
    fn test_full_config() {
        let config = parse_announcer_config(
            r#"
            [store]
            path = "/var/lib/icn/provider"

            [queue]
            namespace = "node-a/queue"

            [provider]
            announce_timeout_secs = 30

            [reprovider]
            interval_secs = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.queue.namespace, "node-a/queue");
        assert_eq!(config.provider.announce_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.reprovider.interval(), Duration::ZERO);
    }

    #[test]
    fn test_zero_timeout_means_unbounded() {
        let provider = ProviderConfig {
            announce_timeout_secs: Some(0),
        };
        assert_eq!(provider.announce_timeout(), None);
    }

    #[test]
    fn test_missing_store_section_is_rejected() {
        let err = parse_announcer_config("[queue]\nnamespace = \"q\"\n").unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML config"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[store]\npath = \"db\"\n[provider]\nannounce_timeout_secs = 5").unwrap();

        let config = load_announcer_config(file.path()).unwrap();
        assert_eq!(config.store.path, PathBuf::from("db"));
        assert_eq!(config.provider.announce_timeout(), Some(Duration::from_secs(5)));

        assert!(load_announcer_config("/definitely/not/here.toml").is_err());
    }

    #[test]
    fn test_load_from_env_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[store]\npath = \"env-db\"").unwrap();

        std::env::set_var(CONFIG_PATH_ENV, file.path());
        let config = load_announcer_config_from_env().unwrap();
        std::env::remove_var(CONFIG_PATH_ENV);

        assert_eq!(config.store.path, PathBuf::from("env-db"));
        assert_eq!(config_path_from_env(), PathBuf::from(DEFAULT_CONFIG_PATH));
    }
}
