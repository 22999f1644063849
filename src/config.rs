//! Configuration management

use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub news: NewsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served under /static (chart and map assets)
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

fn default_static_dir() -> String {
    "static".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// TTLs for the query cache. Each consumer picks its own window; the
/// defaults match how volatile each kind of result is.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Raw data queries (totals, sequences, listings)
    #[serde(default = "default_data_ttl_secs")]
    pub data_ttl_secs: u64,
    /// Derived geospatial aggregates
    #[serde(default = "default_geojson_ttl_secs")]
    pub geojson_ttl_secs: u64,
    /// News headline aggregation
    #[serde(default = "default_news_ttl_secs")]
    pub news_ttl_secs: u64,
}

fn default_data_ttl_secs() -> u64 {
    60
}

fn default_geojson_ttl_secs() -> u64 {
    15 * 60
}

fn default_news_ttl_secs() -> u64 {
    60 * 60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            data_ttl_secs: default_data_ttl_secs(),
            geojson_ttl_secs: default_geojson_ttl_secs(),
            news_ttl_secs: default_news_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn data_ttl(&self) -> Duration {
        Duration::from_secs(self.data_ttl_secs)
    }

    pub fn geojson_ttl(&self) -> Duration {
        Duration::from_secs(self.geojson_ttl_secs)
    }

    pub fn news_ttl(&self) -> Duration {
        Duration::from_secs(self.news_ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewsConfig {
    /// News API key; headlines come back empty when unset
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_news_base_url")]
    pub base_url: String,
}

fn default_news_base_url() -> String {
    "https://newsapi.org".to_string()
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_news_base_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";

        let builder = config::Config::builder()
            .add_source(config::File::with_name(config_path))
            .add_source(config::Environment::with_prefix("CORONA"));

        let settings = builder.build()?;
        let config: Config = settings.try_deserialize()?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate server config
        if self.server.port == 0 {
            anyhow::bail!("Invalid port: 0 is not allowed");
        }
        if self.server.host.is_empty() {
            anyhow::bail!("Server host cannot be empty");
        }

        // Validate database config
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        // A zero TTL would turn the cache into a pass-through
        if self.cache.data_ttl_secs == 0
            || self.cache.geojson_ttl_secs == 0
            || self.cache.news_ttl_secs == 0
        {
            anyhow::bail!("Cache TTLs must be greater than zero");
        }

        // Validate logging level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid logging level '{}'. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            );
        }

        Ok(())
    }
}
