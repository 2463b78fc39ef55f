use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub chain: ChainConfig,
    pub database: DatabaseConfig,
    pub general: GeneralConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain identifier used as key material, e.g. "1" or "42161"
    pub chain_id: String,
    pub http_url: String,
    pub ws_url: String,
    /// V3 factory address (getPool lookups)
    pub factory: String,
    /// NFT position manager address
    pub position_manager: String,
    /// Staking contract address, empty when the chain has no staker deployed
    #[serde(default)]
    pub staker: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub log_level: String,
}

/// Pools to resolve and monitor at startup. Alert targets come in through
/// the command surface at runtime; this section only seeds the watch list.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WatchConfig {
    #[serde(default)]
    pub pools: Vec<String>,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    250
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain: ChainConfig {
                chain_id: "1".to_string(),
                http_url: "http://localhost:8545".to_string(),
                ws_url: "ws://localhost:8546".to_string(),
                factory: "0x1F98431c8aD98523631AE4a59f267346ea31F984".to_string(),
                position_manager: "0xC36442b4a4522E871399CD717aBDD847Ab11FE88".to_string(),
                staker: String::new(),
                max_retries: default_max_retries(),
                retry_base_ms: default_retry_base_ms(),
            },
            database: DatabaseConfig {
                path: "poolwatch.db".to_string(),
            },
            general: GeneralConfig {
                log_level: "info".to_string(),
            },
            watch: WatchConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, writing a default template
    /// when the file does not exist yet.
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            let template = toml::to_string_pretty(&Config::default())
                .context("failed to serialize default config")?;
            fs::write(path, template)
                .with_context(|| format!("failed to write default config to {}", path))?;
            anyhow::bail!("no config found; wrote template to {} - fill it in and restart", path);
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.chain.chain_id.is_empty() {
            anyhow::bail!("chain.chain_id must not be empty");
        }
        if self.chain.http_url.is_empty() || self.chain.ws_url.is_empty() {
            anyhow::bail!("chain.http_url and chain.ws_url are required");
        }
        if self.chain.position_manager.is_empty() {
            anyhow::bail!("chain.position_manager is required");
        }
        Ok(())
    }
}
