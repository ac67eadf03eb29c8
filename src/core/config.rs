use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::blockchain::address::{AddressEncoding, ChainNetwork};
use crate::core::errors::WalletError;
use crate::crypto::bip44::BIP44_PURPOSE;
use crate::crypto::mnemonic::SUPPORTED_WORD_COUNTS;

/// Which chain plugin to run and its parameter overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Registry key of the chain plugin (`ethereum`, `tron`, `bitcoin`)
    #[serde(default = "ChainConfig::default_name")]
    pub name: String,

    /// Overrides the plugin's default chain ID
    #[serde(default)]
    pub chain_id: Option<u64>,

    /// Overrides the plugin's default SLIP-44 coin type
    #[serde(default)]
    pub coin_type: Option<u32>,

    #[serde(default = "ChainConfig::default_purpose")]
    pub purpose: u32,

    #[serde(default)]
    pub network: ChainNetwork,

    /// Overrides the plugin's default address encoding
    #[serde(default)]
    pub address_encoding: Option<AddressEncoding>,
}

impl ChainConfig {
    fn default_name() -> String { "ethereum".to_string() }
    fn default_purpose() -> u32 { BIP44_PURPOSE }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            chain_id: None,
            coin_type: None,
            purpose: Self::default_purpose(),
            network: ChainNetwork::default(),
            address_encoding: None,
        }
    }
}

/// Pool unit behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Idle period after which a loaded wallet is unloaded (seconds)
    #[serde(default = "PoolConfig::default_unload_interval_secs")]
    pub unload_interval_secs: u64,

    /// Worker threads used to derive address ranges
    #[serde(default = "PoolConfig::default_range_concurrency")]
    pub range_concurrency: usize,

    /// Largest number of addresses a single range request may ask for
    #[serde(default = "PoolConfig::default_max_range_size")]
    pub max_range_size: u32,

    /// Most inputs one container transaction may ask to have signed
    #[serde(default = "PoolConfig::default_max_container_inputs")]
    pub max_container_inputs: u32,
}

impl PoolConfig {
    fn default_unload_interval_secs() -> u64 { 8 }
    fn default_range_concurrency() -> usize { 4 }
    fn default_max_range_size() -> u32 { 10_000 }
    fn default_max_container_inputs() -> u32 { 256 }

    pub fn unload_interval(&self) -> Duration {
        Duration::from_secs(self.unload_interval_secs)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            unload_interval_secs: Self::default_unload_interval_secs(),
            range_concurrency: Self::default_range_concurrency(),
            max_range_size: Self::default_max_range_size(),
            max_container_inputs: Self::default_max_container_inputs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MnemonicConfig {
    #[serde(default = "MnemonicConfig::default_words_count")]
    pub words_count: usize,
}

impl MnemonicConfig {
    fn default_words_count() -> usize { 24 }
}

impl Default for MnemonicConfig {
    fn default() -> Self {
        Self { words_count: Self::default_words_count() }
    }
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "StorageConfig::default_database_url")]
    pub database_url: String,
    #[serde(default)]
    pub max_connections: Option<u32>,
}

impl StorageConfig {
    fn default_database_url() -> String { "sqlite::memory:".to_string() }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { database_url: Self::default_database_url(), max_connections: None }
    }
}

/// Top-level configuration, usually read from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdWalletConfig {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub mnemonic: MnemonicConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl HdWalletConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, WalletError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`, applies environment overrides, then validates.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            WalletError::ConfigError(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        let mut config: Self = toml::from_str(&raw)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Environment variables win over file values.
    pub fn apply_env_overrides(&mut self) -> Result<(), WalletError> {
        if let Ok(name) = std::env::var("HDWALLET_CHAIN") {
            self.chain.name = name;
        }
        if let Some(id) = env_parse::<u64>("HDWALLET_CHAIN_ID")? {
            self.chain.chain_id = Some(id);
        }
        if let Some(coin) = env_parse::<u32>("HDWALLET_COIN_TYPE")? {
            self.chain.coin_type = Some(coin);
        }
        if let Some(secs) = env_parse::<u64>("HDWALLET_UNLOAD_INTERVAL_SECS")? {
            self.pool.unload_interval_secs = secs;
        }
        if let Some(n) = env_parse::<usize>("HDWALLET_RANGE_CONCURRENCY")? {
            self.pool.range_concurrency = n;
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.storage.database_url = url;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), WalletError> {
        if self.chain.name.trim().is_empty() {
            return Err(WalletError::ConfigError("chain.name cannot be empty".into()));
        }
        if self.pool.unload_interval_secs == 0 {
            return Err(WalletError::ConfigError("pool.unload_interval_secs must be positive".into()));
        }
        if self.pool.range_concurrency == 0 {
            return Err(WalletError::ConfigError("pool.range_concurrency must be positive".into()));
        }
        if self.pool.max_range_size == 0 {
            return Err(WalletError::ConfigError("pool.max_range_size must be positive".into()));
        }
        if self.pool.max_container_inputs == 0 {
            return Err(WalletError::ConfigError("pool.max_container_inputs must be positive".into()));
        }
        if !SUPPORTED_WORD_COUNTS.contains(&self.mnemonic.words_count) {
            return Err(WalletError::ConfigError(format!(
                "mnemonic.words_count {} not in {:?}",
                self.mnemonic.words_count, SUPPORTED_WORD_COUNTS
            )));
        }
        if self.storage.database_url.is_empty() {
            return Err(WalletError::ConfigError("Database URL cannot be empty".into()));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, WalletError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| WalletError::ConfigError(format!("{} has an invalid value: {}", key, raw))),
        Err(_) => Ok(None),
    }
}
