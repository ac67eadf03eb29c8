//! Name-keyed lookup of the chain plugins available to this process.
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::core::config::HdWalletConfig;
use crate::core::errors::WalletError;
use crate::plugin::chain_params::{ChainParams, ChainParamsBuilder};
use crate::plugin::{derivation_workers, ChainPlugin, SigningPlugin};

pub const BUILTIN_CHAINS: [&str; 3] = ["ethereum", "tron", "bitcoin"];

#[derive(Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, Arc<dyn SigningPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every built-in chain. The chain named in `config.chain` gets the
    /// configured overrides; the others use their presets. All plugins share one
    /// derivation pool sized by `pool.range_concurrency`.
    pub fn with_builtin(config: &HdWalletConfig) -> Result<Self, WalletError> {
        let workers = derivation_workers(config.pool.range_concurrency)?;
        let mut registry = Self::new();
        for name in BUILTIN_CHAINS {
            let params = if name == config.chain.name {
                ChainParams::from_config(&config.chain)?
            } else {
                match ChainParamsBuilder::preset(name) {
                    Some(builder) => builder.build(),
                    None => continue,
                }
            };
            let plugin = ChainPlugin::new(params, Arc::clone(&workers), &config.pool, config.mnemonic.words_count);
            registry.register(Arc::new(plugin))?;
        }
        if !registry.plugins.contains_key(&config.chain.name) {
            return Err(WalletError::UnsupportedChain(config.chain.name.clone()));
        }
        info!(chains = ?registry.names(), "chain plugins registered");
        Ok(registry)
    }

    pub fn register(&mut self, plugin: Arc<dyn SigningPlugin>) -> Result<(), WalletError> {
        let name = plugin.name().to_string();
        if self.plugins.contains_key(&name) {
            return Err(WalletError::ConfigError(format!("plugin {} registered twice", name)));
        }
        self.plugins.insert(name, plugin);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn SigningPlugin>, WalletError> {
        self.plugins
            .get(name)
            .cloned()
            .ok_or_else(|| WalletError::UnsupportedChain(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }

    pub fn plugins(&self) -> impl Iterator<Item = &Arc<dyn SigningPlugin>> {
        self.plugins.values()
    }
}
