//! Immutable per-chain parameters handed to a plugin at construction.
//!
//! Chain ID and coin type may each be set at most once on the builder; a second call
//! fails with [`WalletError::AlreadySet`]. Once built, [`ChainParams`] never changes.
use serde::{Deserialize, Serialize};

use crate::blockchain::address::{AddressEncoding, ChainNetwork};
use crate::core::config::ChainConfig;
use crate::core::errors::WalletError;
use crate::crypto::bip44::{HdDerivationEngine, BIP44_PURPOSE};

pub const DEFAULT_CHAIN_ID: u64 = 1;
pub const DEFAULT_COIN_TYPE: u32 = 60;

/// Signing scheme family; selects the [`crate::blockchain::ChainSigner`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainFamily {
    Evm,
    Tron,
    Utxo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParams {
    pub name: String,
    pub family: ChainFamily,
    pub chain_id: u64,
    pub coin_type: u32,
    pub purpose: u32,
    pub network: ChainNetwork,
    pub address_encoding: AddressEncoding,
}

impl ChainParams {
    pub fn builder(name: impl Into<String>, family: ChainFamily) -> ChainParamsBuilder {
        ChainParamsBuilder::new(name, family)
    }

    pub fn engine(&self) -> HdDerivationEngine {
        HdDerivationEngine::new(self.purpose, self.coin_type)
    }

    /// Applies the overrides in `config` on top of the built-in preset for `config.name`.
    pub fn from_config(config: &ChainConfig) -> Result<Self, WalletError> {
        let mut builder = ChainParamsBuilder::preset(&config.name)
            .ok_or_else(|| WalletError::UnsupportedChain(config.name.clone()))?;
        if let Some(chain_id) = config.chain_id {
            builder.set_chain_id(chain_id)?;
        }
        if let Some(coin_type) = config.coin_type {
            builder.set_coin_type(coin_type)?;
        }
        if let Some(encoding) = config.address_encoding {
            builder.address_encoding(encoding);
        }
        builder.purpose(config.purpose).network(config.network);
        Ok(builder.build())
    }
}

#[derive(Debug, Clone)]
pub struct ChainParamsBuilder {
    name: String,
    family: ChainFamily,
    chain_id: Option<u64>,
    coin_type: Option<u32>,
    default_chain_id: u64,
    default_coin_type: u32,
    purpose: u32,
    network: ChainNetwork,
    address_encoding: AddressEncoding,
}

impl ChainParamsBuilder {
    pub fn new(name: impl Into<String>, family: ChainFamily) -> Self {
        let address_encoding = match family {
            ChainFamily::Evm => AddressEncoding::Evm,
            ChainFamily::Tron => AddressEncoding::Tron,
            ChainFamily::Utxo => AddressEncoding::P2shP2wpkh,
        };
        Self {
            name: name.into(),
            family,
            chain_id: None,
            coin_type: None,
            default_chain_id: DEFAULT_CHAIN_ID,
            default_coin_type: DEFAULT_COIN_TYPE,
            purpose: BIP44_PURPOSE,
            network: ChainNetwork::Mainnet,
            address_encoding,
        }
    }

    /// Defaults for the chains shipped with the crate. Presets do not count as "set".
    pub fn preset(name: &str) -> Option<Self> {
        let (family, chain_id, coin_type) = match name {
            "ethereum" => (ChainFamily::Evm, 1, 60),
            "tron" => (ChainFamily::Tron, 728_126_428, 195),
            "bitcoin" => (ChainFamily::Utxo, 0, 0),
            _ => return None,
        };
        let mut builder = Self::new(name, family);
        builder.default_chain_id = chain_id;
        builder.default_coin_type = coin_type;
        Some(builder)
    }

    pub fn set_chain_id(&mut self, chain_id: u64) -> Result<&mut Self, WalletError> {
        if self.chain_id.is_some() {
            return Err(WalletError::AlreadySet("chain_id"));
        }
        self.chain_id = Some(chain_id);
        Ok(self)
    }

    pub fn set_coin_type(&mut self, coin_type: u32) -> Result<&mut Self, WalletError> {
        if self.coin_type.is_some() {
            return Err(WalletError::AlreadySet("coin_type"));
        }
        self.coin_type = Some(coin_type);
        Ok(self)
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id.unwrap_or(self.default_chain_id)
    }

    pub fn coin_type(&self) -> u32 {
        self.coin_type.unwrap_or(self.default_coin_type)
    }

    pub fn purpose(&mut self, purpose: u32) -> &mut Self {
        self.purpose = purpose;
        self
    }

    pub fn network(&mut self, network: ChainNetwork) -> &mut Self {
        self.network = network;
        self
    }

    pub fn address_encoding(&mut self, encoding: AddressEncoding) -> &mut Self {
        self.address_encoding = encoding;
        self
    }

    pub fn build(&self) -> ChainParams {
        ChainParams {
            name: self.name.clone(),
            family: self.family,
            chain_id: self.chain_id(),
            coin_type: self.coin_type(),
            purpose: self.purpose,
            network: self.network,
            address_encoding: self.address_encoding,
        }
    }
}
