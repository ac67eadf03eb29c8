//! Multi-chain HD wallet core: BIP32/BIP39/BIP44 derivation, per-chain address
//! encoding and signing, and the lazily loaded, idle-unloaded wallet pool unit.

pub mod blockchain;
pub mod core;
pub mod crypto;
pub mod plugin;
pub mod pool;
pub mod security;
pub mod storage;

pub use crate::core::config::HdWalletConfig;
pub use crate::core::errors::WalletError;
pub use crate::core::types::{AccountIdentity, DerivationAddressIdentity, MnemonicWalletRecord, RangeRequestUnit};
pub use crate::plugin::{PluginRegistry, SigningPlugin};
pub use crate::pool::{PoolUnitHost, UnitContext, WalletPoolUnit};
