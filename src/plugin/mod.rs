//! Chain plugins: the seam where a new blockchain is added.
//!
//! A [`SigningPlugin`] reports its immutable [`ChainParams`], generates and validates
//! mnemonics, and turns a decrypted mnemonic into a [`PoolUnitHandle`]. The pool layer and
//! storage never look past this trait.
pub mod chain_params;
pub mod registry;
pub mod unit;

use std::sync::Arc;

use rayon::ThreadPool;
use secrecy::SecretString;
use serde::Serialize;
use uuid::Uuid;

use crate::blockchain::container::{ContainerSigner, DigestAlgorithm};
use crate::blockchain::ethereum::EvmSigner;
use crate::blockchain::traits::ChainSigner;
use crate::core::config::PoolConfig;
use crate::core::errors::WalletError;
use crate::crypto::mnemonic;

pub use chain_params::{ChainFamily, ChainParams, ChainParamsBuilder};
pub use registry::PluginRegistry;
pub use unit::{MnemonicUnit, PoolUnitHandle};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub plugin_name: String,
    pub version: &'static str,
}

pub trait SigningPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn build_info(&self) -> BuildInfo;

    fn chain_params(&self) -> &ChainParams;

    fn chain_id(&self) -> u64 {
        self.chain_params().chain_id
    }

    fn coin_type(&self) -> u32 {
        self.chain_params().coin_type
    }

    fn generate_mnemonic(&self) -> Result<SecretString, WalletError>;

    fn validate_mnemonic(&self, phrase: &str) -> bool;

    fn new_pool_unit(&self, wallet_uuid: Uuid, mnemonic: &str) -> Result<Box<dyn PoolUnitHandle>, WalletError>;
}

/// Builds the bounded pool used for range derivation.
pub fn derivation_workers(threads: usize) -> Result<Arc<ThreadPool>, WalletError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(|i| format!("hd-derive-{}", i))
        .build()
        .map(Arc::new)
        .map_err(|e| WalletError::InternalError(format!("derivation pool: {}", e)))
}

/// A plugin over the built-in derivation engine, parameterized by chain.
pub struct ChainPlugin {
    params: Arc<ChainParams>,
    signer: Arc<dyn ChainSigner>,
    workers: Arc<ThreadPool>,
    max_range_size: u32,
    words_count: usize,
}

impl ChainPlugin {
    pub fn new(
        params: ChainParams,
        workers: Arc<ThreadPool>,
        pool: &PoolConfig,
        words_count: usize,
    ) -> Self {
        let signer = signer_for(&params, pool);
        Self::with_signer(params, signer, workers, pool, words_count)
    }

    pub fn with_signer(
        params: ChainParams,
        signer: Arc<dyn ChainSigner>,
        workers: Arc<ThreadPool>,
        pool: &PoolConfig,
        words_count: usize,
    ) -> Self {
        Self {
            params: Arc::new(params),
            signer,
            workers,
            max_range_size: pool.max_range_size,
            words_count,
        }
    }
}

impl SigningPlugin for ChainPlugin {
    fn name(&self) -> &str {
        &self.params.name
    }

    fn build_info(&self) -> BuildInfo {
        BuildInfo {
            plugin_name: format!("{}-hdwallet-plugin", self.params.name),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    fn chain_params(&self) -> &ChainParams {
        &self.params
    }

    fn generate_mnemonic(&self) -> Result<SecretString, WalletError> {
        mnemonic::generate_mnemonic(self.words_count)
    }

    fn validate_mnemonic(&self, phrase: &str) -> bool {
        mnemonic::validate_mnemonic(phrase)
    }

    fn new_pool_unit(&self, wallet_uuid: Uuid, mnemonic: &str) -> Result<Box<dyn PoolUnitHandle>, WalletError> {
        let unit = MnemonicUnit::new(
            wallet_uuid,
            mnemonic,
            Arc::clone(&self.params),
            Arc::clone(&self.signer),
            Arc::clone(&self.workers),
            self.max_range_size,
        )?;
        Ok(Box::new(unit))
    }
}

fn signer_for(params: &ChainParams, pool: &PoolConfig) -> Arc<dyn ChainSigner> {
    match params.family {
        ChainFamily::Evm => Arc::new(EvmSigner::new(params.chain_id)),
        ChainFamily::Tron => Arc::new(
            ContainerSigner::new(DigestAlgorithm::Sha256, params.address_encoding, params.network)
                .with_max_inputs(pool.max_container_inputs),
        ),
        ChainFamily::Utxo => Arc::new(
            ContainerSigner::new(DigestAlgorithm::DoubleSha256, params.address_encoding, params.network)
                .with_max_inputs(pool.max_container_inputs),
        ),
    }
}
