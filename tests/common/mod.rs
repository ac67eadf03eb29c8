#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use hdwallet_pool::core::config::{HdWalletConfig, PoolConfig};
use hdwallet_pool::crypto::envelope::{AesGcmEnvelope, SecretDecryptor};
use hdwallet_pool::crypto::mnemonic::mnemonic_hash;
use hdwallet_pool::plugin::{derivation_workers, ChainParamsBuilder, ChainPlugin, SigningPlugin};
use hdwallet_pool::security::{SecretBuffer, SecretVec};
use hdwallet_pool::storage::InMemoryWalletRepository;
use hdwallet_pool::{MnemonicWalletRecord, UnitContext, WalletError, WalletPoolUnit};

pub const PHRASE: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

pub const ETH_ADDRESS_0: &str = "0x9858EfFD232B4033E47d90003D41EC34EcaEda94";

/// Counts decrypt calls so tests can observe lazy loading.
pub struct CountingDecryptor {
    inner: AesGcmEnvelope,
    pub calls: AtomicUsize,
}

impl CountingDecryptor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretDecryptor for CountingDecryptor {
    async fn decrypt(&self, encrypted: &[u8]) -> Result<SecretVec, WalletError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.decrypt(encrypted).await
    }
}

pub fn envelope() -> AesGcmEnvelope {
    AesGcmEnvelope::new(SecretBuffer::new([0x5A; 32]))
}

pub fn plugin(chain: &str) -> Arc<dyn SigningPlugin> {
    let params = ChainParamsBuilder::preset(chain).expect("preset").build();
    let workers = derivation_workers(4).expect("workers");
    Arc::new(ChainPlugin::new(params, workers, &PoolConfig::default(), 12))
}

pub fn record(wallet_uuid: Uuid, mnemonic_uuid: Uuid, phrase: &str) -> MnemonicWalletRecord {
    let now = Utc::now();
    MnemonicWalletRecord {
        id: 0,
        wallet_uuid,
        mnemonic_uuid,
        mnemonic_hash: mnemonic_hash(phrase.as_bytes()),
        encrypted_mnemonic: envelope().seal(phrase.as_bytes()).expect("seal"),
        is_hot: true,
        is_enabled: true,
        created_at: now,
        updated_at: now,
    }
}

pub struct Fixture {
    pub repository: Arc<InMemoryWalletRepository>,
    pub decryptor: Arc<CountingDecryptor>,
    pub ctx: UnitContext,
    pub wallet_uuid: Uuid,
    pub mnemonic_uuid: Uuid,
}

impl Fixture {
    pub fn new(chain: &str, unload_interval: Duration) -> Self {
        let repository = Arc::new(InMemoryWalletRepository::new());
        let decryptor = Arc::new(CountingDecryptor { inner: envelope(), calls: AtomicUsize::new(0) });
        let wallet_uuid = Uuid::new_v4();
        let mnemonic_uuid = Uuid::new_v4();
        repository.insert(record(wallet_uuid, mnemonic_uuid, PHRASE));
        let ctx = UnitContext {
            plugin: plugin(chain),
            repository: repository.clone(),
            decryptor: decryptor.clone(),
            unload_interval,
        };
        Self { repository, decryptor, ctx, wallet_uuid, mnemonic_uuid }
    }

    pub fn ethereum() -> Self {
        Self::new("ethereum", HdWalletConfig::default().pool.unload_interval())
    }

    pub fn unit(&self) -> Arc<WalletPoolUnit> {
        WalletPoolUnit::new(self.wallet_uuid, self.mnemonic_uuid, self.ctx.clone())
    }
}
