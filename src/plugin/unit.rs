//! The pool-unit handle a plugin returns for one decrypted mnemonic.
//!
//! A [`MnemonicUnit`] owns the master [`KeyBundle`] and the [`AddressCache`]. Every
//! operation takes the unit's lock for its whole duration, so nothing ever observes a
//! half-cleared key. Range derivation fans out over a bounded rayon pool while the lock
//! is held; results are written to the cache afterwards by the calling thread.
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::blockchain::address::key_bundle_address;
use crate::blockchain::traits::ChainSigner;
use crate::core::errors::WalletError;
use crate::core::types::{AccountIdentity, DerivationAddressIdentity, RangeRequestUnit};
use crate::crypto::bip44::{DerivationPath, HdDerivationEngine};
use crate::crypto::hd_key::KeyBundle;
use crate::crypto::mnemonic::mnemonic_to_seed;
use crate::plugin::chain_params::ChainParams;
use crate::pool::cache::{AddressCache, AddressCacheEntry};

/// Operations a chain plugin exposes on a loaded mnemonic.
pub trait PoolUnitHandle: Send + Sync {
    /// Clears the cache and the master key. Idempotent.
    fn unload_wallet(&self);

    fn wallet_uuid(&self) -> Uuid;

    /// Derives (or finds) the address at `identity` and keeps its key cached.
    fn load_account(&self, identity: &DerivationAddressIdentity) -> Result<AccountIdentity, WalletError>;

    fn get_account_address(&self, identity: &DerivationAddressIdentity) -> Result<String, WalletError>;

    /// Addresses for every index of every range, ranges in request order and indices
    /// ascending within each range. Returns the total count alongside.
    fn get_multiple_accounts(
        &self,
        ranges: &[RangeRequestUnit],
    ) -> Result<(usize, Vec<AccountIdentity>), WalletError>;

    /// Signs `payload` with the key at `identity`; returns `(address, signed_bytes)`.
    fn sign_data(
        &self,
        identity: &DerivationAddressIdentity,
        payload: &[u8],
    ) -> Result<(String, Vec<u8>), WalletError>;

    fn account_extended_public_key(&self, account: u32) -> Result<String, WalletError>;

    fn cached_addresses(&self) -> usize;

    fn is_unloaded(&self) -> bool;
}

struct UnitState {
    root: Option<KeyBundle>,
    cache: AddressCache,
}

pub struct MnemonicUnit {
    wallet_uuid: Uuid,
    params: Arc<ChainParams>,
    engine: HdDerivationEngine,
    signer: Arc<dyn ChainSigner>,
    workers: Arc<ThreadPool>,
    max_range_size: u32,
    state: Mutex<UnitState>,
}

impl MnemonicUnit {
    pub fn new(
        wallet_uuid: Uuid,
        mnemonic: &str,
        params: Arc<ChainParams>,
        signer: Arc<dyn ChainSigner>,
        workers: Arc<ThreadPool>,
        max_range_size: u32,
    ) -> Result<Self, WalletError> {
        let seed = mnemonic_to_seed(mnemonic)?;
        let root = KeyBundle::master_from_seed(&seed[..], params.network.key_params())?;
        Ok(Self {
            wallet_uuid,
            engine: params.engine(),
            params,
            signer,
            workers,
            max_range_size,
            state: Mutex::new(UnitState { root: Some(root), cache: AddressCache::new() }),
        })
    }

    pub fn chain_params(&self) -> &ChainParams {
        &self.params
    }

    fn resolve<'a>(
        &self,
        state: &'a mut UnitState,
        path: &DerivationPath,
    ) -> Result<&'a AddressCacheEntry, WalletError> {
        let UnitState { root, cache } = state;
        let root = root.as_ref().ok_or(WalletError::KeyCleared)?;
        if cache.contains(path) {
            debug!(wallet_uuid = %self.wallet_uuid, path = %path.cache_key(), "address cache hit");
            return cache
                .get(path)
                .ok_or_else(|| WalletError::InternalError("cache entry vanished".into()));
        }
        let entry = derive_entry(&self.engine, &self.params, root, path)?;
        Ok(cache.insert(path, entry))
    }

    /// The whole request, not each range, is capped at `max_range_size` addresses.
    /// Reports the range that crosses the cap.
    fn check_ranges(&self, ranges: &[RangeRequestUnit]) -> Result<(), WalletError> {
        let mut total: u32 = 0;
        for range in ranges {
            total = total.saturating_add(range.count()?);
            if total > self.max_range_size {
                return Err(WalletError::InvalidRange {
                    from: range.address_index_from,
                    to: range.address_index_to,
                });
            }
        }
        Ok(())
    }
}

impl PoolUnitHandle for MnemonicUnit {
    fn unload_wallet(&self) {
        let mut state = self.state.lock();
        state.cache.clear();
        if let Some(mut root) = state.root.take() {
            root.clear_secrets();
            info!(wallet_uuid = %self.wallet_uuid, chain = %self.params.name, "mnemonic unit unloaded");
        }
    }

    fn wallet_uuid(&self) -> Uuid {
        self.wallet_uuid
    }

    fn load_account(&self, identity: &DerivationAddressIdentity) -> Result<AccountIdentity, WalletError> {
        let mut state = self.state.lock();
        let entry = self.resolve(&mut state, &(*identity).into())?;
        Ok(AccountIdentity { parameters: *identity, address: entry.address().to_string() })
    }

    fn get_account_address(&self, identity: &DerivationAddressIdentity) -> Result<String, WalletError> {
        let mut state = self.state.lock();
        Ok(self.resolve(&mut state, &(*identity).into())?.address().to_string())
    }

    fn get_multiple_accounts(
        &self,
        ranges: &[RangeRequestUnit],
    ) -> Result<(usize, Vec<AccountIdentity>), WalletError> {
        self.check_ranges(ranges)?;
        let paths: Vec<DerivationPath> = ranges
            .iter()
            .map(RangeRequestUnit::paths)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect();

        let mut guard = self.state.lock();
        let UnitState { root, cache } = &mut *guard;
        let root = root.as_ref().ok_or(WalletError::KeyCleared)?;

        let mut misses: Vec<DerivationPath> = paths.iter().filter(|p| !cache.contains(p)).copied().collect();
        misses.sort_unstable();
        misses.dedup();

        let engine = &self.engine;
        let params = &*self.params;
        let derived = self.workers.install(|| {
            misses
                .par_iter()
                .map(|path| derive_entry(engine, params, root, path).map(|entry| (*path, entry)))
                .collect::<Result<Vec<_>, WalletError>>()
        })?;
        debug!(
            wallet_uuid = %self.wallet_uuid,
            requested = paths.len(),
            derived = derived.len(),
            "derived address range"
        );
        for (path, entry) in derived {
            cache.insert(&path, entry);
        }

        let accounts = paths
            .iter()
            .map(|path| {
                cache
                    .get(path)
                    .map(|entry| AccountIdentity {
                        parameters: (*path).into(),
                        address: entry.address().to_string(),
                    })
                    .ok_or_else(|| WalletError::InternalError(format!("missing cache entry {}", path.cache_key())))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((accounts.len(), accounts))
    }

    fn sign_data(
        &self,
        identity: &DerivationAddressIdentity,
        payload: &[u8],
    ) -> Result<(String, Vec<u8>), WalletError> {
        let mut state = self.state.lock();
        let entry = self.resolve(&mut state, &(*identity).into())?;
        let address = entry.address().to_string();
        let key = entry.private_key().clone();
        let signed = self.signer.sign_transaction(key, &address, payload)?;
        debug!(wallet_uuid = %self.wallet_uuid, %address, "signed payload");
        Ok((address, signed))
    }

    fn account_extended_public_key(&self, account: u32) -> Result<String, WalletError> {
        let state = self.state.lock();
        let root = state.root.as_ref().ok_or(WalletError::KeyCleared)?;
        let mut node = self.engine.derive_account(root, account)?;
        let xpub = node.to_extended_public();
        node.clear_secrets();
        xpub
    }

    fn cached_addresses(&self) -> usize {
        self.state.lock().cache.len()
    }

    fn is_unloaded(&self) -> bool {
        self.state.lock().root.is_none()
    }
}

impl Drop for MnemonicUnit {
    fn drop(&mut self) {
        self.unload_wallet();
    }
}

/// Derives one leaf and keeps only its address and private scalar.
fn derive_entry(
    engine: &HdDerivationEngine,
    params: &ChainParams,
    root: &KeyBundle,
    path: &DerivationPath,
) -> Result<AddressCacheEntry, WalletError> {
    let (mut account, mut leaf) = engine.derive_path(root, path)?;
    account.clear_secrets();
    let address = key_bundle_address(&leaf, params.address_encoding, params.network)?;
    let private_key = leaf.private_key()?.clone();
    leaf.clear_secrets();
    Ok(AddressCacheEntry::new(address, private_key))
}
