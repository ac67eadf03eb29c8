//! `WalletPoolUnit`: one wallet's decrypted state behind a single async lock.
//!
//! ```text
//! Unloaded --(any operation)--> Loading --> Loaded --(unload / idle / shutdown)--> Unloaded
//! ```
//!
//! Loading fetches the record, decrypts the mnemonic, checks its SHA-256 against the stored
//! hash and builds the plugin's pool unit. A background watchdog unloads the wallet once no
//! operation has succeeded for `unload_interval`; it competes for the same lock as callers
//! and re-checks the deadline after acquiring it. After `shutdown` the unit is closed and
//! refuses to load again, since its watchdog is gone.
//!
//! Derivation and signing are CPU bound, so they run on tokio's blocking pool while the
//! async lock stays held. Other wallets' units and watchdogs keep running meanwhile.
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::errors::WalletError;
use crate::core::types::{AccountIdentity, DerivationAddressIdentity, RangeRequestUnit};
use crate::crypto::envelope::SecretDecryptor;
use crate::crypto::mnemonic::verify_mnemonic_hash;
use crate::plugin::{PoolUnitHandle, SigningPlugin};
use crate::storage::WalletRepository;

/// Collaborators shared by every unit of one host.
#[derive(Clone)]
pub struct UnitContext {
    pub plugin: Arc<dyn SigningPlugin>,
    pub repository: Arc<dyn WalletRepository>,
    pub decryptor: Arc<dyn SecretDecryptor>,
    pub unload_interval: Duration,
}

#[derive(Default)]
struct IdleTimer {
    deadline: parking_lot::Mutex<Option<Instant>>,
    touched: Notify,
}

impl IdleTimer {
    fn reset(&self, interval: Duration) {
        *self.deadline.lock() = Some(Instant::now() + interval);
        self.touched.notify_one();
    }

    fn disarm(&self) {
        *self.deadline.lock() = None;
    }

    fn deadline(&self) -> Option<Instant> {
        *self.deadline.lock()
    }
}

#[derive(Default)]
struct Slot {
    unit: Option<Arc<dyn PoolUnitHandle>>,
    closed: bool,
}

pub struct WalletPoolUnit {
    wallet_uuid: Uuid,
    mnemonic_uuid: Uuid,
    ctx: UnitContext,
    slot: Mutex<Slot>,
    timer: Arc<IdleTimer>,
    cancel: CancellationToken,
}

impl WalletPoolUnit {
    /// Creates an unloaded unit and starts its idle watchdog on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime. Use [`WalletPoolUnit::try_new`] where
    /// that can happen.
    pub fn new(wallet_uuid: Uuid, mnemonic_uuid: Uuid, ctx: UnitContext) -> Arc<Self> {
        Self::start(&Handle::current(), wallet_uuid, mnemonic_uuid, ctx)
    }

    /// Like [`WalletPoolUnit::new`], but reports a missing runtime as an error.
    pub fn try_new(wallet_uuid: Uuid, mnemonic_uuid: Uuid, ctx: UnitContext) -> Result<Arc<Self>, WalletError> {
        let runtime = Handle::try_current()
            .map_err(|e| WalletError::InternalError(format!("pool unit needs a tokio runtime: {}", e)))?;
        Ok(Self::start(&runtime, wallet_uuid, mnemonic_uuid, ctx))
    }

    fn start(runtime: &Handle, wallet_uuid: Uuid, mnemonic_uuid: Uuid, ctx: UnitContext) -> Arc<Self> {
        let unit = Arc::new(Self {
            wallet_uuid,
            mnemonic_uuid,
            ctx,
            slot: Mutex::new(Slot::default()),
            timer: Arc::new(IdleTimer::default()),
            cancel: CancellationToken::new(),
        });
        runtime.spawn(idle_watchdog(
            Arc::downgrade(&unit),
            Arc::clone(&unit.timer),
            unit.cancel.clone(),
        ));
        unit
    }

    pub fn wallet_uuid(&self) -> Uuid {
        self.wallet_uuid
    }

    pub fn mnemonic_uuid(&self) -> Uuid {
        self.mnemonic_uuid
    }

    pub fn chain(&self) -> &str {
        self.ctx.plugin.name()
    }

    pub async fn is_loaded(&self) -> bool {
        self.slot.lock().await.unit.is_some()
    }

    /// True once `shutdown` has run.
    pub async fn is_closed(&self) -> bool {
        self.slot.lock().await.closed
    }

    pub async fn cached_addresses(&self) -> usize {
        self.slot.lock().await.unit.as_ref().map_or(0, |unit| unit.cached_addresses())
    }

    /// Loads the wallet if needed. Other operations call this implicitly.
    pub async fn load(&self) -> Result<(), WalletError> {
        self.with_unit(|_| Ok(())).await
    }

    pub async fn load_account(&self, identity: DerivationAddressIdentity) -> Result<AccountIdentity, WalletError> {
        self.with_unit(move |unit| unit.load_account(&identity)).await
    }

    pub async fn get_address(&self, identity: DerivationAddressIdentity) -> Result<String, WalletError> {
        self.with_unit(move |unit| unit.get_account_address(&identity)).await
    }

    /// Fail-fast: one bad index aborts the whole request.
    pub async fn get_address_range(
        &self,
        ranges: &[RangeRequestUnit],
    ) -> Result<(usize, Vec<AccountIdentity>), WalletError> {
        let ranges = ranges.to_vec();
        self.with_unit(move |unit| unit.get_multiple_accounts(&ranges)).await
    }

    pub async fn sign_transaction(
        &self,
        identity: DerivationAddressIdentity,
        payload: &[u8],
    ) -> Result<(String, Vec<u8>), WalletError> {
        let payload = payload.to_vec();
        self.with_unit(move |unit| unit.sign_data(&identity, &payload)).await
    }

    pub async fn account_extended_public_key(&self, account: u32) -> Result<String, WalletError> {
        self.with_unit(move |unit| unit.account_extended_public_key(account)).await
    }

    /// Idempotent. Returns whether anything was loaded.
    pub async fn unload(&self) -> bool {
        let mut slot = self.slot.lock().await;
        self.unload_locked(&mut slot, "explicit")
    }

    /// Waits for the in-flight operation, unloads and stops the watchdog. Later
    /// operations fail with `UnitClosed` instead of loading the wallet again.
    pub async fn shutdown(&self) {
        let mut slot = self.slot.lock().await;
        slot.closed = true;
        self.unload_locked(&mut slot, "shutdown");
        self.cancel.cancel();
    }

    /// Unloads only if the idle deadline has really passed once the lock is held.
    pub(crate) async fn unload_if_idle(&self) -> bool {
        let mut slot = self.slot.lock().await;
        match self.timer.deadline() {
            Some(deadline) if deadline <= Instant::now() => self.unload_locked(&mut slot, "idle"),
            _ => false,
        }
    }

    async fn with_unit<R, F>(&self, op: F) -> Result<R, WalletError>
    where
        F: FnOnce(&dyn PoolUnitHandle) -> Result<R, WalletError> + Send + 'static,
        R: Send + 'static,
    {
        let mut slot = self.slot.lock().await;
        if slot.closed {
            return Err(WalletError::UnitClosed(self.wallet_uuid.to_string()));
        }
        let unit = match &slot.unit {
            Some(unit) => Arc::clone(unit),
            None => {
                let unit = self.load_unit().await?;
                self.timer.reset(self.ctx.unload_interval);
                slot.unit = Some(Arc::clone(&unit));
                unit
            }
        };
        // the slot guard lives until the blocking work is done
        let result = tokio::task::spawn_blocking(move || op(&*unit))
            .await
            .map_err(|e| WalletError::InternalError(format!("pool unit task failed: {}", e)))?;
        if result.is_ok() {
            self.timer.reset(self.ctx.unload_interval);
        }
        result
    }

    async fn load_unit(&self) -> Result<Arc<dyn PoolUnitHandle>, WalletError> {
        let record = self.ctx.repository.get_wallet_by_uuid(self.wallet_uuid).await?;
        if !record.is_enabled {
            return Err(WalletError::WalletDisabled(self.wallet_uuid.to_string()));
        }
        if record.mnemonic_uuid != self.mnemonic_uuid {
            return Err(WalletError::WalletNotFound(format!(
                "wallet {} has no mnemonic {}",
                self.wallet_uuid, self.mnemonic_uuid
            )));
        }

        let mnemonic = self
            .ctx
            .decryptor
            .decrypt(&record.encrypted_mnemonic)
            .await
            .map_err(|e| {
                error!(wallet_uuid = %self.wallet_uuid, "mnemonic decryption failed: {}", e);
                match e {
                    WalletError::DecryptionFailed(_) => e,
                    other => WalletError::DecryptionFailed(other.to_string()),
                }
            })?;

        if !verify_mnemonic_hash(&mnemonic, &record.mnemonic_hash) {
            warn!(wallet_uuid = %self.wallet_uuid, "decrypted mnemonic does not match stored hash");
            return Err(WalletError::MnemonicIntegrityMismatch(self.wallet_uuid.to_string()));
        }

        // seed stretching is CPU bound
        let plugin = Arc::clone(&self.ctx.plugin);
        let wallet_uuid = self.wallet_uuid;
        let unit = tokio::task::spawn_blocking(move || {
            let phrase = std::str::from_utf8(&mnemonic)
                .map_err(|_| WalletError::MnemonicError("mnemonic is not valid UTF-8".into()))?;
            plugin.new_pool_unit(wallet_uuid, phrase)
        })
        .await
        .map_err(|e| WalletError::InternalError(format!("pool unit load task failed: {}", e)))??;
        info!(wallet_uuid = %self.wallet_uuid, chain = self.chain(), "wallet loaded");
        Ok(Arc::from(unit))
    }

    fn unload_locked(&self, slot: &mut Slot, reason: &str) -> bool {
        self.timer.disarm();
        match slot.unit.take() {
            Some(unit) => {
                unit.unload_wallet();
                info!(wallet_uuid = %self.wallet_uuid, reason, "wallet unloaded");
                true
            }
            None => false,
        }
    }
}

impl Drop for WalletPoolUnit {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn idle_watchdog(unit: Weak<WalletPoolUnit>, timer: Arc<IdleTimer>, cancel: CancellationToken) {
    loop {
        match timer.deadline() {
            Some(deadline) => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = timer.touched.notified() => continue,
                    _ = tokio::time::sleep_until(deadline) => {
                        let Some(unit) = unit.upgrade() else { break };
                        if !unit.unload_if_idle().await {
                            debug!(wallet_uuid = %unit.wallet_uuid, "idle timer fired during activity");
                        }
                    }
                }
            }
            None => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = timer.touched.notified() => continue,
                }
            }
        }
    }
}
