//! Keeps exactly one [`WalletPoolUnit`] per wallet so that independent wallets stay
//! fully concurrent while operations on one wallet are serialized.
use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::core::errors::WalletError;
use crate::pool::unit::{UnitContext, WalletPoolUnit};

pub struct PoolUnitHost {
    ctx: UnitContext,
    units: Mutex<HashMap<Uuid, Arc<WalletPoolUnit>>>,
}

impl PoolUnitHost {
    pub fn new(ctx: UnitContext) -> Self {
        Self { ctx, units: Mutex::new(HashMap::new()) }
    }

    /// Returns the unit for `wallet_uuid`, creating it unloaded on first use.
    /// A unit already bound to a different mnemonic is reported as not found. Outside a
    /// tokio runtime no unit can be started and an error is returned.
    pub fn get_or_create(&self, wallet_uuid: Uuid, mnemonic_uuid: Uuid) -> Result<Arc<WalletPoolUnit>, WalletError> {
        let mut units = self.units.lock();
        if let Some(unit) = units.get(&wallet_uuid) {
            if unit.mnemonic_uuid() != mnemonic_uuid {
                return Err(WalletError::WalletNotFound(format!(
                    "wallet {} has no mnemonic {}",
                    wallet_uuid, mnemonic_uuid
                )));
            }
            return Ok(Arc::clone(unit));
        }
        let unit = WalletPoolUnit::try_new(wallet_uuid, mnemonic_uuid, self.ctx.clone())?;
        units.insert(wallet_uuid, Arc::clone(&unit));
        Ok(unit)
    }

    pub fn get(&self, wallet_uuid: &Uuid) -> Option<Arc<WalletPoolUnit>> {
        self.units.lock().get(wallet_uuid).cloned()
    }

    pub fn len(&self) -> usize {
        self.units.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.lock().is_empty()
    }

    /// Removes the unit from the host after unloading it.
    pub async fn remove(&self, wallet_uuid: &Uuid) -> bool {
        let unit = self.units.lock().remove(wallet_uuid);
        match unit {
            Some(unit) => {
                unit.shutdown().await;
                true
            }
            None => false,
        }
    }

    /// Waits for every unit's in-flight operation, then unloads all of them.
    pub async fn shutdown(&self) {
        let units: Vec<Arc<WalletPoolUnit>> = self.units.lock().drain().map(|(_, unit)| unit).collect();
        let count = units.len();
        join_all(units.iter().map(|unit| unit.shutdown())).await;
        info!(units = count, "pool unit host shut down");
    }
}
