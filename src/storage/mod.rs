//! Persistence collaborator: fetches mnemonic wallet records by wallet UUID.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::core::errors::WalletError;
use crate::core::types::MnemonicWalletRecord;

mod sqlite;
pub use sqlite::SqliteWalletRepository;

#[async_trait]
pub trait WalletRepository: Send + Sync {
    /// Fails with [`WalletError::WalletNotFound`] when no record exists.
    async fn get_wallet_by_uuid(&self, wallet_uuid: Uuid) -> Result<MnemonicWalletRecord, WalletError>;
}

/// Map-backed repository for tests and single-process tooling.
#[derive(Debug, Default)]
pub struct InMemoryWalletRepository {
    records: RwLock<HashMap<Uuid, MnemonicWalletRecord>>,
}

impl InMemoryWalletRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record`, assigning the next row id. Replaces any record with the same wallet UUID.
    pub fn insert(&self, mut record: MnemonicWalletRecord) -> i64 {
        let mut records = self.records.write();
        let id = records.len() as i64 + 1;
        record.id = id;
        records.insert(record.wallet_uuid, record);
        id
    }

    pub fn set_enabled(&self, wallet_uuid: Uuid, enabled: bool) -> Result<(), WalletError> {
        let mut records = self.records.write();
        let record = records
            .get_mut(&wallet_uuid)
            .ok_or_else(|| WalletError::WalletNotFound(wallet_uuid.to_string()))?;
        record.is_enabled = enabled;
        record.updated_at = Utc::now();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl WalletRepository for InMemoryWalletRepository {
    async fn get_wallet_by_uuid(&self, wallet_uuid: Uuid) -> Result<MnemonicWalletRecord, WalletError> {
        self.records
            .read()
            .get(&wallet_uuid)
            .cloned()
            .ok_or_else(|| WalletError::WalletNotFound(wallet_uuid.to_string()))
    }
}

#[cfg(test)]
pub(crate) fn test_record(wallet_uuid: Uuid, encrypted_mnemonic: Vec<u8>, mnemonic_hash: String) -> MnemonicWalletRecord {
    let now = Utc::now();
    MnemonicWalletRecord {
        id: 0,
        wallet_uuid,
        mnemonic_uuid: Uuid::new_v4(),
        mnemonic_hash,
        encrypted_mnemonic,
        is_hot: true,
        is_enabled: true,
        created_at: now,
        updated_at: now,
    }
}
