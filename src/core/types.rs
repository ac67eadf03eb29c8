//! Identity types exchanged with the API layer and the persistence collaborator.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::errors::WalletError;
use crate::crypto::bip44::DerivationPath;

/// `(account_index, internal_index, address_index)` as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DerivationAddressIdentity {
    pub account_index: u32,
    pub internal_index: u32,
    pub address_index: u32,
}

impl DerivationAddressIdentity {
    pub fn new(account_index: u32, internal_index: u32, address_index: u32) -> Self {
        Self { account_index, internal_index, address_index }
    }
}

impl From<DerivationAddressIdentity> for DerivationPath {
    fn from(id: DerivationAddressIdentity) -> Self {
        DerivationPath::new(id.account_index, id.internal_index, id.address_index)
    }
}

impl From<DerivationPath> for DerivationAddressIdentity {
    fn from(path: DerivationPath) -> Self {
        Self::new(path.account, path.change, path.address_index)
    }
}

/// Inclusive address index range under one account/change pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRequestUnit {
    pub account_index: u32,
    pub internal_index: u32,
    pub address_index_from: u32,
    pub address_index_to: u32,
}

impl RangeRequestUnit {
    pub fn new(account_index: u32, internal_index: u32, from: u32, to: u32) -> Self {
        Self {
            account_index,
            internal_index,
            address_index_from: from,
            address_index_to: to,
        }
    }

    /// Number of addresses in the range. Fails with `InvalidRange` when `from > to`.
    pub fn count(&self) -> Result<u32, WalletError> {
        if self.address_index_from > self.address_index_to {
            return Err(WalletError::InvalidRange {
                from: self.address_index_from,
                to: self.address_index_to,
            });
        }
        // the full u32 span would overflow; max_range_size rejects it anyway
        Ok((self.address_index_to - self.address_index_from).saturating_add(1))
    }

    pub fn paths(&self) -> Result<Vec<DerivationPath>, WalletError> {
        self.count()?;
        Ok((self.address_index_from..=self.address_index_to)
            .map(|index| DerivationPath::new(self.account_index, self.internal_index, index))
            .collect())
    }
}

/// A derived address and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIdentity {
    pub parameters: DerivationAddressIdentity,
    pub address: String,
}

/// Stored mnemonic wallet, owned by the persistence layer and passed by value on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MnemonicWalletRecord {
    pub id: i64,
    pub wallet_uuid: Uuid,
    /// Identity of the mnemonic itself; a pool unit is bound to one.
    pub mnemonic_uuid: Uuid,
    /// Lowercase hex SHA-256 of the plaintext mnemonic.
    pub mnemonic_hash: String,
    pub encrypted_mnemonic: Vec<u8>,
    pub is_hot: bool,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_len_and_paths() {
        let range = RangeRequestUnit::new(155, 5, 10, 15);
        assert_eq!(range.count().expect("len"), 6);
        let paths = range.paths().expect("paths");
        assert_eq!(paths.first(), Some(&DerivationPath::new(155, 5, 10)));
        assert_eq!(paths.last(), Some(&DerivationPath::new(155, 5, 15)));
    }

    #[test]
    fn test_reversed_range_is_invalid() {
        let range = RangeRequestUnit::new(0, 0, 5, 4);
        assert!(matches!(range.count(), Err(WalletError::InvalidRange { from: 5, to: 4 })));
        assert!(range.paths().is_err());
    }

    #[test]
    fn test_single_element_range() {
        assert_eq!(RangeRequestUnit::new(0, 0, 7, 7).count().expect("len"), 1);
    }

    #[test]
    fn test_identity_path_conversion() {
        let id = DerivationAddressIdentity::new(3, 13, 114);
        let path: DerivationPath = id.into();
        assert_eq!(path.cache_key(), "3'/13/114");
        assert_eq!(DerivationAddressIdentity::from(path), id);
    }
}
