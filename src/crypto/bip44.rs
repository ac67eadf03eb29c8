//! BIP44 path layout: m/purpose'/coin_type'/account'/change/address_index
//!
//! Purpose and coin type are fixed per chain plugin; requests only carry
//! the (account, change, address_index) triple.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::WalletError;
use crate::crypto::hd_key::{KeyBundle, HARDENED_OFFSET};

pub const BIP44_PURPOSE: u32 = 44;

/// Per-request part of a BIP44 path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DerivationPath {
    pub account: u32,
    pub change: u32,
    pub address_index: u32,
}

impl DerivationPath {
    pub fn new(account: u32, change: u32, address_index: u32) -> Self {
        Self { account, change, address_index }
    }

    /// Canonical cache key, `account'/change/address_index`.
    pub fn cache_key(&self) -> String {
        format!("{}'/{}/{}", self.account, self.change, self.address_index)
    }
}

/// Full five-level BIP44 path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bip44Path {
    pub purpose: u32,
    pub coin_type: u32,
    pub account: u32,
    pub change: u32,
    pub address_index: u32,
}

impl Bip44Path {
    pub fn new(purpose: u32, coin_type: u32, path: DerivationPath) -> Self {
        Self {
            purpose,
            coin_type,
            account: path.account,
            change: path.change,
            address_index: path.address_index,
        }
    }

    /// Child numbers in derivation order; the first three are hardened.
    pub fn indices(&self) -> Result<[u32; 5], WalletError> {
        for (name, value) in [
            ("purpose", self.purpose),
            ("coin_type", self.coin_type),
            ("account", self.account),
            ("change", self.change),
            ("address_index", self.address_index),
        ] {
            if value >= HARDENED_OFFSET {
                return Err(WalletError::KeyDerivationError(format!(
                    "{} {} is out of range",
                    name, value
                )));
            }
        }
        Ok([
            HARDENED_OFFSET | self.purpose,
            HARDENED_OFFSET | self.coin_type,
            HARDENED_OFFSET | self.account,
            self.change,
            self.address_index,
        ])
    }

    pub fn relative(&self) -> DerivationPath {
        DerivationPath::new(self.account, self.change, self.address_index)
    }
}

impl fmt::Display for Bip44Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "m/{}'/{}'/{}'/{}/{}",
            self.purpose, self.coin_type, self.account, self.change, self.address_index
        )
    }
}

impl FromStr for Bip44Path {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || WalletError::KeyDerivationError(format!("malformed BIP44 path: {}", s));
        let mut parts = s.split('/');
        if parts.next() != Some("m") {
            return Err(bad());
        }
        let mut levels = [0u32; 5];
        for (i, level) in levels.iter_mut().enumerate() {
            let part = parts.next().ok_or_else(bad)?;
            let hardened = part.ends_with('\'') || part.ends_with('h');
            if hardened != (i < 3) {
                return Err(bad());
            }
            *level = part.trim_end_matches(['\'', 'h']).parse().map_err(|_| bad())?;
        }
        if parts.next().is_some() {
            return Err(bad());
        }
        Ok(Self {
            purpose: levels[0],
            coin_type: levels[1],
            account: levels[2],
            change: levels[3],
            address_index: levels[4],
        })
    }
}

/// Applies a chain's fixed purpose and coin type to per-request paths.
#[derive(Debug, Clone, Copy)]
pub struct HdDerivationEngine {
    purpose: u32,
    coin_type: u32,
}

impl HdDerivationEngine {
    pub fn new(purpose: u32, coin_type: u32) -> Self {
        Self { purpose, coin_type }
    }

    pub fn full_path(&self, path: &DerivationPath) -> Bip44Path {
        Bip44Path::new(self.purpose, self.coin_type, *path)
    }

    /// Derives `m/purpose'/coin'/account'` and then `change/address_index` below it.
    ///
    /// Returns `(account_node, leaf_node)`. Segments are derived strictly in order and
    /// every intermediate node is cleared before returning.
    pub fn derive_path(
        &self,
        root: &KeyBundle,
        path: &DerivationPath,
    ) -> Result<(KeyBundle, KeyBundle), WalletError> {
        let indices = self.full_path(path).indices()?;
        let account = root.derive_indices(&indices[..3])?;
        let leaf = account.derive_indices(&indices[3..])?;
        tracing::trace!(path = %self.full_path(path), "derived leaf key");
        Ok((account, leaf))
    }

    /// Account-level node only, for extended public key export.
    pub fn derive_account(&self, root: &KeyBundle, account: u32) -> Result<KeyBundle, WalletError> {
        let indices = self.full_path(&DerivationPath::new(account, 0, 0)).indices()?;
        root.derive_indices(&indices[..3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hd_key::NetworkParams;

    #[test]
    fn test_display_and_parse() {
        let path = Bip44Path::new(44, 60, DerivationPath::new(5, 5, 55));
        assert_eq!(path.to_string(), "m/44'/60'/5'/5/55");
        let parsed: Bip44Path = "m/44'/60'/5'/5/55".parse().expect("parse");
        assert_eq!(parsed, path);
        assert_eq!(parsed.relative(), DerivationPath::new(5, 5, 55));
    }

    #[test]
    fn test_parse_rejects_wrong_hardening() {
        assert!("m/44'/60'/5/5/55".parse::<Bip44Path>().is_err());
        assert!("m/44'/60'/5'/5'/55".parse::<Bip44Path>().is_err());
        assert!("44'/60'/5'/5/55".parse::<Bip44Path>().is_err());
        assert!("m/44'/60'/5'/5/55/1".parse::<Bip44Path>().is_err());
    }

    #[test]
    fn test_cache_key_format() {
        assert_eq!(DerivationPath::new(3, 13, 114).cache_key(), "3'/13/114");
    }

    #[test]
    fn test_indices_reject_hardened_range() {
        let path = Bip44Path::new(44, 60, DerivationPath::new(HARDENED_OFFSET, 0, 0));
        assert!(path.indices().is_err());
    }

    #[test]
    fn test_derive_path_returns_account_and_leaf() {
        let root = KeyBundle::master_from_seed(&[7u8; 32], NetworkParams::MAINNET).expect("root");
        let engine = HdDerivationEngine::new(44, 60);
        let (account, leaf) = engine.derive_path(&root, &DerivationPath::new(1, 0, 9)).expect("derive");
        assert_eq!(account.depth(), 3);
        assert_eq!(account.child_number(), HARDENED_OFFSET | 1);
        assert_eq!(leaf.depth(), 5);
        assert_eq!(leaf.child_number(), 9);

        let again = engine.derive_account(&root, 1).expect("account");
        assert_eq!(again.public_key().expect("pk"), account.public_key().expect("pk"));
    }
}
