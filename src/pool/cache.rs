//! Per-unit map from derivation path to address and private key.
use std::collections::HashMap;

use zeroize::Zeroize;

use crate::crypto::bip44::DerivationPath;
use crate::security::SecretBuffer;

/// One derived leaf. The private key is zeroed when the entry is dropped.
#[derive(Debug, Clone)]
pub struct AddressCacheEntry {
    address: String,
    private_key: SecretBuffer<32>,
}

impl AddressCacheEntry {
    pub fn new(address: String, private_key: SecretBuffer<32>) -> Self {
        Self { address, private_key }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub(crate) fn private_key(&self) -> &SecretBuffer<32> {
        &self.private_key
    }
}

/// Keyed by `"{account}'/{change}/{index}"`. Entries are only ever inserted by the
/// thread that holds the owning unit's lock.
#[derive(Debug, Default)]
pub struct AddressCache {
    entries: HashMap<String, AddressCacheEntry>,
}

impl AddressCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &DerivationPath) -> Option<&AddressCacheEntry> {
        self.entries.get(&path.cache_key())
    }

    pub fn contains(&self, path: &DerivationPath) -> bool {
        self.entries.contains_key(&path.cache_key())
    }

    /// First write wins; derivation is deterministic so a second value would be equal.
    pub fn insert(&mut self, path: &DerivationPath, entry: AddressCacheEntry) -> &AddressCacheEntry {
        self.entries.entry(path.cache_key()).or_insert(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Zeroes every cached private key, then empties the map.
    pub fn clear(&mut self) {
        for entry in self.entries.values_mut() {
            entry.private_key.zeroize();
        }
        self.entries.clear();
    }
}
