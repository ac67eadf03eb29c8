//! Cryptographic building blocks: BIP32 keys, BIP44 paths, BIP39 mnemonics,
//! recoverable ECDSA and the mnemonic envelope.

pub mod bip44;
pub mod envelope;
pub mod hash;
pub mod hd_key;
pub mod mnemonic;
pub mod signature_utils;

pub use bip44::{Bip44Path, DerivationPath, HdDerivationEngine, BIP44_PURPOSE};
pub use envelope::{AesGcmEnvelope, SecretDecryptor};
pub use hd_key::{KeyBundle, NetworkParams, HARDENED_OFFSET};
