//! BIP39 mnemonics: generation, validation, seed stretching and the
//! SHA-256 fingerprint stored alongside encrypted mnemonics.
use bip39::{Language, Mnemonic};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::SecretString;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::core::errors::WalletError;
use crate::crypto::hash::sha256;

pub const SUPPORTED_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// Generates an English mnemonic with `words_count` words from OS entropy.
pub fn generate_mnemonic(words_count: usize) -> Result<SecretString, WalletError> {
    if !SUPPORTED_WORD_COUNTS.contains(&words_count) {
        return Err(WalletError::MnemonicError(format!(
            "unsupported word count {}",
            words_count
        )));
    }
    let mut entropy = Zeroizing::new(vec![0u8; words_count * 4 / 3]);
    OsRng.fill_bytes(&mut entropy);
    let mnemonic = Zeroizing::new(
        Mnemonic::from_entropy_in(Language::English, &entropy)
            .map_err(|e| WalletError::MnemonicError(e.to_string()))?,
    );
    Ok(SecretString::new(mnemonic.to_string()))
}

/// True when `phrase` is a valid English BIP39 mnemonic (word list and checksum).
pub fn validate_mnemonic(phrase: &str) -> bool {
    Mnemonic::parse_in_normalized(Language::English, phrase).is_ok()
}

/// PBKDF2 seed for `phrase` with an empty passphrase. The parsed word indices are
/// wiped before returning.
pub fn mnemonic_to_seed(phrase: &str) -> Result<Zeroizing<[u8; 64]>, WalletError> {
    let mnemonic = Zeroizing::new(
        Mnemonic::parse_in_normalized(Language::English, phrase)
            .map_err(|e| WalletError::MnemonicError(e.to_string()))?,
    );
    Ok(Zeroizing::new(mnemonic.to_seed_normalized("")))
}

/// Lowercase hex SHA-256 of the raw mnemonic bytes.
pub fn mnemonic_hash(mnemonic: &[u8]) -> String {
    hex::encode(sha256(mnemonic))
}

/// Constant-time comparison of the mnemonic fingerprint against a stored hex hash.
pub fn verify_mnemonic_hash(mnemonic: &[u8], expected_hex: &str) -> bool {
    let actual = mnemonic_hash(mnemonic);
    let expected = expected_hex.trim().to_ascii_lowercase();
    actual.len() == expected.len() && bool::from(actual.as_bytes().ct_eq(expected.as_bytes()))
}
