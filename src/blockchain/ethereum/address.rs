//! Account-model addresses: last 20 bytes of Keccak-256 over the uncompressed
//! public key, rendered with the EIP-55 mixed-case checksum.
use ethers::types::Address;
use ethers::utils::to_checksum;
use secp256k1::PublicKey;

use crate::core::errors::WalletError;
use crate::crypto::hash::keccak256;

pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    let digest = keccak256(&uncompressed[1..]);
    Address::from_slice(&digest[12..])
}

pub fn checksum_address(public_key: &PublicKey) -> String {
    to_checksum(&public_key_to_address(public_key), None)
}

/// Parses a `0x`-prefixed (or bare) 40 hex digit address. Case is not validated.
pub fn parse_address(s: &str) -> Result<Address, WalletError> {
    let trimmed = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    let bytes = hex::decode(trimmed).map_err(|e| WalletError::AddressError(e.to_string()))?;
    if bytes.len() != 20 {
        return Err(WalletError::AddressError(format!(
            "address must be 20 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(Address::from_slice(&bytes))
}
