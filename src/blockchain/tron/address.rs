//! Tron-style addresses: `0x41 ‖ keccak(pubkey)[12..]` in Base58Check.
use secp256k1::PublicKey;

use crate::blockchain::ethereum::address::public_key_to_address;
use crate::crypto::hash::base58check_encode;

pub const TRON_ADDRESS_PREFIX: u8 = 0x41;

pub fn public_key_to_tron_address(public_key: &PublicKey) -> String {
    let mut payload = [0u8; 21];
    payload[0] = TRON_ADDRESS_PREFIX;
    payload[1..].copy_from_slice(public_key_to_address(public_key).as_bytes());
    base58check_encode(&payload)
}
