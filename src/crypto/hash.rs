//! Digest helpers shared by key serialization, address encoding and signing.
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use sha3::Keccak256;

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// RIPEMD160(SHA256(data)), used for key fingerprints and P2PKH payloads.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(data)).into()
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Base58 with a 4-byte double-SHA256 checksum appended.
pub fn base58check_encode(payload: &[u8]) -> String {
    let checksum = double_sha256(payload);
    let mut buf = Vec::with_capacity(payload.len() + 4);
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&checksum[..4]);
    bs58::encode(buf).into_string()
}

/// Decodes Base58Check, returning the payload without its checksum.
pub fn base58check_decode(encoded: &str) -> Option<Vec<u8>> {
    let mut raw = bs58::decode(encoded).into_vec().ok()?;
    if raw.len() < 4 {
        return None;
    }
    let split = raw.len() - 4;
    let checksum = double_sha256(&raw[..split]);
    if checksum[..4] != raw[split..] {
        return None;
    }
    raw.truncate(split);
    Some(raw)
}
