//! Tron: Base58Check addresses and SHA-256 container signing.
pub mod address;

pub use address::public_key_to_tron_address;
