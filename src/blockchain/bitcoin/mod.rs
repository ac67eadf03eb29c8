//! Bitcoin-style UTXO chains: address encodings. Signing goes through the
//! double-SHA256 container signer.
pub mod address;

pub use address::{encode as encode_address, AddressType};
