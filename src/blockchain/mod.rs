//! Chain-specific address encodings and transaction signers.
pub mod address;
pub mod container;
pub mod ethereum;
pub mod traits;
pub mod tron;

#[cfg(feature = "bitcoin")]
pub mod bitcoin;

pub use address::{encode_address, AddressEncoding, ChainNetwork};
pub use container::{ContainerSigner, ContainerTransaction, DigestAlgorithm};
pub use traits::ChainSigner;
