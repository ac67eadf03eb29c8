//! Account-model (EVM) chains.
pub mod address;
pub mod signer;
pub mod transaction;

pub use address::{checksum_address, public_key_to_address};
pub use signer::{recover_signer, EvmSigner, SignedEvmTransaction};
pub use transaction::{EvmTxRequest, EvmTxType};
