pub mod config;
pub mod errors;
pub mod types;

pub use config::HdWalletConfig;
pub use errors::{ErrorCategory, WalletError};
pub use types::{AccountIdentity, DerivationAddressIdentity, MnemonicWalletRecord, RangeRequestUnit};
