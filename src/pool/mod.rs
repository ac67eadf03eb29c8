//! Wallet pool: lazily loaded, idle-unloaded per-wallet units and their host.
pub mod cache;
pub mod host;
pub mod unit;

pub use cache::{AddressCache, AddressCacheEntry};
pub use host::PoolUnitHost;
pub use unit::{UnitContext, WalletPoolUnit};
