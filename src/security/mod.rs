//! Secret handling for key material held by loaded wallets.

pub mod memory_protection;
pub mod secret;

pub use secret::{vec_to_secret, SecretBuffer, SecretVec};
