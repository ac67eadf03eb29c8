use crate::core::errors::WalletError;
use crate::security::SecretBuffer;

/// Turns an unsigned transaction payload plus a derived private key into signed bytes.
///
/// The key is passed by value: implementations sign and let it drop, which zeroes it.
/// `signer_address` is the address the key was derived for; implementations verify that
/// their signatures recover to it.
pub trait ChainSigner: Send + Sync {
    fn sign_transaction(
        &self,
        key: SecretBuffer<32>,
        signer_address: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>, WalletError>;
}
