//! Chain-specific address encoding of a key bundle's public key.
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};

use crate::blockchain::{ethereum, tron};
use crate::core::errors::WalletError;
use crate::crypto::hd_key::{KeyBundle, NetworkParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressEncoding {
    /// EIP-55 checksummed hex.
    Evm,
    /// `T...` Base58Check.
    Tron,
    P2pkh,
    P2wpkh,
    P2shP2wpkh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainNetwork {
    #[default]
    Mainnet,
    Testnet,
}

impl ChainNetwork {
    pub fn key_params(&self) -> NetworkParams {
        match self {
            ChainNetwork::Mainnet => NetworkParams::MAINNET,
            ChainNetwork::Testnet => NetworkParams::TESTNET,
        }
    }

    #[cfg(feature = "bitcoin")]
    fn bitcoin(&self) -> bitcoin::Network {
        match self {
            ChainNetwork::Mainnet => bitcoin::Network::Bitcoin,
            ChainNetwork::Testnet => bitcoin::Network::Testnet,
        }
    }
}

/// Pure and deterministic given the public key and network.
pub fn encode_address(
    public_key: &PublicKey,
    encoding: AddressEncoding,
    network: ChainNetwork,
) -> Result<String, WalletError> {
    match encoding {
        AddressEncoding::Evm => Ok(ethereum::address::checksum_address(public_key)),
        AddressEncoding::Tron => Ok(tron::public_key_to_tron_address(public_key)),
        AddressEncoding::P2pkh | AddressEncoding::P2wpkh | AddressEncoding::P2shP2wpkh => {
            encode_utxo(public_key, encoding, network)
        }
    }
}

pub fn key_bundle_address(
    bundle: &KeyBundle,
    encoding: AddressEncoding,
    network: ChainNetwork,
) -> Result<String, WalletError> {
    encode_address(&bundle.public_key()?, encoding, network)
}

#[cfg(feature = "bitcoin")]
fn encode_utxo(
    public_key: &PublicKey,
    encoding: AddressEncoding,
    network: ChainNetwork,
) -> Result<String, WalletError> {
    use crate::blockchain::bitcoin::{encode_address, AddressType};

    let address_type = match encoding {
        AddressEncoding::P2pkh => AddressType::P2pkh,
        AddressEncoding::P2wpkh => AddressType::P2wpkh,
        _ => AddressType::P2shP2wpkh,
    };
    encode_address(public_key, address_type, network.bitcoin())
}

#[cfg(not(feature = "bitcoin"))]
fn encode_utxo(
    _public_key: &PublicKey,
    encoding: AddressEncoding,
    _network: ChainNetwork,
) -> Result<String, WalletError> {
    Err(WalletError::AddressError(format!(
        "{:?} requires the `bitcoin` feature",
        encoding
    )))
}
