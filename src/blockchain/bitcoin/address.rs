//! UTXO-chain address encodings for compressed secp256k1 keys:
//! - P2PKH: `1...` (Base58Check)
//! - P2WPKH: `bc1q...` (bech32)
//! - P2SH-P2WPKH: `3...` (witness program wrapped in P2SH)

use bitcoin::address::Address;
use bitcoin::{Network, PublicKey as BitcoinPublicKey};
use secp256k1::PublicKey;

use crate::core::errors::WalletError;

/// Supported script types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    P2pkh,
    P2wpkh,
    P2shP2wpkh,
}

pub fn encode(public_key: &PublicKey, address_type: AddressType, network: Network) -> Result<String, WalletError> {
    // Rebuild from bytes: the bitcoin crate links its own secp256k1 version.
    let btc_pubkey = BitcoinPublicKey::from_slice(&public_key.serialize())
        .map_err(|e| WalletError::AddressError(e.to_string()))?;

    let address = match address_type {
        AddressType::P2pkh => Address::p2pkh(&btc_pubkey, network),
        AddressType::P2wpkh => Address::p2wpkh(&btc_pubkey, network)
            .map_err(|e| WalletError::AddressError(format!("P2WPKH: {}", e)))?,
        AddressType::P2shP2wpkh => Address::p2shwpkh(&btc_pubkey, network)
            .map_err(|e| WalletError::AddressError(format!("P2SH-P2WPKH: {}", e)))?,
    };
    Ok(address.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hd_key::SECP256K1;
    use secp256k1::SecretKey;

    fn generator() -> PublicKey {
        let mut sk = [0u8; 32];
        sk[31] = 1;
        PublicKey::from_secret_key(&SECP256K1, &SecretKey::from_slice(&sk).expect("sk"))
    }

    #[test]
    fn test_p2pkh_vector() {
        assert_eq!(
            encode(&generator(), AddressType::P2pkh, Network::Bitcoin).expect("p2pkh"),
            "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"
        );
    }

    #[test]
    fn test_p2wpkh_vector() {
        assert_eq!(
            encode(&generator(), AddressType::P2wpkh, Network::Bitcoin).expect("p2wpkh"),
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        );
    }

    #[test]
    fn test_p2sh_p2wpkh_prefixes() {
        let main = encode(&generator(), AddressType::P2shP2wpkh, Network::Bitcoin).expect("main");
        let test = encode(&generator(), AddressType::P2shP2wpkh, Network::Testnet).expect("test");
        assert!(main.starts_with('3'));
        assert!(test.starts_with('2'));
    }
}
