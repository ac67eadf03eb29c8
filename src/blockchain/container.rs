//! Signing for container transactions (UTXO-style inputs, Tron contracts).
//!
//! The payload carries the canonical transaction encoding in `raw_data` and the number of
//! inputs that need a signature. One 65-byte `r ‖ s ‖ recovery_id` signature over the
//! chain digest of `raw_data` is appended per input, in input order. Requests for more than
//! `max_inputs` signatures are rejected before any signing starts.
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blockchain::address::{encode_address, AddressEncoding, ChainNetwork};
use crate::blockchain::traits::ChainSigner;
use crate::core::errors::WalletError;
use crate::crypto::hash::{double_sha256, sha256};
use crate::crypto::signature_utils::{recover_public_key, sign_prehash_recoverable, RecoverableSig};
use crate::security::SecretBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestAlgorithm {
    Sha256,
    DoubleSha256,
}

impl DigestAlgorithm {
    pub fn digest(&self, data: &[u8]) -> [u8; 32] {
        match self {
            DigestAlgorithm::Sha256 => sha256(data),
            DigestAlgorithm::DoubleSha256 => double_sha256(data),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerTransaction {
    #[serde(with = "hex::serde")]
    pub raw_data: Vec<u8>,
    pub input_count: u32,
    /// Hex encoded 65-byte signatures.
    #[serde(default)]
    pub signatures: Vec<String>,
}

impl ContainerTransaction {
    pub fn decode(payload: &[u8]) -> Result<Self, WalletError> {
        Ok(serde_json::from_slice(payload)?)
    }

    pub fn encode(&self) -> Result<Vec<u8>, WalletError> {
        Ok(serde_json::to_vec(self)?)
    }
}

pub const DEFAULT_MAX_INPUTS: u32 = 256;

#[derive(Debug, Clone)]
pub struct ContainerSigner {
    digest: DigestAlgorithm,
    encoding: AddressEncoding,
    network: ChainNetwork,
    max_inputs: u32,
}

impl ContainerSigner {
    pub fn new(digest: DigestAlgorithm, encoding: AddressEncoding, network: ChainNetwork) -> Self {
        Self { digest, encoding, network, max_inputs: DEFAULT_MAX_INPUTS }
    }

    pub fn with_max_inputs(mut self, max_inputs: u32) -> Self {
        self.max_inputs = max_inputs;
        self
    }

    pub fn sign_container(
        &self,
        key: SecretBuffer<32>,
        signer_address: &str,
        mut tx: ContainerTransaction,
    ) -> Result<ContainerTransaction, WalletError> {
        if tx.raw_data.is_empty() {
            return Err(WalletError::MissingRequiredField("raw_data"));
        }
        if tx.input_count == 0 {
            return Err(WalletError::MissingRequiredField("input_count"));
        }
        if tx.input_count > self.max_inputs {
            return Err(WalletError::InvalidRange { from: 0, to: tx.input_count - 1 });
        }

        let digest = self.digest.digest(&tx.raw_data);
        for _ in 0..tx.input_count {
            let sig = sign_prehash_recoverable(&key, &digest)?;
            let recovered = self.recover_address(&digest, &sig)?;
            if recovered != signer_address {
                return Err(WalletError::SignatureRecoveryFailed(format!(
                    "recovered {}, expected {}",
                    recovered, signer_address
                )));
            }
            tx.signatures.push(hex::encode(sig.to_bytes()));
        }
        drop(key);
        debug!(inputs = tx.input_count, digest = ?self.digest, "signed container transaction");
        Ok(tx)
    }

    /// Addresses recovered from every signature attached to `tx`, in order.
    pub fn recover_signers(&self, tx: &ContainerTransaction) -> Result<Vec<String>, WalletError> {
        let digest = self.digest.digest(&tx.raw_data);
        tx.signatures
            .iter()
            .map(|encoded| {
                let bytes = hex::decode(encoded)
                    .map_err(|e| WalletError::SignatureRecoveryFailed(e.to_string()))?;
                self.recover_address(&digest, &RecoverableSig::from_bytes(&bytes)?)
            })
            .collect()
    }

    fn recover_address(&self, digest: &[u8; 32], sig: &RecoverableSig) -> Result<String, WalletError> {
        if sig.recovery_id > 1 {
            return Err(WalletError::SignatureRecoveryFailed(format!(
                "invalid recovery id {}",
                sig.recovery_id
            )));
        }
        let public_key = recover_public_key(digest, &sig.r, &sig.s, sig.recovery_id + 27)?;
        encode_address(&public_key, self.encoding, self.network)
    }
}

impl ChainSigner for ContainerSigner {
    fn sign_transaction(
        &self,
        key: SecretBuffer<32>,
        signer_address: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>, WalletError> {
        let tx = ContainerTransaction::decode(payload)?;
        self.sign_container(key, signer_address, tx)?.encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hd_key::SECP256K1;
    use secp256k1::{PublicKey, SecretKey};

    fn fixture() -> (SecretBuffer<32>, String, ContainerSigner) {
        let raw = [0x33u8; 32];
        let pk = PublicKey::from_secret_key(&SECP256K1, &SecretKey::from_slice(&raw).expect("sk"));
        let signer = ContainerSigner::new(DigestAlgorithm::Sha256, AddressEncoding::Tron, ChainNetwork::Mainnet);
        let address = encode_address(&pk, AddressEncoding::Tron, ChainNetwork::Mainnet).expect("addr");
        (SecretBuffer::new(raw), address, signer)
    }

    #[test]
    fn test_one_signature_per_input_appended() {
        let (key, address, signer) = fixture();
        let tx = ContainerTransaction {
            raw_data: vec![1, 2, 3, 4],
            input_count: 3,
            signatures: vec!["00".repeat(65)],
        };
        let signed = signer.sign_container(key, &address, tx).expect("sign");
        assert_eq!(signed.signatures.len(), 4);
        assert_eq!(signed.signatures[0], "00".repeat(65));
        for sig in &signed.signatures[1..] {
            assert_eq!(sig.len(), 130);
        }
    }

    #[test]
    fn test_recover_signers_matches_address() {
        let (key, address, signer) = fixture();
        let tx = ContainerTransaction { raw_data: b"contract".to_vec(), input_count: 2, signatures: vec![] };
        let signed = signer.sign_container(key, &address, tx).expect("sign");
        assert_eq!(signer.recover_signers(&signed).expect("recover"), vec![address.clone(), address]);
    }

    #[test]
    fn test_missing_fields() {
        let (key, address, signer) = fixture();
        let err = signer
            .sign_container(key.clone(), &address, ContainerTransaction { input_count: 1, ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, WalletError::MissingRequiredField("raw_data")));
        let err = signer
            .sign_container(key, &address, ContainerTransaction { raw_data: vec![1], ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, WalletError::MissingRequiredField("input_count")));
    }

    #[test]
    fn test_input_count_is_capped() {
        let (key, address, signer) = fixture();
        let signer = signer.with_max_inputs(4);
        let tx = ContainerTransaction { raw_data: vec![1], input_count: u32::MAX, signatures: vec![] };
        let err = signer.sign_container(key.clone(), &address, tx).unwrap_err();
        assert!(matches!(err, WalletError::InvalidRange { from: 0, to } if to == u32::MAX - 1));

        let tx = ContainerTransaction { raw_data: vec![1], input_count: 4, signatures: vec![] };
        assert_eq!(signer.sign_container(key, &address, tx).expect("at the cap").signatures.len(), 4);
    }

    #[test]
    fn test_digest_algorithms_differ() {
        assert_ne!(DigestAlgorithm::Sha256.digest(b"x"), DigestAlgorithm::DoubleSha256.digest(b"x"));
        assert_eq!(DigestAlgorithm::DoubleSha256.digest(b"x"), sha256(&sha256(b"x")));
    }

    #[test]
    fn test_payload_roundtrip_through_trait() {
        let (key, address, signer) = fixture();
        let payload = ContainerTransaction { raw_data: vec![9; 10], input_count: 1, signatures: vec![] }
            .encode()
            .expect("encode");
        let out = signer.sign_transaction(key, &address, &payload).expect("sign");
        let decoded = ContainerTransaction::decode(&out).expect("decode");
        assert_eq!(decoded.signatures.len(), 1);
        assert_eq!(decoded.raw_data, vec![9; 10]);
    }
}
