//! EVM transaction signing and sender recovery.
//!
//! V conventions differ per transaction type:
//! - legacy: `recovery_id + chain_id * 2 + 35` (EIP-155)
//! - access-list / dynamic-fee: raw `0` / `1`, normalized with `+27` before recovery
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Signature, H256, U256};
use tracing::debug;

use crate::blockchain::ethereum::address::{parse_address, public_key_to_address};
use crate::blockchain::ethereum::transaction::{EvmTxRequest, EvmTxType};
use crate::blockchain::traits::ChainSigner;
use crate::core::errors::WalletError;
use crate::crypto::signature_utils::{recover_public_key, sign_prehash_recoverable};
use crate::security::SecretBuffer;

/// Result of signing one EVM transaction.
#[derive(Debug, Clone)]
pub struct SignedEvmTransaction {
    pub tx_type: EvmTxType,
    pub chain_id: u64,
    pub sighash: H256,
    pub signature: Signature,
    /// EIP-2718 envelope (or plain RLP for legacy) ready for broadcast.
    pub raw: Vec<u8>,
}

impl SignedEvmTransaction {
    pub fn recover_sender(&self) -> Result<Address, WalletError> {
        recover_signer(self.tx_type, self.chain_id, &self.sighash, &self.signature)
    }
}

#[derive(Debug, Clone)]
pub struct EvmSigner {
    chain_id: u64,
}

impl EvmSigner {
    pub fn new(chain_id: u64) -> Self {
        Self { chain_id }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Signs `request` and checks that the signature recovers to `expected_sender`.
    pub fn sign_request(
        &self,
        key: SecretBuffer<32>,
        expected_sender: Address,
        request: &EvmTxRequest,
    ) -> Result<SignedEvmTransaction, WalletError> {
        let tx_type = request.tx_type();
        let tx = request.to_typed_transaction(self.chain_id, expected_sender)?;
        let sighash = tx.sighash();

        let sig = sign_prehash_recoverable(&key, sighash.as_fixed_bytes())?;
        drop(key);

        let v = match tx_type {
            EvmTxType::Legacy => legacy_v(sig.recovery_id, self.chain_id)?,
            EvmTxType::AccessList | EvmTxType::DynamicFee => u64::from(sig.recovery_id),
        };
        let signature = Signature {
            r: U256::from_big_endian(&sig.r),
            s: U256::from_big_endian(&sig.s),
            v,
        };

        let recovered = recover_signer(tx_type, self.chain_id, &sighash, &signature)?;
        if recovered != expected_sender {
            return Err(WalletError::SignatureRecoveryFailed(format!(
                "recovered {:?}, expected {:?}",
                recovered, expected_sender
            )));
        }
        debug!(chain_id = self.chain_id, ?tx_type, "signed EVM transaction");

        Ok(SignedEvmTransaction {
            tx_type,
            chain_id: self.chain_id,
            sighash,
            raw: encode_signed(&tx, &signature),
            signature,
        })
    }
}

impl ChainSigner for EvmSigner {
    fn sign_transaction(
        &self,
        key: SecretBuffer<32>,
        signer_address: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>, WalletError> {
        let request = EvmTxRequest::decode(payload)?;
        let sender = parse_address(signer_address)?;
        Ok(self.sign_request(key, sender, &request)?.raw)
    }
}

fn encode_signed(tx: &TypedTransaction, signature: &Signature) -> Vec<u8> {
    tx.rlp_signed(signature).to_vec()
}

fn legacy_v(recovery_id: u8, chain_id: u64) -> Result<u64, WalletError> {
    chain_id
        .checked_mul(2)
        .and_then(|v| v.checked_add(35 + u64::from(recovery_id)))
        .ok_or_else(|| WalletError::SigningFailed(format!("chain id {} overflows V", chain_id)))
}

/// Maps a signature's V to the 27/28 form expected by public key recovery.
pub fn recovery_v(tx_type: EvmTxType, chain_id: u64, v: u64) -> Result<u8, WalletError> {
    let invalid = || {
        WalletError::SignatureRecoveryFailed(format!("invalid V {} for {:?} transaction", v, tx_type))
    };
    match tx_type {
        EvmTxType::Legacy => {
            if v == 27 || v == 28 {
                return Ok(v as u8);
            }
            let base = chain_id
                .checked_mul(2)
                .and_then(|b| b.checked_add(35))
                .ok_or_else(invalid)?;
            match v.checked_sub(base) {
                Some(recid @ 0..=1) => Ok(27 + recid as u8),
                _ => Err(invalid()),
            }
        }
        EvmTxType::AccessList | EvmTxType::DynamicFee => match v {
            0 | 1 => Ok(27 + v as u8),
            _ => Err(invalid()),
        },
    }
}

/// Recovers the sending address from a signing hash and `(R, S, V)`.
pub fn recover_signer(
    tx_type: EvmTxType,
    chain_id: u64,
    sighash: &H256,
    signature: &Signature,
) -> Result<Address, WalletError> {
    let v = recovery_v(tx_type, chain_id, signature.v)?;
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    signature.r.to_big_endian(&mut r);
    signature.s.to_big_endian(&mut s);
    let public_key = recover_public_key(sighash.as_fixed_bytes(), &r, &s, v)?;
    Ok(public_key_to_address(&public_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::ethereum::transaction::{DynamicFeeTxData, LegacyTxData};
    use crate::crypto::hd_key::SECP256K1;
    use ethers::types::Bytes;
    use secp256k1::{PublicKey, SecretKey};

    fn key_and_address() -> (SecretBuffer<32>, Address) {
        let raw = [0x21u8; 32];
        let pk = PublicKey::from_secret_key(&SECP256K1, &SecretKey::from_slice(&raw).expect("sk"));
        (SecretBuffer::new(raw), public_key_to_address(&pk))
    }

    fn legacy() -> EvmTxRequest {
        EvmTxRequest::Legacy(LegacyTxData {
            nonce: 0,
            gas: 21_000,
            gas_price: Some(U256::from(1_000_000_000u64)),
            to: Some(Address::repeat_byte(0xAA)),
            value: Some(U256::from(10u64)),
            data: Bytes::default(),
        })
    }

    #[test]
    fn test_legacy_v_is_eip155() {
        let (key, from) = key_and_address();
        let signed = EvmSigner::new(1).sign_request(key, from, &legacy()).expect("sign");
        assert!(signed.signature.v == 37 || signed.signature.v == 38);
        assert_eq!(signed.recover_sender().expect("recover"), from);
        // legacy envelopes are bare RLP lists
        assert!(signed.raw[0] >= 0xc0);
    }

    #[test]
    fn test_dynamic_fee_v_is_raw() {
        let (key, from) = key_and_address();
        let req = EvmTxRequest::DynamicFee(DynamicFeeTxData {
            nonce: 2,
            gas: 21_000,
            max_priority_fee_per_gas: Some(U256::from(2u64)),
            max_fee_per_gas: Some(U256::from(100u64)),
            to: Some(Address::repeat_byte(0xBB)),
            value: Some(U256::from(1u64)),
            ..Default::default()
        });
        let signed = EvmSigner::new(137).sign_request(key, from, &req).expect("sign");
        assert!(signed.signature.v <= 1);
        assert_eq!(signed.raw[0], 0x02);
        assert_eq!(signed.recover_sender().expect("recover"), from);
    }

    #[test]
    fn test_wrong_sender_is_rejected() {
        let (key, _) = key_and_address();
        let err = EvmSigner::new(1)
            .sign_request(key, Address::repeat_byte(0x01), &legacy())
            .unwrap_err();
        assert!(matches!(err, WalletError::SignatureRecoveryFailed(_)));
    }

    #[test]
    fn test_recovery_v_rules() {
        assert_eq!(recovery_v(EvmTxType::Legacy, 1, 37).expect("v"), 27);
        assert_eq!(recovery_v(EvmTxType::Legacy, 1, 38).expect("v"), 28);
        assert_eq!(recovery_v(EvmTxType::Legacy, 1, 28).expect("v"), 28);
        assert!(recovery_v(EvmTxType::Legacy, 1, 39).is_err());
        assert!(recovery_v(EvmTxType::Legacy, 5, 37).is_err());
        assert_eq!(recovery_v(EvmTxType::DynamicFee, 1, 1).expect("v"), 28);
        assert!(recovery_v(EvmTxType::AccessList, 1, 27).is_err());
    }

    #[test]
    fn test_chain_signer_payload_path() {
        let (key, from) = key_and_address();
        let payload = legacy().encode().expect("encode");
        let raw = EvmSigner::new(1)
            .sign_transaction(key, &format!("{:?}", from), &payload)
            .expect("sign");
        assert!(!raw.is_empty());
    }
}
