use secp256k1::ecdsa::{RecoverableSignature, RecoveryId, Signature};
use secp256k1::{Message, PublicKey, SecretKey};

use crate::core::errors::WalletError;
use crate::crypto::hd_key::SECP256K1;
use crate::security::SecretBuffer;

/// Compact recoverable ECDSA signature with a raw 0/1 recovery id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSig {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub recovery_id: u8,
}

impl RecoverableSig {
    /// `r ‖ s ‖ recovery_id`, 65 bytes.
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.recovery_id;
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        if bytes.len() != 65 {
            return Err(WalletError::SignatureRecoveryFailed(format!(
                "signature must be 65 bytes, got {}",
                bytes.len()
            )));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self { r, s, recovery_id: bytes[64] })
    }
}

/// Signs a 32-byte digest. The key bytes are only borrowed for the duration of the call.
pub fn sign_prehash_recoverable(
    key: &SecretBuffer<32>,
    digest: &[u8; 32],
) -> Result<RecoverableSig, WalletError> {
    let message = Message::from_slice(digest).map_err(|e| WalletError::SigningFailed(e.to_string()))?;
    let secret = key
        .with_secret(|k| SecretKey::from_slice(k))
        .map_err(|e| WalletError::SigningFailed(e.to_string()))?;
    let signature = SECP256K1.sign_ecdsa_recoverable(&message, &secret);
    let (recid, compact) = signature.serialize_compact();

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&compact[..32]);
    s.copy_from_slice(&compact[32..]);
    let recovery_id = u8::try_from(recid.to_i32())
        .map_err(|_| WalletError::SigningFailed("recovery id out of range".to_string()))?;
    Ok(RecoverableSig { r, s, recovery_id })
}

/// Recovers the signer's public key from a digest and an `(R, S, V)` triple whose V has
/// already been normalized to 27/28. High-S signatures are rejected.
pub fn recover_public_key(
    digest: &[u8; 32],
    r: &[u8; 32],
    s: &[u8; 32],
    v: u8,
) -> Result<PublicKey, WalletError> {
    if v != 27 && v != 28 {
        return Err(WalletError::SignatureRecoveryFailed(format!("invalid V value {}", v)));
    }
    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(r);
    compact[32..].copy_from_slice(s);
    if ensure_low_s(&compact) != compact {
        return Err(WalletError::SignatureRecoveryFailed("S value is not canonical".to_string()));
    }

    let recid = RecoveryId::from_i32(i32::from(v - 27))
        .map_err(|e| WalletError::SignatureRecoveryFailed(e.to_string()))?;
    let signature = RecoverableSignature::from_compact(&compact, recid)
        .map_err(|e| WalletError::SignatureRecoveryFailed(e.to_string()))?;
    let message = Message::from_slice(digest)
        .map_err(|e| WalletError::SignatureRecoveryFailed(e.to_string()))?;
    SECP256K1
        .recover_ecdsa(&message, &signature)
        .map_err(|e| WalletError::SignatureRecoveryFailed(e.to_string()))
}

/// Ensure ECDSA signature uses low-S value (s <= n/2) to avoid malleability.
pub fn ensure_low_s(compact_sig: &[u8; 64]) -> [u8; 64] {
    match Signature::from_compact(compact_sig) {
        Ok(mut sig) => {
            sig.normalize_s();
            sig.serialize_compact()
        }
        Err(_) => *compact_sig,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SecretBuffer<32> {
        SecretBuffer::new([1u8; 32])
    }

    #[test]
    fn test_sign_then_recover() {
        let digest = [2u8; 32];
        let sig = sign_prehash_recoverable(&key(), &digest).expect("sign");
        assert!(sig.recovery_id <= 1);

        let recovered =
            recover_public_key(&digest, &sig.r, &sig.s, sig.recovery_id + 27).expect("recover");
        let expected = PublicKey::from_secret_key(
            &SECP256K1,
            &SecretKey::from_slice(&[1u8; 32]).expect("sk"),
        );
        assert_eq!(recovered, expected);
    }

    #[test]
    fn test_recover_rejects_raw_recovery_id() {
        let digest = [3u8; 32];
        let sig = sign_prehash_recoverable(&key(), &digest).expect("sign");
        assert!(matches!(
            recover_public_key(&digest, &sig.r, &sig.s, sig.recovery_id),
            Err(WalletError::SignatureRecoveryFailed(_))
        ));
    }

    #[test]
    fn test_signatures_are_low_s() {
        let sig = sign_prehash_recoverable(&key(), &[4u8; 32]).expect("sign");
        let mut compact = [0u8; 64];
        compact[..32].copy_from_slice(&sig.r);
        compact[32..].copy_from_slice(&sig.s);
        assert_eq!(ensure_low_s(&compact), compact);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let sig = sign_prehash_recoverable(&key(), &[5u8; 32]).expect("sign");
        assert_eq!(RecoverableSig::from_bytes(&sig.to_bytes()).expect("parse"), sig);
        assert!(RecoverableSig::from_bytes(&[0u8; 64]).is_err());
    }
}
