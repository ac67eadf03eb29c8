//! BIP32 extended keys over secp256k1.
//!
//! A [`KeyBundle`] holds one node of the derivation tree: the private scalar, its public
//! point, the chain code and the node metadata (depth, parent fingerprint, child number).
//! Secret parts live in [`SecretBuffer`]s, so dropping a bundle or calling
//! [`KeyBundle::clear_secrets`] zeroes them.
use std::fmt;

use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use secp256k1::{All, PublicKey, Scalar, Secp256k1, SecretKey};
use sha2::Sha512;
use zeroize::{Zeroize, Zeroizing};

use crate::core::errors::WalletError;
use crate::crypto::hash::{base58check_decode, base58check_encode, hash160};
use crate::security::SecretBuffer;

type HmacSha512 = Hmac<Sha512>;

/// Shared signing/verification context; building one per call is expensive.
pub(crate) static SECP256K1: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

pub const HARDENED_OFFSET: u32 = 0x8000_0000;
pub const MIN_SEED_LEN: usize = 16;
pub const MAX_SEED_LEN: usize = 64;
const MASTER_HMAC_KEY: &[u8] = b"Bitcoin seed";
const SERIALIZED_LEN: usize = 78;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    Secp256k1,
}

/// Version bytes used when exporting extended keys, plus the curve the keys live on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkParams {
    pub private_version: [u8; 4],
    pub public_version: [u8; 4],
    pub curve: Curve,
}

impl NetworkParams {
    /// `xprv` / `xpub`
    pub const MAINNET: NetworkParams = NetworkParams {
        private_version: [0x04, 0x88, 0xAD, 0xE4],
        public_version: [0x04, 0x88, 0xB2, 0x1E],
        curve: Curve::Secp256k1,
    };

    /// `tprv` / `tpub`
    pub const TESTNET: NetworkParams = NetworkParams {
        private_version: [0x04, 0x35, 0x83, 0x94],
        public_version: [0x04, 0x35, 0x87, 0xCF],
        curve: Curve::Secp256k1,
    };
}

struct KeyMaterial {
    private_key: SecretBuffer<32>,
    public_key: PublicKey,
    chain_code: SecretBuffer<32>,
}

pub struct KeyBundle {
    material: Option<KeyMaterial>,
    depth: u16,
    parent_fingerprint: [u8; 4],
    child_number: u32,
    network: Option<NetworkParams>,
}

impl KeyBundle {
    /// Builds the master node: HMAC-SHA512 keyed with "Bitcoin seed".
    pub fn master_from_seed(seed: &[u8], network: NetworkParams) -> Result<Self, WalletError> {
        if seed.len() < MIN_SEED_LEN || seed.len() > MAX_SEED_LEN {
            return Err(WalletError::InvalidSeedLength(seed.len()));
        }

        let mut mac = HmacSha512::new_from_slice(MASTER_HMAC_KEY)
            .map_err(|e| WalletError::KeyDerivationError(e.to_string()))?;
        mac.update(seed);
        let digest = split_hmac(mac);

        let secret = SecretKey::from_slice(&digest[..32])
            .map_err(|_| WalletError::KeyDerivationError("unusable seed".to_string()))?;
        Self::from_parts(secret, &digest[32..], 0, [0u8; 4], 0, network)
    }

    /// Derives child `index`. Indices at or above [`HARDENED_OFFSET`] use hardened derivation.
    ///
    /// Returns [`WalletError::InvalidChildKey`] when IL is not below the curve order or the
    /// child scalar is zero; callers move on to the next index in that case.
    pub fn derive(&self, index: u32) -> Result<KeyBundle, WalletError> {
        let material = self.material()?;
        let network = self.network.ok_or(WalletError::KeyCleared)?;
        if self.depth >= u8::MAX as u16 {
            return Err(WalletError::KeyDerivationError("maximum depth exceeded".to_string()));
        }

        let mut mac = HmacSha512::new_from_slice(material.chain_code.expose())
            .map_err(|e| WalletError::KeyDerivationError(e.to_string()))?;
        if index >= HARDENED_OFFSET {
            mac.update(&[0u8]);
            material.private_key.with_secret(|k| mac.update(k));
        } else {
            mac.update(&material.public_key.serialize());
        }
        mac.update(&index.to_be_bytes());
        let digest = split_hmac(mac);

        let mut il = Zeroizing::new([0u8; 32]);
        il.copy_from_slice(&digest[..32]);
        let tweak = Scalar::from_be_bytes(*il).map_err(|_| WalletError::InvalidChildKey(index))?;

        let parent = material
            .private_key
            .with_secret(|k| SecretKey::from_slice(k))
            .map_err(|_| WalletError::KeyCleared)?;
        let child = parent
            .add_tweak(&tweak)
            .map_err(|_| WalletError::InvalidChildKey(index))?;

        Self::from_parts(
            child,
            &digest[32..],
            self.depth + 1,
            self.fingerprint()?,
            index,
            network,
        )
    }

    /// Derives each index in order from this node.
    pub fn derive_indices(&self, indices: &[u32]) -> Result<KeyBundle, WalletError> {
        let mut iter = indices.iter();
        let first = match iter.next() {
            Some(index) => *index,
            None => return Err(WalletError::KeyDerivationError("empty path".to_string())),
        };
        let mut node = self.derive(first)?;
        for index in iter {
            let mut next = node.derive(*index)?;
            std::mem::swap(&mut node, &mut next);
            next.clear_secrets();
        }
        Ok(node)
    }

    fn from_parts(
        secret: SecretKey,
        chain_code: &[u8],
        depth: u16,
        parent_fingerprint: [u8; 4],
        child_number: u32,
        network: NetworkParams,
    ) -> Result<Self, WalletError> {
        let public_key = PublicKey::from_secret_key(&SECP256K1, &secret);
        let private_key = SecretBuffer::new(secret.secret_bytes());
        let chain_code = SecretBuffer::from_slice(chain_code)
            .ok_or_else(|| WalletError::InternalError("chain code must be 32 bytes".to_string()))?;
        Ok(Self {
            material: Some(KeyMaterial { private_key, public_key, chain_code }),
            depth,
            parent_fingerprint,
            child_number,
            network: Some(network),
        })
    }

    fn material(&self) -> Result<&KeyMaterial, WalletError> {
        self.material.as_ref().ok_or(WalletError::KeyCleared)
    }

    pub fn private_key(&self) -> Result<&SecretBuffer<32>, WalletError> {
        Ok(&self.material()?.private_key)
    }

    pub fn public_key(&self) -> Result<PublicKey, WalletError> {
        Ok(self.material()?.public_key)
    }

    pub fn depth(&self) -> u16 {
        self.depth
    }

    pub fn parent_fingerprint(&self) -> [u8; 4] {
        self.parent_fingerprint
    }

    pub fn child_number(&self) -> u32 {
        self.child_number
    }

    pub fn network(&self) -> Option<NetworkParams> {
        self.network
    }

    /// First four bytes of HASH160 of the compressed public key.
    pub fn fingerprint(&self) -> Result<[u8; 4], WalletError> {
        let digest = hash160(&self.public_key()?.serialize());
        let mut out = [0u8; 4];
        out.copy_from_slice(&digest[..4]);
        Ok(out)
    }

    pub fn is_cleared(&self) -> bool {
        self.material.is_none()
    }

    /// Zeroes the private scalar and chain code and forgets the network parameters.
    /// Every accessor returns [`WalletError::KeyCleared`] afterwards.
    pub fn clear_secrets(&mut self) {
        if let Some(mut material) = self.material.take() {
            material.private_key.zeroize();
            material.chain_code.zeroize();
        }
        self.network = None;
    }

    /// BIP32 serialization of the private node (`xprv...` on mainnet).
    pub fn to_extended_private(&self) -> Result<Zeroizing<String>, WalletError> {
        let material = self.material()?;
        let network = self.network.ok_or(WalletError::KeyCleared)?;
        let mut key_data = Zeroizing::new([0u8; 33]);
        key_data[1..].copy_from_slice(material.private_key.expose());
        self.serialize(network.private_version, &key_data)
    }

    /// BIP32 serialization of the public node (`xpub...` on mainnet).
    pub fn to_extended_public(&self) -> Result<String, WalletError> {
        let material = self.material()?;
        let network = self.network.ok_or(WalletError::KeyCleared)?;
        let key_data = material.public_key.serialize();
        self.serialize(network.public_version, &key_data).map(|s| s.to_string())
    }

    fn serialize(&self, version: [u8; 4], key_data: &[u8; 33]) -> Result<Zeroizing<String>, WalletError> {
        let material = self.material()?;
        let depth = u8::try_from(self.depth)
            .map_err(|_| WalletError::KeyDerivationError("depth does not fit in one byte".to_string()))?;

        let mut buf = Zeroizing::new(Vec::with_capacity(SERIALIZED_LEN));
        buf.extend_from_slice(&version);
        buf.push(depth);
        buf.extend_from_slice(&self.parent_fingerprint);
        buf.extend_from_slice(&self.child_number.to_be_bytes());
        buf.extend_from_slice(material.chain_code.expose());
        buf.extend_from_slice(key_data);
        Ok(Zeroizing::new(base58check_encode(&buf)))
    }

    /// Parses an extended private key produced by [`KeyBundle::to_extended_private`].
    pub fn from_extended_private(encoded: &str, network: NetworkParams) -> Result<Self, WalletError> {
        let raw = Zeroizing::new(
            base58check_decode(encoded)
                .ok_or_else(|| WalletError::KeyDerivationError("bad extended key checksum".to_string()))?,
        );
        if raw.len() != SERIALIZED_LEN {
            return Err(WalletError::KeyDerivationError(format!(
                "extended key must be {} bytes, got {}",
                SERIALIZED_LEN,
                raw.len()
            )));
        }
        if raw[..4] != network.private_version {
            return Err(WalletError::KeyDerivationError("unexpected version bytes".to_string()));
        }
        if raw[45] != 0 {
            return Err(WalletError::KeyDerivationError("not a private extended key".to_string()));
        }

        let mut parent_fingerprint = [0u8; 4];
        parent_fingerprint.copy_from_slice(&raw[5..9]);
        let mut child = [0u8; 4];
        child.copy_from_slice(&raw[9..13]);
        let secret = SecretKey::from_slice(&raw[46..78])
            .map_err(|e| WalletError::KeyDerivationError(e.to_string()))?;

        Self::from_parts(
            secret,
            &raw[13..45],
            raw[4] as u16,
            parent_fingerprint,
            u32::from_be_bytes(child),
            network,
        )
    }
}

fn split_hmac(mac: HmacSha512) -> Zeroizing<[u8; 64]> {
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

impl fmt::Debug for KeyBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBundle")
            .field("depth", &self.depth)
            .field("parent_fingerprint", &hex::encode(self.parent_fingerprint))
            .field("child_number", &self.child_number)
            .field("cleared", &self.is_cleared())
            .finish()
    }
}
