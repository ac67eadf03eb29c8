//! Secret buffers that are page-locked while alive and zeroed when dropped.
use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::security::memory_protection::{lock_memory, unlock_memory};

/// Common alias for variable-length secret byte buffers which will be zeroed when dropped.
pub type SecretVec = Zeroizing<Vec<u8>>;

/// Convert a Vec<u8> into a `SecretVec` which will be zeroized on drop.
pub fn vec_to_secret(v: Vec<u8>) -> SecretVec {
    Zeroizing::new(v)
}

/// Fixed-size secret (private scalar, chain code).
///
/// The bytes live on the heap so the locked page range stays valid for the buffer's
/// whole life. Every exit path, including unwinding, runs `Drop`, which zeroes the bytes
/// before the allocation is released.
pub struct SecretBuffer<const N: usize = 32> {
    bytes: Box<[u8; N]>,
    locked: bool,
}

impl<const N: usize> SecretBuffer<N> {
    pub fn new(bytes: [u8; N]) -> Self {
        let mut bytes = bytes;
        let boxed = Box::new(bytes);
        bytes.zeroize();
        Self::from_boxed(boxed)
    }

    /// Copies `slice` into a new buffer. Fails when the length is not `N`.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != N {
            return None;
        }
        let mut boxed = Box::new([0u8; N]);
        boxed.copy_from_slice(slice);
        Some(Self::from_boxed(boxed))
    }

    fn from_boxed(bytes: Box<[u8; N]>) -> Self {
        let locked = match lock_memory(bytes.as_ptr(), N) {
            Ok(()) => true,
            Err(e) => {
                tracing::trace!("mlock of secret buffer failed: {}", e);
                false
            }
        };
        Self { bytes, locked }
    }

    /// Scoped read access. The closure must not copy the bytes out.
    pub fn with_secret<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[u8; N]) -> R,
    {
        f(&self.bytes)
    }

    pub fn expose(&self) -> &[u8; N] {
        &self.bytes
    }

    pub fn is_zeroed(&self) -> bool {
        self.bytes.iter().all(|b| *b == 0)
    }
}

impl<const N: usize> Clone for SecretBuffer<N> {
    fn clone(&self) -> Self {
        let mut boxed = Box::new([0u8; N]);
        boxed.copy_from_slice(&self.bytes[..]);
        Self::from_boxed(boxed)
    }
}

impl<const N: usize> Zeroize for SecretBuffer<N> {
    fn zeroize(&mut self) {
        self.bytes[..].zeroize();
    }
}

impl<const N: usize> Drop for SecretBuffer<N> {
    fn drop(&mut self) {
        self.bytes[..].zeroize();
        if self.locked {
            let _ = unlock_memory(self.bytes.as_ptr(), N);
        }
    }
}

impl<const N: usize> ZeroizeOnDrop for SecretBuffer<N> {}

impl<const N: usize> PartialEq for SecretBuffer<N> {
    fn eq(&self, other: &Self) -> bool {
        use subtle::ConstantTimeEq;
        self.bytes[..].ct_eq(&other.bytes[..]).into()
    }
}

impl<const N: usize> Eq for SecretBuffer<N> {}

impl<const N: usize> fmt::Debug for SecretBuffer<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBuffer<{}>([REDACTED])", N)
    }
}
