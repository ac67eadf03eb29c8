use std::fmt;

/// Broad error classes used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad request data; report to the caller, never retry.
    Input,
    /// Secret material or derived key failed a consistency check.
    Integrity,
    /// Operation conflicts with the current object state.
    State,
    /// A collaborator (storage, decryption) failed.
    Transient,
}

/// Custom error type for wallet operations.
#[derive(Debug)]
pub enum WalletError {
    /// Seed shorter than 128 bits.
    InvalidSeedLength(usize),
    /// Derived scalar was zero or not below the curve order.
    InvalidChildKey(u32),
    /// No wallet record for the requested identity.
    WalletNotFound(String),
    /// The wallet record exists but is disabled.
    WalletDisabled(String),
    /// Envelope decryption of the mnemonic failed.
    DecryptionFailed(String),
    /// SHA-256 of the decrypted mnemonic differs from the stored hash.
    MnemonicIntegrityMismatch(String),
    /// Range request with `from > to` or too many elements.
    InvalidRange { from: u32, to: u32 },
    /// Transaction payload type is not signable by this chain.
    UnsupportedTransactionType(String),
    /// Transaction payload is missing a mandatory field.
    MissingRequiredField(&'static str),
    /// Public key recovery failed or did not match the signer.
    SignatureRecoveryFailed(String),
    /// A set-once chain parameter was set twice.
    AlreadySet(&'static str),
    /// No plugin is registered for the chain.
    UnsupportedChain(String),
    /// Key material was used after `clear_secrets`.
    KeyCleared,
    /// The pool unit was shut down and will not load again.
    UnitClosed(String),
    /// Configuration-related errors.
    ConfigError(String),
    /// Storage-related errors.
    StorageError(String),
    /// Mnemonic generation/parsing errors.
    MnemonicError(String),
    /// Key derivation errors.
    KeyDerivationError(String),
    /// Address derivation errors.
    AddressError(String),
    /// Signing failed errors.
    SigningFailed(String),
    /// Serialization/deserialization errors.
    SerializationError(String),
    /// Internal errors.
    InternalError(String),
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletError::InvalidSeedLength(len) => {
                write!(f, "Invalid seed length: {} bytes (minimum 16)", len)
            }
            WalletError::InvalidChildKey(index) => {
                write!(f, "Invalid child key at index {}", index)
            }
            WalletError::WalletNotFound(msg) => write!(f, "Wallet not found: {}", msg),
            WalletError::WalletDisabled(msg) => write!(f, "Wallet disabled: {}", msg),
            WalletError::DecryptionFailed(msg) => write!(f, "Decryption failed: {}", msg),
            WalletError::MnemonicIntegrityMismatch(msg) => {
                write!(f, "Mnemonic integrity mismatch: {}", msg)
            }
            WalletError::InvalidRange { from, to } => {
                write!(f, "Invalid address index range: {}..={}", from, to)
            }
            WalletError::UnsupportedTransactionType(msg) => {
                write!(f, "Unsupported transaction type: {}", msg)
            }
            WalletError::MissingRequiredField(field) => {
                write!(f, "Missing required field: {}", field)
            }
            WalletError::SignatureRecoveryFailed(msg) => {
                write!(f, "Signature recovery failed: {}", msg)
            }
            WalletError::AlreadySet(what) => write!(f, "Value already set: {}", what),
            WalletError::UnsupportedChain(msg) => write!(f, "Unsupported chain: {}", msg),
            WalletError::KeyCleared => write!(f, "Key material has been cleared"),
            WalletError::UnitClosed(msg) => write!(f, "Pool unit closed: {}", msg),
            WalletError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            WalletError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            WalletError::MnemonicError(msg) => write!(f, "Mnemonic error: {}", msg),
            WalletError::KeyDerivationError(msg) => write!(f, "Key derivation error: {}", msg),
            WalletError::AddressError(msg) => write!(f, "Address error: {}", msg),
            WalletError::SigningFailed(msg) => write!(f, "Signing failed: {}", msg),
            WalletError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            WalletError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for WalletError {}

impl WalletError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            WalletError::InvalidRange { .. }
            | WalletError::UnsupportedTransactionType(_)
            | WalletError::MissingRequiredField(_)
            | WalletError::InvalidSeedLength(_)
            | WalletError::MnemonicError(_)
            | WalletError::SerializationError(_)
            | WalletError::UnsupportedChain(_)
            | WalletError::ConfigError(_) => ErrorCategory::Input,
            WalletError::MnemonicIntegrityMismatch(_)
            | WalletError::InvalidChildKey(_)
            | WalletError::SignatureRecoveryFailed(_)
            | WalletError::KeyDerivationError(_) => ErrorCategory::Integrity,
            WalletError::AlreadySet(_)
            | WalletError::WalletNotFound(_)
            | WalletError::WalletDisabled(_)
            | WalletError::KeyCleared
            | WalletError::UnitClosed(_) => ErrorCategory::State,
            WalletError::DecryptionFailed(_)
            | WalletError::StorageError(_)
            | WalletError::AddressError(_)
            | WalletError::SigningFailed(_)
            | WalletError::InternalError(_) => ErrorCategory::Transient,
        }
    }

    /// Integrity failures abort the current operation and must be logged.
    pub fn is_critical(&self) -> bool {
        self.category() == ErrorCategory::Integrity
    }

    /// The core never retries; this only tells the caller whether a retry could help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::DecryptionFailed(_) | WalletError::StorageError(_))
    }
}

impl From<anyhow::Error> for WalletError {
    fn from(err: anyhow::Error) -> Self {
        WalletError::InternalError(err.to_string())
    }
}

impl From<std::io::Error> for WalletError {
    fn from(err: std::io::Error) -> Self {
        WalletError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for WalletError {
    fn from(err: toml::de::Error) -> Self {
        WalletError::ConfigError(err.to_string())
    }
}

impl From<sqlx::Error> for WalletError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => WalletError::WalletNotFound("row not found".to_string()),
            other => WalletError::StorageError(other.to_string()),
        }
    }
}

impl From<secp256k1::Error> for WalletError {
    fn from(err: secp256k1::Error) -> Self {
        WalletError::KeyDerivationError(err.to_string())
    }
}
