//! Key loading and signature errors.

use thiserror::Error;

/// Result type for key operations.
pub type KeyResult<T> = Result<T, KeyError>;

/// Error type for key operations.
///
/// Messages never include key bytes or passwords.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Input is neither valid PEM nor DER.
    #[error("malformed key data: {0}")]
    Malformed(String),

    /// PEM block with a label this crate cannot load.
    #[error("unsupported PEM block: {0}")]
    UnsupportedPemLabel(String),

    /// Encrypted key could not be decrypted.
    #[error("cannot decrypt private key: {0}")]
    Decrypt(String),

    /// Key was rejected by the crypto backend.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Certificate could not be parsed.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// Key type or curve not supported.
    #[error("algorithm not supported: {0}")]
    UnsupportedAlgorithm(String),

    /// Signing failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Signing was requested from a verification-only key.
    #[error("key {0} cannot sign")]
    NotASigningKey(String),
}
