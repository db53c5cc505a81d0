//! Error handling for the SAML authority core.
//!
//! Error messages are informative for operators but never include key
//! material or passwords.

use thiserror::Error;

/// Result type alias using the core error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unknown character set label.
    #[error("unsupported character set: {0}")]
    UnsupportedCharset(String),

    /// Bytes could not be decoded with the configured character set.
    #[error("cannot decode bytes as {charset}: {reason}")]
    Decode {
        /// Label of the character set used.
        charset: &'static str,
        /// Decoder failure description.
        reason: String,
    },
}

impl Error {
    /// Returns whether this error stems from configuration rather than data.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::UnsupportedCharset(_))
    }
}
