//! Character sets for decoding byte-valued subject properties.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Character set used to turn raw bytes into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Charset {
    /// UTF-8.
    #[default]
    Utf8,
    /// ISO-8859-1 (every byte maps to the code point of the same value).
    Latin1,
    /// 7-bit US-ASCII.
    Ascii,
}

impl Charset {
    /// Returns the canonical label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Latin1 => "iso-8859-1",
            Self::Ascii => "us-ascii",
        }
    }

    /// Parses a character set label, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCharset`] for unknown labels.
    pub fn from_label(label: &str) -> Result<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "iso-8859-1" | "iso8859-1" | "latin-1" | "latin1" => Ok(Self::Latin1),
            "us-ascii" | "ascii" => Ok(Self::Ascii),
            _ => Err(Error::UnsupportedCharset(label.to_string())),
        }
    }

    /// Decodes `bytes` into a string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the bytes are not valid in this charset.
    pub fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            Self::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_string)
                .map_err(|e| Error::Decode {
                    charset: self.label(),
                    reason: e.to_string(),
                }),
            Self::Latin1 => Ok(bytes.iter().copied().map(char::from).collect()),
            Self::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(offset) => Err(Error::Decode {
                    charset: self.label(),
                    reason: format!("byte {:#04x} at offset {offset}", bytes[offset]),
                }),
                None => Ok(bytes.iter().copied().map(char::from).collect()),
            },
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<String> for Charset {
    type Error = Error;

    fn try_from(label: String) -> Result<Self> {
        Self::from_label(&label)
    }
}

impl From<Charset> for String {
    fn from(charset: Charset) -> Self {
        charset.label().to_string()
    }
}
