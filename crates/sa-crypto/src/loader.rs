//! Loading keys and certificates from file contents.
//!
//! Private keys are read from PEM. Certificates may be PEM or raw DER; the
//! DER form is what gets published in metadata and compared for
//! deduplication.

use crate::error::{KeyError, KeyResult};
use crate::keys::{SigningKey, VerificationKey};

/// Password used when none is configured.
///
/// Decrypting an encrypted key with it fails cleanly instead of the key
/// loader ever asking for interactive input.
pub const NO_PASSWORD: &[u8] = b"fail";

/// Loads the authority's private key from PEM.
///
/// Accepted blocks are `PRIVATE KEY` (PKCS#8), `ENCRYPTED PRIVATE KEY`
/// (PKCS#8, PBES2) and `RSA PRIVATE KEY` (PKCS#1). Input that is not PEM is
/// tried as PKCS#8 DER. `password` only matters for encrypted keys.
///
/// # Errors
///
/// Returns [`KeyError::Decrypt`] when an encrypted key cannot be decrypted
/// with `password` (or [`NO_PASSWORD`]), [`KeyError::UnsupportedPemLabel`]
/// for other PEM blocks, and [`KeyError::InvalidKey`] for rejected keys.
pub fn load_private_key(data: &[u8], password: Option<&[u8]>) -> KeyResult<SigningKey> {
    if !is_pem(data) {
        return SigningKey::from_pkcs8(data);
    }

    let block = pem::parse(data).map_err(|e| KeyError::Malformed(format!("failed to parse PEM: {e}")))?;
    match block.tag() {
        "PRIVATE KEY" => SigningKey::from_pkcs8(block.contents()),
        "RSA PRIVATE KEY" => SigningKey::from_rsa_der(block.contents()),
        "ENCRYPTED PRIVATE KEY" => {
            let info = pkcs8::EncryptedPrivateKeyInfo::try_from(block.contents())
                .map_err(|e| KeyError::Malformed(format!("invalid encrypted PKCS#8: {e}")))?;
            if password.is_none() {
                tracing::debug!("no private key password configured, using sentinel");
            }
            let document = info
                .decrypt(password.unwrap_or(NO_PASSWORD))
                .map_err(|e| KeyError::Decrypt(e.to_string()))?;
            SigningKey::from_pkcs8(document.as_bytes())
        }
        other => Err(KeyError::UnsupportedPemLabel(other.to_string())),
    }
}

/// Returns the DER bytes of a certificate given as PEM or DER.
///
/// # Errors
///
/// Returns [`KeyError::Malformed`] for unparsable PEM and
/// [`KeyError::UnsupportedPemLabel`] for PEM blocks other than `CERTIFICATE`.
pub fn certificate_der(data: &[u8]) -> KeyResult<Vec<u8>> {
    if !is_pem(data) {
        return Ok(data.to_vec());
    }

    let block = pem::parse(data).map_err(|e| KeyError::Malformed(format!("failed to parse PEM: {e}")))?;
    if block.tag() != "CERTIFICATE" {
        return Err(KeyError::UnsupportedPemLabel(block.tag().to_string()));
    }
    Ok(block.contents().to_vec())
}

/// Loads a peer certificate given as PEM or DER.
///
/// # Errors
///
/// See [`certificate_der`] and [`VerificationKey::from_der`].
pub fn load_certificate(data: &[u8]) -> KeyResult<VerificationKey> {
    VerificationKey::from_der(&certificate_der(data)?)
}

fn is_pem(data: &[u8]) -> bool {
    data.trim_ascii_start().starts_with(b"-----BEGIN ")
}
