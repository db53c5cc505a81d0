//! Signing and verification keys.
//!
//! A [`SigningKey`] wraps an aws-lc-rs RSA or ECDSA key pair. A
//! [`VerificationKey`] is built from an X.509 certificate and keeps the
//! certificate bytes so that deduplication and metadata export can work on
//! the exact bytes that were published.

use std::fmt;
use std::sync::Arc;

use aws_lc_rs::{
    rand::SystemRandom,
    signature::{self, EcdsaKeyPair, KeyPair, RsaKeyPair, UnparsedPublicKey},
};
use base64::Engine;
use chrono::{DateTime, Utc};
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

use crate::algorithm::KeyAlgorithm;
use crate::error::{KeyError, KeyResult};

enum PrivateKey {
    Rsa(RsaKeyPair),
    Ecdsa(EcdsaKeyPair),
}

/// Private key used by the authority to sign its own messages.
pub struct SigningKey {
    key: PrivateKey,
    algorithm: KeyAlgorithm,
    public_key: Vec<u8>,
    key_id: String,
}

impl SigningKey {
    /// Creates a signing key from a PKCS#8 DER document.
    ///
    /// RSA is tried first, then ECDSA on P-256 and P-384.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidKey`] if no supported key type accepts it.
    pub fn from_pkcs8(pkcs8_der: &[u8]) -> KeyResult<Self> {
        if let Ok(key_pair) = RsaKeyPair::from_pkcs8(pkcs8_der) {
            return Ok(Self::from_rsa(key_pair));
        }

        for algorithm in [KeyAlgorithm::EcdsaP256Sha256, KeyAlgorithm::EcdsaP384Sha384] {
            let Some(signing) = algorithm.ecdsa_signing() else {
                continue;
            };
            if let Ok(key_pair) = EcdsaKeyPair::from_pkcs8(signing, pkcs8_der) {
                let public_key = key_pair.public_key().as_ref().to_vec();
                return Ok(Self {
                    key_id: generate_key_id(&public_key),
                    key: PrivateKey::Ecdsa(key_pair),
                    algorithm,
                    public_key,
                });
            }
        }

        Err(KeyError::InvalidKey(
            "PKCS#8 key is neither RSA nor ECDSA P-256/P-384".to_string(),
        ))
    }

    /// Creates a signing key from a PKCS#1 `RSAPrivateKey` DER document.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidKey`] if the key is rejected.
    pub fn from_rsa_der(der: &[u8]) -> KeyResult<Self> {
        let key_pair = RsaKeyPair::from_der(der)
            .map_err(|e| KeyError::InvalidKey(format!("invalid RSA DER key: {e}")))?;
        Ok(Self::from_rsa(key_pair))
    }

    fn from_rsa(key_pair: RsaKeyPair) -> Self {
        let public_key = key_pair.public_key().as_ref().to_vec();
        Self {
            key_id: generate_key_id(&public_key),
            key: PrivateKey::Rsa(key_pair),
            algorithm: KeyAlgorithm::RsaSha256,
            public_key,
        }
    }

    /// Returns the key ID.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Returns the signature algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// Signs the given data.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn sign(&self, data: &[u8]) -> KeyResult<Vec<u8>> {
        let rng = SystemRandom::new();
        match &self.key {
            PrivateKey::Rsa(key_pair) => {
                let mut sig = vec![0u8; key_pair.public_modulus_len()];
                key_pair
                    .sign(&signature::RSA_PKCS1_SHA256, &rng, data, &mut sig)
                    .map_err(|e| KeyError::Signing(format!("RSA signing failed: {e}")))?;
                Ok(sig)
            }
            PrivateKey::Ecdsa(key_pair) => key_pair
                .sign(&rng, data)
                .map(|sig| sig.as_ref().to_vec())
                .map_err(|e| KeyError::Signing(format!("ECDSA signing failed: {e}"))),
        }
    }

    /// Verifies a signature against this key's public half.
    #[must_use]
    pub fn verify(&self, data: &[u8], sig: &[u8]) -> bool {
        UnparsedPublicKey::new(self.algorithm.verification(), &self.public_key)
            .verify(data, sig)
            .is_ok()
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Public key taken from a peer's X.509 certificate.
#[derive(Clone)]
pub struct VerificationKey {
    certificate_der: Vec<u8>,
    public_key: Vec<u8>,
    algorithm: KeyAlgorithm,
    subject: String,
    not_after: Option<DateTime<Utc>>,
    key_id: String,
}

impl VerificationKey {
    /// Parses a DER-encoded X.509 certificate.
    ///
    /// Certificate validity dates are recorded but not enforced; trust in
    /// SAML metadata is bounded by the metadata's own validity.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidCertificate`] for unparsable input and
    /// [`KeyError::UnsupportedAlgorithm`] for key types other than RSA or
    /// ECDSA P-256/P-384.
    pub fn from_der(der: &[u8]) -> KeyResult<Self> {
        let (_, cert) = parse_x509_certificate(der)
            .map_err(|e| KeyError::InvalidCertificate(format!("failed to parse X.509: {e:?}")))?;

        let spki = cert.public_key();
        let public_key = spki.subject_public_key.data.to_vec();
        let algorithm = match spki.parsed() {
            Ok(PublicKey::RSA(_)) => KeyAlgorithm::RsaSha256,
            Ok(PublicKey::EC(_)) => match public_key.len() {
                65 => KeyAlgorithm::EcdsaP256Sha256,
                97 => KeyAlgorithm::EcdsaP384Sha384,
                n => {
                    return Err(KeyError::UnsupportedAlgorithm(format!(
                        "EC public key of {n} bytes"
                    )));
                }
            },
            Ok(_) => {
                return Err(KeyError::UnsupportedAlgorithm(format!(
                    "public key algorithm {}",
                    spki.algorithm.algorithm
                )));
            }
            Err(e) => {
                return Err(KeyError::InvalidCertificate(format!(
                    "unreadable public key: {e}"
                )));
            }
        };

        Ok(Self {
            key_id: generate_key_id(&public_key),
            subject: cert.subject().to_string(),
            not_after: DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0),
            certificate_der: der.to_vec(),
            public_key,
            algorithm,
        })
    }

    /// Returns the certificate bytes exactly as loaded.
    #[must_use]
    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate_der
    }

    /// Returns the certificate subject distinguished name.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the certificate's `notAfter` instant.
    #[must_use]
    pub const fn not_after(&self) -> Option<DateTime<Utc>> {
        self.not_after
    }

    /// Returns the key ID.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Returns the signature algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// Verifies a signature.
    #[must_use]
    pub fn verify(&self, data: &[u8], sig: &[u8]) -> bool {
        UnparsedPublicKey::new(self.algorithm.verification(), &self.public_key)
            .verify(data, sig)
            .is_ok()
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("key_id", &self.key_id)
            .field("subject", &self.subject)
            .field("algorithm", &self.algorithm)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

/// Key handed to signature contexts.
#[derive(Debug, Clone)]
pub enum KeyMaterial {
    /// The authority's own private key.
    Signing(Arc<SigningKey>),
    /// A peer's certificate.
    Verification(Arc<VerificationKey>),
}

impl KeyMaterial {
    /// Returns the key ID.
    #[must_use]
    pub fn key_id(&self) -> &str {
        match self {
            Self::Signing(key) => key.key_id(),
            Self::Verification(key) => key.key_id(),
        }
    }

    /// Returns the signature algorithm.
    #[must_use]
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Signing(key) => key.algorithm(),
            Self::Verification(key) => key.algorithm(),
        }
    }

    /// Returns whether this key can produce signatures.
    #[must_use]
    pub const fn can_sign(&self) -> bool {
        matches!(self, Self::Signing(_))
    }

    /// Returns the certificate bytes of a verification key.
    #[must_use]
    pub fn certificate_der(&self) -> Option<&[u8]> {
        match self {
            Self::Signing(_) => None,
            Self::Verification(key) => Some(key.certificate_der()),
        }
    }

    /// Signs the given data.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::NotASigningKey`] for verification keys, or the
    /// signing failure.
    pub fn sign(&self, data: &[u8]) -> KeyResult<Vec<u8>> {
        match self {
            Self::Signing(key) => key.sign(data),
            Self::Verification(key) => Err(KeyError::NotASigningKey(key.key_id().to_string())),
        }
    }

    /// Verifies a signature.
    #[must_use]
    pub fn verify(&self, data: &[u8], sig: &[u8]) -> bool {
        match self {
            Self::Signing(key) => key.verify(data, sig),
            Self::Verification(key) => key.verify(data, sig),
        }
    }
}

impl From<SigningKey> for KeyMaterial {
    fn from(key: SigningKey) -> Self {
        Self::Signing(Arc::new(key))
    }
}

impl From<VerificationKey> for KeyMaterial {
    fn from(key: VerificationKey) -> Self {
        Self::Verification(Arc::new(key))
    }
}

/// Generates a key ID from the public key bytes.
fn generate_key_id(public_key: &[u8]) -> String {
    let hash = crate::sha256(public_key);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&hash[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p256() -> (SigningKey, VerificationKey) {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["idp.example.org".to_string()]).unwrap();
        let signing = SigningKey::from_pkcs8(&key_pair.serialize_der()).unwrap();
        let verification = VerificationKey::from_der(cert.der()).unwrap();
        (signing, verification)
    }

    #[test]
    fn sign_and_verify_with_certificate() {
        let (signing, verification) = p256();
        assert_eq!(signing.algorithm(), KeyAlgorithm::EcdsaP256Sha256);
        assert_eq!(verification.algorithm(), KeyAlgorithm::EcdsaP256Sha256);
        assert_eq!(signing.key_id(), verification.key_id());

        let sig = signing.sign(b"<Assertion/>").unwrap();
        assert!(verification.verify(b"<Assertion/>", &sig));
        assert!(!verification.verify(b"<Assertion tampered=\"1\"/>", &sig));
        assert!(signing.verify(b"<Assertion/>", &sig));
    }

    #[test]
    fn p384_keys_are_detected() {
        let key_pair = rcgen::KeyPair::generate_for(&rcgen::PKCS_ECDSA_P384_SHA384).unwrap();
        let cert = rcgen::CertificateParams::new(vec!["sp.example.org".to_string()])
            .unwrap()
            .self_signed(&key_pair)
            .unwrap();

        let signing = SigningKey::from_pkcs8(&key_pair.serialize_der()).unwrap();
        let verification = VerificationKey::from_der(cert.der()).unwrap();
        assert_eq!(signing.algorithm(), KeyAlgorithm::EcdsaP384Sha384);
        assert_eq!(verification.algorithm(), KeyAlgorithm::EcdsaP384Sha384);

        let sig = signing.sign(b"metadata").unwrap();
        assert!(verification.verify(b"metadata", &sig));
    }

    #[test]
    fn verification_material_cannot_sign() {
        let (_, verification) = p256();
        let material = KeyMaterial::from(verification);
        assert!(!material.can_sign());
        assert!(material.certificate_der().is_some());
        assert!(matches!(material.sign(b"x"), Err(KeyError::NotASigningKey(_))));
    }

    #[test]
    fn garbage_certificate_is_rejected() {
        let err = VerificationKey::from_der(b"not a certificate").unwrap_err();
        assert!(matches!(err, KeyError::InvalidCertificate(_)));
    }

    #[test]
    fn debug_does_not_leak_key_bytes() {
        let (signing, _) = p256();
        let rendered = format!("{signing:?}");
        assert!(rendered.contains("key_id"));
        assert!(!rendered.contains("public_key"));
    }
}
