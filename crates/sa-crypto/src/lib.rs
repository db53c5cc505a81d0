//! # sa-crypto
//!
//! Key material for the SAML authority using aws-lc-rs.
//!
//! - [`SigningKey`] - the authority's own private key, loaded from PEM
//!   (PKCS#8, encrypted PKCS#8 or PKCS#1)
//! - [`VerificationKey`] - a peer's public key, taken from an X.509 certificate
//! - [`KeyMaterial`] - either of the two, as handed to signature contexts
//!
//! Supported XML-DSig algorithms are RSA-SHA256, ECDSA-SHA256 (P-256) and
//! ECDSA-SHA384 (P-384); SAML deployments still expect SHA-256.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod algorithm;
pub mod error;
pub mod hash;
pub mod keys;
pub mod loader;

pub use algorithm::KeyAlgorithm;
pub use error::{KeyError, KeyResult};
pub use hash::{fingerprint, sha256};
pub use keys::{KeyMaterial, SigningKey, VerificationKey};
pub use loader::{certificate_der, load_certificate, load_private_key, NO_PASSWORD};
