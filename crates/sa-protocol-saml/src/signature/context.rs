//! Key-backed signing and verification.

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use sa_core::EntityId;
use sa_crypto::{KeyAlgorithm, KeyMaterial};
use tracing::{debug, warn};

use crate::context::AuthorityContext;
use crate::error::{SamlError, SamlResult};
use crate::keys::KeyManager;

/// What a [`SignatureContext`] is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignaturePurpose {
    /// Signing with the authority's own key.
    Sign,
    /// Verifying signatures of peer entities.
    Verify,
}

/// A raw signature value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Algorithm used.
    pub algorithm: KeyAlgorithm,
    /// Id of the signing key.
    pub key_id: String,
    /// Signature bytes.
    pub value: Vec<u8>,
}

impl Signature {
    /// Returns the value as used in `ds:SignatureValue`.
    #[must_use]
    pub fn value_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.value)
    }
}

/// Signing or verification backed by the key manager.
pub struct SignatureContext {
    purpose: SignaturePurpose,
    context: Arc<AuthorityContext>,
    keys: KeyManager,
}

impl SignatureContext {
    /// Creates a context for `purpose`.
    #[must_use]
    pub fn new(
        purpose: SignaturePurpose,
        context: Arc<AuthorityContext>,
        keys: KeyManager,
    ) -> Self {
        Self {
            purpose,
            context,
            keys,
        }
    }

    /// Returns the purpose of this context.
    #[must_use]
    pub const fn purpose(&self) -> SignaturePurpose {
        self.purpose
    }

    /// Signs `data` with the authority's own key.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] on a verification context and
    /// [`SamlError::KeyUnavailable`] if no signing key can be loaded or
    /// signing fails.
    pub fn sign(&self, data: &[u8]) -> SamlResult<Signature> {
        if self.purpose != SignaturePurpose::Sign {
            return Err(SamlError::Configuration(
                "verification context cannot sign".to_string(),
            ));
        }

        let own = self.context.entity_id();
        let keys = self.keys.get(&own)?;
        let unavailable = |reason: String| SamlError::KeyUnavailable {
            entity_id: own.clone(),
            reason,
        };
        let key = keys
            .iter()
            .find(|k| k.can_sign())
            .ok_or_else(|| unavailable("no signing key".to_string()))?;

        let value = key.sign(data).map_err(|e| unavailable(e.to_string()))?;
        debug!(key_id = key.key_id(), "data signed");
        Ok(Signature {
            algorithm: key.algorithm(),
            key_id: key.key_id().to_string(),
            value,
        })
    }

    /// Verifies `signature` over `data` against every key of `entity_id`.
    ///
    /// Returns `Ok(false)` if no key accepts the signature, including when
    /// the entity publishes no signing keys.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] on a signing context and
    /// propagates key loading failures.
    pub fn verify(&self, entity_id: &EntityId, data: &[u8], signature: &[u8]) -> SamlResult<bool> {
        if self.purpose != SignaturePurpose::Verify {
            return Err(SamlError::Configuration(
                "signing context cannot verify".to_string(),
            ));
        }

        let keys = self.keys.get(entity_id)?;
        if keys.is_empty() {
            warn!(entity_id = %entity_id, "entity publishes no signing keys");
            return Ok(false);
        }
        let matched = keys.iter().find(|k: &&KeyMaterial| k.verify(data, signature));
        if let Some(key) = matched {
            debug!(entity_id = %entity_id, key_id = key.key_id(), "signature verified");
        }
        Ok(matched.is_some())
    }
}

impl fmt::Debug for SignatureContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureContext")
            .field("purpose", &self.purpose)
            .finish_non_exhaustive()
    }
}
