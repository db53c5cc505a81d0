//! Signature contexts.
//!
//! The XML-DSig layer itself is external; it obtains a [`SignatureContext`]
//! per [`SignaturePurpose`] and hands it the canonicalized bytes to sign or
//! verify. Contexts draw their keys from the [`crate::keys::KeyManager`], so
//! they pick up key rotation and metadata refreshes without being rebuilt.

mod context;

pub use context::{Signature, SignatureContext, SignaturePurpose};
