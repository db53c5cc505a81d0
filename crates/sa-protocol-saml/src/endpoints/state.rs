//! Metadata endpoint state.

use std::sync::Arc;

use crate::authority::SamlAuthority;

/// State shared by the metadata endpoints.
#[derive(Debug, Clone)]
pub struct MetadataState {
    /// The authority whose metadata is served.
    pub authority: Arc<SamlAuthority>,
}

impl MetadataState {
    /// Creates the state for `authority`.
    #[must_use]
    pub const fn new(authority: Arc<SamlAuthority>) -> Self {
        Self { authority }
    }
}
