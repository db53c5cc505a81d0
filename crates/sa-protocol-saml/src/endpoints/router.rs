//! Metadata router configuration.

use axum::{routing::get, Router};

use super::metadata::{entity_metadata, own_metadata};
use super::state::MetadataState;

/// Creates the metadata router.
///
/// # Endpoints
///
/// | Method | Path                          | Handler           | Description            |
/// |--------|-------------------------------|-------------------|------------------------|
/// | GET    | `/metadata`                   | `own_metadata`    | This authority         |
/// | GET    | `/entities/{entity_id}/metadata` | `entity_metadata` | A registered peer   |
///
/// Entity ids are URLs and must be percent-encoded in the path.
///
/// # Usage
///
/// ```rust,ignore
/// use sa_protocol_saml::endpoints::{metadata_router, MetadataState};
///
/// let app = Router::new().merge(metadata_router().with_state(MetadataState::new(authority)));
/// ```
pub fn metadata_router() -> Router<MetadataState> {
    Router::new()
        .route("/metadata", get(own_metadata))
        .route("/entities/{entity_id}/metadata", get(entity_metadata))
}
