//! HTTP endpoints.
//!
//! Axum handlers publishing entity metadata:
//!
//! - `GET /metadata` - this authority's metadata
//! - `GET /entities/{entity_id}/metadata` - a registered peer's metadata

mod metadata;
mod router;
mod state;

pub use metadata::*;
pub use router::*;
pub use state::*;
