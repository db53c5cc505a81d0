//! Metadata endpoints.
//!
//! Serve this authority's exported metadata and the current metadata of
//! registered peers. Export reads certificate files and peer fetches call
//! synchronous sources, so both run on the blocking pool.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use sa_core::EntityId;
use tracing::{error, warn};

use crate::error::{SamlError, SamlResult};
use crate::metadata::to_xml;

use super::state::MetadataState;

/// Headers of every metadata document.
const METADATA_HEADERS: [(header::HeaderName, &str); 4] = [
    (header::CONTENT_TYPE, "text/xml; charset=utf-8"),
    (header::CACHE_CONTROL, "no-cache"),
    (header::PRAGMA, "no-cache"),
    (header::EXPIRES, "0"),
];

/// GET handler for this authority's metadata.
pub async fn own_metadata(State(state): State<MetadataState>) -> Response {
    let authority = state.authority;
    render_blocking(move || {
        authority
            .export_own_metadata()
            .map(|metadata| metadata.xml.clone())
    })
    .await
}

/// GET handler for the metadata of a registered peer entity.
pub async fn entity_metadata(
    State(state): State<MetadataState>,
    Path(entity_id): Path<String>,
) -> Response {
    let authority = state.authority;
    let entity_id = EntityId::new(entity_id);
    render_blocking(move || {
        authority
            .metadata_for(&entity_id)
            .and_then(|descriptor| to_xml(&descriptor))
    })
    .await
}

async fn render_blocking<F>(render: F) -> Response
where
    F: FnOnce() -> SamlResult<String> + Send + 'static,
{
    match tokio::task::spawn_blocking(render).await {
        Ok(Ok(xml)) => xml_response(xml),
        Ok(Err(e)) => error_response(&e),
        Err(e) => {
            error!(error = %e, "metadata task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn xml_response(xml: String) -> Response {
    (StatusCode::OK, METADATA_HEADERS, xml).into_response()
}

fn error_response(err: &SamlError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(error = %err, "metadata request failed");
    } else {
        warn!(error = %err, "metadata request rejected");
    }
    (status, err.to_string()).into_response()
}
