//! Metadata served over HTTP.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use sa_protocol_saml::endpoints::{metadata_router, MetadataState};
use tower::ServiceExt;

use crate::common::{TestAuthority, SP_ID};

fn router(authority: &TestAuthority) -> Router {
    metadata_router().with_state(MetadataState::new(authority.authority.clone()))
}

async fn get(app: Router, uri: &str) -> anyhow::Result<axum::response::Response> {
    Ok(app
        .oneshot(Request::get(uri).body(Body::empty())?)
        .await?)
}

#[tokio::test]
async fn serves_own_metadata_with_no_cache_headers() -> anyhow::Result<()> {
    let idp = TestAuthority::idp()?;
    let response = get(router(&idp), "/metadata").await?;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/xml; charset=utf-8");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    assert_eq!(headers[header::PRAGMA], "no-cache");
    assert_eq!(headers[header::EXPIRES], "0");

    let body = to_bytes(response.into_body(), usize::MAX).await?;
    let xml = String::from_utf8(body.to_vec())?;
    assert_eq!(xml, idp.authority.export_own_metadata()?.xml);
    Ok(())
}

#[tokio::test]
async fn serves_peer_metadata() -> anyhow::Result<()> {
    let idp = TestAuthority::idp()?;
    let sp = TestAuthority::new(SP_ID, "https://sp.example.org")?;
    sp.trust(&idp)?;

    let response = get(
        router(&sp),
        "/entities/https%3A%2F%2Fidp.example.org%2Fsaml/metadata",
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    assert!(String::from_utf8(body.to_vec())?.contains("IDPSSODescriptor"));
    Ok(())
}

#[tokio::test]
async fn peer_metadata_failure_is_bad_gateway() -> anyhow::Result<()> {
    let idp = TestAuthority::new(crate::common::IDP_ID, "https://idp.example.org")?;
    let sp = TestAuthority::new(SP_ID, "https://sp.example.org")?;
    sp.trust(&idp)?;

    let response = get(
        router(&sp),
        "/entities/https%3A%2F%2Fidp.example.org%2Fsaml/metadata",
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    Ok(())
}
