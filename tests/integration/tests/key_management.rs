//! Keys flowing between authorities through metadata.

use std::sync::Arc;

use chrono::Duration;
use sa_core::EntityId;
use sa_protocol_saml::{BasicImplementor, Role, SamlError, SignaturePurpose};

use crate::common::{TestAuthority, IDP_ID, SP_ID};

#[test]
fn sp_verifies_idp_signature() -> anyhow::Result<()> {
    let idp = TestAuthority::idp()?;
    let sp = TestAuthority::new(SP_ID, "https://sp.example.org")?;
    sp.trust(&idp)?;

    let data = b"<samlp:Response ID=\"_r1\"/>";
    let signature = idp
        .authority
        .signature_context(SignaturePurpose::Sign)
        .sign(data)?;

    let verifier = sp.authority.signature_context(SignaturePurpose::Verify);
    assert!(verifier.verify(&idp.entity_id(), data, &signature.value)?);
    assert!(!verifier.verify(&idp.entity_id(), b"tampered", &signature.value)?);
    Ok(())
}

#[test]
fn own_keys_can_sign_and_peer_keys_cannot() -> anyhow::Result<()> {
    let idp = TestAuthority::idp()?;
    let sp = TestAuthority::new(SP_ID, "https://sp.example.org")?;
    sp.trust(&idp)?;

    let own = idp.authority.keys(&idp.entity_id())?;
    assert_eq!(own.len(), 1);
    assert!(own[0].can_sign());

    let peer = sp.authority.keys(&EntityId::new(IDP_ID))?;
    assert_eq!(peer.len(), 1);
    assert!(!peer[0].can_sign());
    assert_eq!(peer[0].certificate_der(), Some(idp.certificate.as_slice()));
    Ok(())
}

#[test]
fn rotated_certificate_reaches_peer_after_expiry() -> anyhow::Result<()> {
    let idp = TestAuthority::idp()?;
    let sp = TestAuthority::new(SP_ID, "https://sp.example.org")?;
    sp.trust(&idp)?;
    assert_eq!(sp.authority.keys(&idp.entity_id())?.len(), 1);

    crate::common::write_key_pair(idp.dir.path(), "next-key.pem", "next-cert.pem")?;
    let config = (*idp.authority.context().config())
        .clone()
        .with_future_certificate("next-cert.pem");
    idp.authority.reconfigure(config)?;

    // The SP still holds the metadata it fetched.
    assert_eq!(sp.authority.keys(&idp.entity_id())?.len(), 1);

    idp.clock.advance(Duration::hours(2));
    sp.clock.advance(Duration::hours(2));
    assert_eq!(sp.authority.keys(&idp.entity_id())?.len(), 2);
    Ok(())
}

#[test]
fn removed_peer_has_no_keys() -> anyhow::Result<()> {
    let idp = TestAuthority::idp()?;
    let sp = TestAuthority::new(SP_ID, "https://sp.example.org")?;
    sp.trust(&idp)?;
    sp.authority.keys(&idp.entity_id())?;

    sp.authority.remove_entity(&idp.entity_id())?;
    assert!(matches!(
        sp.authority.keys(&idp.entity_id()),
        Err(SamlError::UnknownEntity(_))
    ));
    Ok(())
}

#[test]
fn peer_without_roles_is_unavailable() -> anyhow::Result<()> {
    let idp = TestAuthority::new(IDP_ID, "https://idp.example.org")?;
    let sp = TestAuthority::new(SP_ID, "https://sp.example.org")?;
    sp.trust(&idp)?;

    let err = sp.authority.keys(&idp.entity_id()).unwrap_err();
    assert!(matches!(err, SamlError::MetadataUnavailable { .. }));

    idp.authority
        .register_implementor(Arc::new(BasicImplementor::new("/saml/idp", [Role::Idp])))?;
    assert_eq!(sp.authority.keys(&idp.entity_id())?.len(), 1);
    Ok(())
}
