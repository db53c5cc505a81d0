//! Own metadata export as seen by peers.

use std::sync::Arc;

use chrono::Duration;
use sa_core::{Clock, EntityId};
use sa_protocol_saml::{
    BasicImplementor, ImplementorPath, Role, RoleDescriptorKind, SamlError, UrlCustomizer,
};

use crate::common::{TestAuthority, IDP_ID, SP_ID};

#[test]
fn exported_document_describes_roles() -> anyhow::Result<()> {
    let idp = TestAuthority::idp()?;
    let export = idp.authority.export_own_metadata()?;

    assert_eq!(export.descriptor.entity_id.as_str(), IDP_ID);
    assert_eq!(
        export.descriptor.valid_until,
        Some(idp.clock.now() + Duration::hours(1))
    );
    assert!(export.xml.contains(r#"entityID="https://idp.example.org/saml""#));
    assert!(export.xml.contains(r#"validUntil="2024-06-01T13:00:00Z""#));
    assert!(export.xml.contains("<md:IDPSSODescriptor"));
    assert!(export
        .xml
        .contains(r#"Location="https://idp.example.org/saml/idp/redirect""#));
    assert!(export.xml.contains(r#"FriendlyName="mail""#));
    assert!(!export.xml.contains("AttributeAuthorityDescriptor"));
    Ok(())
}

#[test]
fn peer_sees_exported_metadata() -> anyhow::Result<()> {
    let idp = TestAuthority::idp()?;
    let sp = TestAuthority::new(SP_ID, "https://sp.example.org")?;
    sp.trust(&idp)?;

    let seen = sp.authority.metadata_for(&EntityId::new(IDP_ID))?;
    let exported = idp.authority.export_own_metadata()?;
    assert_eq!(*seen, exported.descriptor);
    Ok(())
}

#[test]
fn role_changes_rebuild_export() -> anyhow::Result<()> {
    let idp = TestAuthority::idp()?;
    let first = idp.authority.export_own_metadata()?;
    assert!(Arc::ptr_eq(&first, &idp.authority.export_own_metadata()?));

    idp.authority
        .register_implementor(Arc::new(BasicImplementor::new("/saml/sp", [Role::Sp])))?;
    let second = idp.authority.export_own_metadata()?;
    assert_ne!(first.descriptor.id, second.descriptor.id);
    assert!(second
        .descriptor
        .roles
        .iter()
        .any(|r| matches!(r.kind, RoleDescriptorKind::SpSso { .. })));
    Ok(())
}

#[test]
fn removing_every_role_breaks_export() -> anyhow::Result<()> {
    let idp = TestAuthority::idp()?;
    idp.authority.export_own_metadata()?;

    let path = ImplementorPath::from("/saml/idp");
    assert!(matches!(
        idp.authority.remove_implementor(&path),
        Err(SamlError::ProtectedDeletion { .. })
    ));
    idp.authority.unregister_implementor(&path);
    idp.authority.remove_implementor(&path)?;

    assert!(matches!(
        idp.authority.export_own_metadata(),
        Err(SamlError::Configuration(_))
    ));
    Ok(())
}

struct Cdn;

impl UrlCustomizer for Cdn {
    fn url(&self, path: &ImplementorPath) -> String {
        format!("https://login.example.com{path}")
    }
}

#[test]
fn url_customizer_applies_to_export() -> anyhow::Result<()> {
    let idp = TestAuthority::idp()?;
    idp.authority.set_url_customizer(Some(Arc::new(Cdn)));

    let export = idp.authority.export_own_metadata()?;
    assert!(export
        .xml
        .contains(r#"Location="https://login.example.com/saml/idp/post""#));

    idp.authority.set_url_customizer(None);
    let export = idp.authority.export_own_metadata()?;
    assert!(!export.xml.contains("login.example.com"));
    Ok(())
}

#[test]
fn own_entity_cannot_be_managed_as_peer() -> anyhow::Result<()> {
    let idp = TestAuthority::idp()?;
    let own = idp.entity_id();
    assert!(matches!(
        idp.authority.remove_entity(&own),
        Err(SamlError::ProtectedDeletion { .. })
    ));
    let other = TestAuthority::new(IDP_ID, "https://other.example.org")?;
    assert!(matches!(
        idp.trust(&other),
        Err(e) if e.downcast_ref::<SamlError>().is_some_and(|e| matches!(e, SamlError::Configuration(_)))
    ));
    Ok(())
}
