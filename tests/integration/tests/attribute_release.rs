//! Attribute release from an IdP to an SP declared through metadata.

use std::collections::HashMap;
use std::sync::Arc;

use sa_core::EntityId;
use sa_protocol_saml::attribute::EvaluationError;
use sa_protocol_saml::{
    attrname_formats, sub_status_codes, AttributeConsumingService, AttributeDescriptor,
    BasicImplementor, PropertyValue, RequestedAttribute, Role, SamlError, SimpleAttributeProvider,
    Subject, XsType,
};

use crate::common::{TestAuthority, SP_ID};

const MAIL_OID: &str = "urn:oid:0.9.2342.19200300.100.1.3";
const TARGETED_ID_OID: &str = "urn:oid:1.3.6.1.4.1.5923.1.1.1.10";

/// Pairwise identifier: the requester and the subject's uid.
fn targeted_id(
    subject: &dyn Subject,
    _: &AttributeDescriptor,
    requester: &EntityId,
) -> Result<Option<PropertyValue>, EvaluationError> {
    Ok(match subject.property("uid") {
        Some(PropertyValue::Text(uid)) => Some(format!("{requester}!{uid}").into()),
        Some(_) => return Err("uid is not text".into()),
        None => None,
    })
}

/// The attributes the test IdP can release.
pub fn directory_attributes() -> SimpleAttributeProvider {
    SimpleAttributeProvider::new()
        .with_attribute(AttributeDescriptor::new("mail", "uri", MAIL_OID, XsType::String))
        .with_attribute(AttributeDescriptor::new("cn", "basic", "cn", XsType::String))
        .with_attribute(AttributeDescriptor::new(
            "employeeNumber",
            "basic",
            "employeeNumber",
            XsType::Integer,
        ))
        .with_attribute(
            AttributeDescriptor::new("targetedId", "uri", TARGETED_ID_OID, XsType::String)
                .with_evaluator(Arc::new(targeted_id)),
        )
}

fn sp_with(services: Vec<AttributeConsumingService>) -> anyhow::Result<TestAuthority> {
    let sp = TestAuthority::new(SP_ID, "https://sp.example.org")?;
    let implementor = services.into_iter().fold(
        BasicImplementor::new("/saml/sp", [Role::Sp]),
        BasicImplementor::with_attribute_consuming_service,
    );
    sp.authority.register_implementor(Arc::new(implementor))?;
    Ok(sp)
}

fn jane() -> HashMap<String, PropertyValue> {
    HashMap::from([
        ("mail".to_string(), PropertyValue::from("jane@example.org")),
        ("cn".to_string(), PropertyValue::from("Jane Doe")),
        ("uid".to_string(), PropertyValue::from("jdoe")),
    ])
}

#[test]
fn releases_requested_attributes() -> anyhow::Result<()> {
    let idp = TestAuthority::idp()?;
    let sp = sp_with(vec![AttributeConsumingService::new(0)
        .with_service_name("Portal")
        .with_requested_attribute(
            RequestedAttribute::new(MAIL_OID)
                .with_name_format(attrname_formats::URI)
                .with_friendly_name("email")
                .required(),
        )
        .with_requested_attribute(RequestedAttribute::new("cn").with_name_format("basic"))
        .with_requested_attribute(
            RequestedAttribute::new("employeeNumber").with_name_format(attrname_formats::BASIC),
        )
        .with_requested_attribute(RequestedAttribute::new("urn:unknown"))])?;
    idp.trust(&sp)?;

    let statement = idp
        .authority
        .release_attributes(&sp.entity_id(), None, &jane())?
        .expect("attributes released");

    let names: Vec<&str> = statement.attributes.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec![MAIL_OID, "cn"]);

    let mail = statement.attribute(MAIL_OID).expect("mail");
    assert_eq!(mail.friendly_name.as_deref(), Some("email"));
    assert_eq!(mail.name_format.as_deref(), Some(attrname_formats::URI));
    assert_eq!(mail.value_strings().collect::<Vec<_>>(), vec!["jane@example.org"]);

    let cn = statement.attribute("cn").expect("cn");
    assert_eq!(cn.friendly_name.as_deref(), Some("cn"));
    Ok(())
}

#[test]
fn evaluator_sees_requester() -> anyhow::Result<()> {
    let idp = TestAuthority::idp()?;
    let sp = sp_with(vec![AttributeConsumingService::new(0).with_requested_attribute(
        RequestedAttribute::new(TARGETED_ID_OID).with_name_format(attrname_formats::URI),
    )])?;
    idp.trust(&sp)?;

    let statement = idp
        .authority
        .release_attributes(&sp.entity_id(), None, &jane())?
        .expect("attributes released");
    let value: Vec<&str> = statement.attributes[0].value_strings().collect();
    assert_eq!(value, vec![format!("{SP_ID}!jdoe").as_str()]);
    Ok(())
}

#[test]
fn explicit_index_selects_service() -> anyhow::Result<()> {
    let idp = TestAuthority::idp()?;
    let sp = sp_with(vec![
        AttributeConsumingService::new(0)
            .with_default(true)
            .with_requested_attribute(RequestedAttribute::new(MAIL_OID).with_name_format("uri")),
        AttributeConsumingService::new(1)
            .with_requested_attribute(RequestedAttribute::new("cn").with_name_format("basic")),
    ])?;
    idp.trust(&sp)?;

    let default = idp
        .authority
        .release_attributes(&sp.entity_id(), None, &jane())?
        .expect("default service");
    assert!(default.attribute(MAIL_OID).is_some());

    let second = idp
        .authority
        .release_attributes(&sp.entity_id(), Some(1), &jane())?
        .expect("service 1");
    assert!(second.attribute(MAIL_OID).is_none());
    assert!(second.attribute("cn").is_some());
    Ok(())
}

#[test]
fn unknown_index_is_resource_not_recognized() -> anyhow::Result<()> {
    let idp = TestAuthority::idp()?;
    let sp = sp_with(vec![AttributeConsumingService::new(0)])?;
    idp.trust(&sp)?;

    let err = idp
        .authority
        .release_attributes(&sp.entity_id(), Some(3), &jane())
        .unwrap_err();
    assert!(matches!(err, SamlError::Protocol(_)));
    let status = err.to_status();
    assert_eq!(
        status.status_code.sub_status_value(),
        Some(sub_status_codes::RESOURCE_NOT_RECOGNIZED)
    );
    Ok(())
}

#[test]
fn sp_without_services_gets_nothing() -> anyhow::Result<()> {
    let idp = TestAuthority::idp()?;
    let sp = sp_with(Vec::new())?;
    idp.trust(&sp)?;

    assert!(idp
        .authority
        .release_attributes(&sp.entity_id(), None, &jane())?
        .is_none());
    Ok(())
}
