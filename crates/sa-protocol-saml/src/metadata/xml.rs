//! Metadata document rendering.

use base64::Engine;
use chrono::SecondsFormat;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{SamlError, SamlResult};
use crate::types::{
    Attribute, AttributeConsumingService, Endpoint, EntityDescriptor, IndexedEndpoint,
    KeyDescriptor, RoleDescriptor, RoleDescriptorKind, METADATA_NS, SAML_NS, XMLDSIG_NS,
};

/// Serializes `descriptor` as a SAML 2.0 metadata document.
///
/// # Errors
///
/// Returns [`SamlError::XmlWrite`] if writing fails.
pub fn to_xml(descriptor: &EntityDescriptor) -> SamlResult<String> {
    let mut out = MetadataWriter {
        writer: Writer::new_with_indent(Vec::new(), b' ', 2),
    };
    out.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    out.entity(descriptor)?;
    String::from_utf8(out.writer.into_inner()).map_err(|e| SamlError::XmlWrite(e.to_string()))
}

struct MetadataWriter {
    writer: Writer<Vec<u8>>,
}

impl MetadataWriter {
    fn event(&mut self, event: Event<'_>) -> SamlResult<()> {
        self.writer.write_event(event)?;
        Ok(())
    }

    fn start(&mut self, start: BytesStart<'_>) -> SamlResult<()> {
        self.event(Event::Start(start))
    }

    fn empty(&mut self, start: BytesStart<'_>) -> SamlResult<()> {
        self.event(Event::Empty(start))
    }

    fn end(&mut self, name: &str) -> SamlResult<()> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn text_element(&mut self, name: &str, text: &str) -> SamlResult<()> {
        self.start(BytesStart::new(name))?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    fn entity(&mut self, descriptor: &EntityDescriptor) -> SamlResult<()> {
        let mut start = BytesStart::new("md:EntityDescriptor");
        start.push_attribute(("xmlns:md", METADATA_NS));
        start.push_attribute(("xmlns:ds", XMLDSIG_NS));
        start.push_attribute(("xmlns:saml", SAML_NS));
        start.push_attribute(("entityID", descriptor.entity_id.as_str()));
        if let Some(id) = &descriptor.id {
            start.push_attribute(("ID", id.as_str()));
        }
        if let Some(valid_until) = descriptor.valid_until {
            let valid_until = valid_until.to_rfc3339_opts(SecondsFormat::Secs, true);
            start.push_attribute(("validUntil", valid_until.as_str()));
        }
        self.start(start)?;
        for role in &descriptor.roles {
            self.role(role)?;
        }
        self.end("md:EntityDescriptor")
    }

    fn role(&mut self, role: &RoleDescriptor) -> SamlResult<()> {
        let name = format!("md:{}", role.element_name());
        let mut start = BytesStart::new(name.as_str());
        start.push_attribute(("protocolSupportEnumeration", role.protocol_support.as_str()));
        match &role.kind {
            RoleDescriptorKind::IdpSso {
                want_authn_requests_signed: true,
                ..
            } => start.push_attribute(("WantAuthnRequestsSigned", "true")),
            RoleDescriptorKind::SpSso {
                authn_requests_signed,
                want_assertions_signed,
                ..
            } => {
                if *authn_requests_signed {
                    start.push_attribute(("AuthnRequestsSigned", "true"));
                }
                if *want_assertions_signed {
                    start.push_attribute(("WantAssertionsSigned", "true"));
                }
            }
            _ => {}
        }
        self.start(start)?;

        for key in &role.key_descriptors {
            self.key_descriptor(key)?;
        }

        match &role.kind {
            RoleDescriptorKind::IdpSso {
                single_sign_on_services,
                attributes,
                ..
            } => {
                self.name_id_formats(role)?;
                for endpoint in single_sign_on_services {
                    self.endpoint("md:SingleSignOnService", endpoint)?;
                }
                self.attributes(attributes)?;
            }
            RoleDescriptorKind::SpSso {
                assertion_consumer_services,
                attribute_consuming_services,
                ..
            } => {
                self.name_id_formats(role)?;
                for endpoint in assertion_consumer_services {
                    self.indexed_endpoint("md:AssertionConsumerService", endpoint)?;
                }
                for service in attribute_consuming_services {
                    self.consuming_service(service)?;
                }
            }
            RoleDescriptorKind::AttributeAuthority {
                attribute_services,
                attributes,
            } => {
                for endpoint in attribute_services {
                    self.endpoint("md:AttributeService", endpoint)?;
                }
                self.name_id_formats(role)?;
                self.attributes(attributes)?;
            }
            RoleDescriptorKind::Other { .. } => {}
        }

        self.end(&name)
    }

    fn key_descriptor(&mut self, key: &KeyDescriptor) -> SamlResult<()> {
        let mut start = BytesStart::new("md:KeyDescriptor");
        if let Some(key_use) = key.key_use {
            start.push_attribute(("use", key_use.as_str()));
        }
        self.start(start)?;
        self.start(BytesStart::new("ds:KeyInfo"))?;
        self.start(BytesStart::new("ds:X509Data"))?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&key.certificate);
        self.text_element("ds:X509Certificate", &encoded)?;
        self.end("ds:X509Data")?;
        self.end("ds:KeyInfo")?;
        self.end("md:KeyDescriptor")
    }

    fn name_id_formats(&mut self, role: &RoleDescriptor) -> SamlResult<()> {
        for format in &role.name_id_formats {
            self.text_element("md:NameIDFormat", format)?;
        }
        Ok(())
    }

    fn endpoint(&mut self, name: &str, endpoint: &Endpoint) -> SamlResult<()> {
        let mut start = BytesStart::new(name);
        start.push_attribute(("Binding", endpoint.binding.uri()));
        start.push_attribute(("Location", endpoint.location.as_str()));
        self.empty(start)
    }

    fn indexed_endpoint(&mut self, name: &str, endpoint: &IndexedEndpoint) -> SamlResult<()> {
        let index = endpoint.index.to_string();
        let mut start = BytesStart::new(name);
        start.push_attribute(("Binding", endpoint.endpoint.binding.uri()));
        start.push_attribute(("Location", endpoint.endpoint.location.as_str()));
        start.push_attribute(("index", index.as_str()));
        if let Some(is_default) = endpoint.is_default {
            start.push_attribute(("isDefault", if is_default { "true" } else { "false" }));
        }
        self.empty(start)
    }

    fn consuming_service(&mut self, service: &AttributeConsumingService) -> SamlResult<()> {
        let index = service.index.to_string();
        let mut start = BytesStart::new("md:AttributeConsumingService");
        start.push_attribute(("index", index.as_str()));
        if let Some(is_default) = service.is_default {
            start.push_attribute(("isDefault", if is_default { "true" } else { "false" }));
        }
        self.start(start)?;

        for name in &service.service_names {
            let mut start = BytesStart::new("md:ServiceName");
            start.push_attribute(("xml:lang", "en"));
            self.start(start)?;
            self.event(Event::Text(BytesText::new(name)))?;
            self.end("md:ServiceName")?;
        }
        for requested in &service.requested_attributes {
            let mut start = BytesStart::new("md:RequestedAttribute");
            if let Some(format) = &requested.name_format {
                start.push_attribute(("NameFormat", format.as_str()));
            }
            start.push_attribute(("Name", requested.name.as_str()));
            if let Some(friendly) = &requested.friendly_name {
                start.push_attribute(("FriendlyName", friendly.as_str()));
            }
            if requested.is_required {
                start.push_attribute(("isRequired", "true"));
            }
            self.empty(start)?;
        }

        self.end("md:AttributeConsumingService")
    }

    fn attributes(&mut self, attributes: &[Attribute]) -> SamlResult<()> {
        for attribute in attributes {
            let mut start = BytesStart::new("saml:Attribute");
            if let Some(format) = &attribute.name_format {
                start.push_attribute(("NameFormat", format.as_str()));
            }
            start.push_attribute(("Name", attribute.name.as_str()));
            if let Some(friendly) = &attribute.friendly_name {
                start.push_attribute(("FriendlyName", friendly.as_str()));
            }
            self.empty(start)?;
        }
        Ok(())
    }
}
