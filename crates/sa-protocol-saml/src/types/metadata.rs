//! SAML 2.0 metadata model.
//!
//! The parts of an `EntityDescriptor` this authority reads (signing
//! certificates, attribute consuming services) and writes (its own role
//! descriptors).

use chrono::{DateTime, Utc};
use sa_core::EntityId;

use super::attribute::Attribute;
use super::constants::{SamlBinding, PROTOCOL_SUPPORT};

/// Declared use of a key in a `KeyDescriptor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyUse {
    /// `use="signing"`.
    Signing,
    /// `use="encryption"`.
    Encryption,
}

impl KeyUse {
    /// Returns the attribute value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Signing => "signing",
            Self::Encryption => "encryption",
        }
    }
}

/// A `KeyDescriptor` carrying one X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescriptor {
    /// Declared use; `None` means the key serves both uses.
    pub key_use: Option<KeyUse>,
    /// DER-encoded certificate.
    pub certificate: Vec<u8>,
}

impl KeyDescriptor {
    /// Creates a signing key descriptor.
    #[must_use]
    pub fn signing(certificate: Vec<u8>) -> Self {
        Self {
            key_use: Some(KeyUse::Signing),
            certificate,
        }
    }

    /// Creates an encryption key descriptor.
    #[must_use]
    pub fn encryption(certificate: Vec<u8>) -> Self {
        Self {
            key_use: Some(KeyUse::Encryption),
            certificate,
        }
    }

    /// Creates a descriptor without a `use` attribute.
    #[must_use]
    pub fn unspecified(certificate: Vec<u8>) -> Self {
        Self {
            key_use: None,
            certificate,
        }
    }

    /// Returns true if the key may be used to verify signatures.
    #[must_use]
    pub fn is_signing(&self) -> bool {
        self.key_use != Some(KeyUse::Encryption)
    }
}

/// A protocol endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Binding.
    pub binding: SamlBinding,
    /// Location URL.
    pub location: String,
}

impl Endpoint {
    /// Creates an endpoint.
    #[must_use]
    pub fn new(binding: SamlBinding, location: impl Into<String>) -> Self {
        Self {
            binding,
            location: location.into(),
        }
    }
}

/// An indexed endpoint such as an `AssertionConsumerService`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedEndpoint {
    /// Binding and location.
    pub endpoint: Endpoint,
    /// Endpoint index.
    pub index: u16,
    /// Value of `isDefault`, if present.
    pub is_default: Option<bool>,
}

/// A `RequestedAttribute` within an attribute consuming service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedAttribute {
    /// `NameFormat`, if declared.
    pub name_format: Option<String>,
    /// `Name`.
    pub name: String,
    /// `FriendlyName`, if declared.
    pub friendly_name: Option<String>,
    /// `isRequired`.
    pub is_required: bool,
}

impl RequestedAttribute {
    /// Creates a requested attribute without format or friendly name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name_format: None,
            name: name.into(),
            friendly_name: None,
            is_required: false,
        }
    }

    /// Sets the name format.
    #[must_use]
    pub fn with_name_format(mut self, format: impl Into<String>) -> Self {
        self.name_format = Some(format.into());
        self
    }

    /// Sets the friendly name.
    #[must_use]
    pub fn with_friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }

    /// Marks the attribute as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }
}

/// An SP-declared `AttributeConsumingService`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeConsumingService {
    /// Service index.
    pub index: u16,
    /// `isDefault`: `None` when the attribute is absent, which is
    /// distinct from an explicit `false`.
    pub is_default: Option<bool>,
    /// `ServiceName` values.
    pub service_names: Vec<String>,
    /// Requested attributes in declaration order.
    pub requested_attributes: Vec<RequestedAttribute>,
}

impl AttributeConsumingService {
    /// Creates a service with the given index and no `isDefault`.
    #[must_use]
    pub fn new(index: u16) -> Self {
        Self {
            index,
            is_default: None,
            service_names: Vec::new(),
            requested_attributes: Vec::new(),
        }
    }

    /// Sets `isDefault`.
    #[must_use]
    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = Some(is_default);
        self
    }

    /// Adds a service name.
    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_names.push(name.into());
        self
    }

    /// Adds a requested attribute.
    #[must_use]
    pub fn with_requested_attribute(mut self, attr: RequestedAttribute) -> Self {
        self.requested_attributes.push(attr);
        self
    }
}

/// Role-specific content of a [`RoleDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleDescriptorKind {
    /// `IDPSSODescriptor`.
    IdpSso {
        /// `WantAuthnRequestsSigned`.
        want_authn_requests_signed: bool,
        /// `SingleSignOnService` endpoints.
        single_sign_on_services: Vec<Endpoint>,
        /// Advertised `saml:Attribute`s.
        attributes: Vec<Attribute>,
    },
    /// `SPSSODescriptor`.
    SpSso {
        /// `AuthnRequestsSigned`.
        authn_requests_signed: bool,
        /// `WantAssertionsSigned`.
        want_assertions_signed: bool,
        /// `AssertionConsumerService` endpoints.
        assertion_consumer_services: Vec<IndexedEndpoint>,
        /// `AttributeConsumingService` entries in declaration order.
        attribute_consuming_services: Vec<AttributeConsumingService>,
    },
    /// `AttributeAuthorityDescriptor`.
    AttributeAuthority {
        /// `AttributeService` endpoints.
        attribute_services: Vec<Endpoint>,
        /// Advertised `saml:Attribute`s.
        attributes: Vec<Attribute>,
    },
    /// Any other role descriptor, kept only for its keys.
    Other {
        /// Element local name.
        element: String,
    },
}

/// A role descriptor within an entity descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDescriptor {
    /// `protocolSupportEnumeration`.
    pub protocol_support: String,
    /// Key descriptors in declaration order.
    pub key_descriptors: Vec<KeyDescriptor>,
    /// Supported `NameIDFormat`s.
    pub name_id_formats: Vec<String>,
    /// Role-specific content.
    pub kind: RoleDescriptorKind,
}

impl RoleDescriptor {
    /// Creates an empty descriptor of the given kind.
    #[must_use]
    pub fn new(kind: RoleDescriptorKind) -> Self {
        Self {
            protocol_support: PROTOCOL_SUPPORT.to_string(),
            key_descriptors: Vec::new(),
            name_id_formats: Vec::new(),
            kind,
        }
    }

    /// Creates an empty `IDPSSODescriptor`.
    #[must_use]
    pub fn idp_sso() -> Self {
        Self::new(RoleDescriptorKind::IdpSso {
            want_authn_requests_signed: false,
            single_sign_on_services: Vec::new(),
            attributes: Vec::new(),
        })
    }

    /// Creates an empty `SPSSODescriptor`.
    #[must_use]
    pub fn sp_sso() -> Self {
        Self::new(RoleDescriptorKind::SpSso {
            authn_requests_signed: false,
            want_assertions_signed: false,
            assertion_consumer_services: Vec::new(),
            attribute_consuming_services: Vec::new(),
        })
    }

    /// Adds a key descriptor.
    #[must_use]
    pub fn with_key_descriptor(mut self, key: KeyDescriptor) -> Self {
        self.key_descriptors.push(key);
        self
    }

    /// Adds an attribute consuming service. Ignored unless this is an
    /// `SPSSODescriptor`.
    #[must_use]
    pub fn with_attribute_consuming_service(mut self, service: AttributeConsumingService) -> Self {
        if let RoleDescriptorKind::SpSso {
            attribute_consuming_services,
            ..
        } = &mut self.kind
        {
            attribute_consuming_services.push(service);
        }
        self
    }

    /// Returns true if this descriptor carries a `NameIDFormat` list.
    #[must_use]
    pub fn supports_name_id_formats(&self) -> bool {
        !matches!(self.kind, RoleDescriptorKind::Other { .. })
    }

    /// Returns the element local name.
    #[must_use]
    pub fn element_name(&self) -> &str {
        match &self.kind {
            RoleDescriptorKind::IdpSso { .. } => "IDPSSODescriptor",
            RoleDescriptorKind::SpSso { .. } => "SPSSODescriptor",
            RoleDescriptorKind::AttributeAuthority { .. } => "AttributeAuthorityDescriptor",
            RoleDescriptorKind::Other { element } => element,
        }
    }

    /// Returns the attribute consuming services of an `SPSSODescriptor`.
    #[must_use]
    pub fn attribute_consuming_services(&self) -> Option<&[AttributeConsumingService]> {
        match &self.kind {
            RoleDescriptorKind::SpSso {
                attribute_consuming_services,
                ..
            } => Some(attribute_consuming_services),
            _ => None,
        }
    }
}

/// An `EntityDescriptor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    /// `entityID`.
    pub entity_id: EntityId,
    /// XML `ID`, if any.
    pub id: Option<String>,
    /// `validUntil`, if declared.
    pub valid_until: Option<DateTime<Utc>>,
    /// Role descriptors in declaration order.
    pub roles: Vec<RoleDescriptor>,
}

impl EntityDescriptor {
    /// Creates a descriptor without roles.
    #[must_use]
    pub fn new(entity_id: impl Into<EntityId>) -> Self {
        Self {
            entity_id: entity_id.into(),
            id: None,
            valid_until: None,
            roles: Vec::new(),
        }
    }

    /// Sets `validUntil`.
    #[must_use]
    pub fn with_valid_until(mut self, valid_until: DateTime<Utc>) -> Self {
        self.valid_until = Some(valid_until);
        self
    }

    /// Adds a role descriptor.
    #[must_use]
    pub fn with_role(mut self, role: RoleDescriptor) -> Self {
        self.roles.push(role);
        self
    }

    /// Iterates the `SPSSODescriptor`s in declaration order.
    pub fn sp_sso_descriptors(&self) -> impl Iterator<Item = &RoleDescriptor> {
        self.roles
            .iter()
            .filter(|r| matches!(r.kind, RoleDescriptorKind::SpSso { .. }))
    }

    /// Returns the signing certificates of all roles, first occurrence
    /// first, without byte-identical duplicates.
    #[must_use]
    pub fn signing_certificates(&self) -> Vec<&[u8]> {
        let mut seen: Vec<&[u8]> = Vec::new();
        for key in self.roles.iter().flat_map(|r| &r.key_descriptors) {
            if key.is_signing() && !seen.contains(&key.certificate.as_slice()) {
                seen.push(&key.certificate);
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_descriptor_without_use_is_signing() {
        assert!(KeyDescriptor::unspecified(vec![1]).is_signing());
        assert!(KeyDescriptor::signing(vec![1]).is_signing());
        assert!(!KeyDescriptor::encryption(vec![1]).is_signing());
    }

    #[test]
    fn signing_certificates_deduplicate_across_roles() {
        let entity = EntityDescriptor::new("https://sp.example.org")
            .with_role(
                RoleDescriptor::sp_sso()
                    .with_key_descriptor(KeyDescriptor::signing(vec![1, 2]))
                    .with_key_descriptor(KeyDescriptor::encryption(vec![3])),
            )
            .with_role(
                RoleDescriptor::idp_sso()
                    .with_key_descriptor(KeyDescriptor::unspecified(vec![1, 2]))
                    .with_key_descriptor(KeyDescriptor::signing(vec![4])),
            );

        let certs = entity.signing_certificates();
        assert_eq!(certs, vec![&[1u8, 2][..], &[4u8][..]]);
    }

    #[test]
    fn consuming_services_only_attach_to_sp_roles() {
        let idp = RoleDescriptor::idp_sso()
            .with_attribute_consuming_service(AttributeConsumingService::new(0));
        assert!(idp.attribute_consuming_services().is_none());

        let sp = RoleDescriptor::sp_sso()
            .with_attribute_consuming_service(AttributeConsumingService::new(0).with_default(true));
        assert_eq!(sp.attribute_consuming_services().map(<[_]>::len), Some(1));
    }

    #[test]
    fn other_roles_have_no_name_id_formats() {
        let other = RoleDescriptor::new(RoleDescriptorKind::Other {
            element: "PDPDescriptor".into(),
        });
        assert!(!other.supports_name_id_formats());
        assert_eq!(other.element_name(), "PDPDescriptor");
        assert!(RoleDescriptor::sp_sso().supports_name_id_formats());
    }
}
