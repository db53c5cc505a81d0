//! Export of this authority's own metadata.

use std::fmt;
use std::fs;
use std::sync::Arc;

use parking_lot::RwLock;
use sa_cache::{CacheEntry, ValidityCache};
use sa_core::{AuthorityConfig, ChangeEvent, ChangeListener, EntityId};
use sa_crypto::certificate_der;
use tracing::{debug, info};
use uuid::Uuid;

use super::xml::to_xml;
use crate::context::AuthorityContext;
use crate::error::{SamlError, SamlResult};
use crate::roles::{ImplementorDirectory, ImplementorPath, Role, RoleImplementor, RoleRegistry};
use crate::types::{
    Endpoint, EntityDescriptor, IndexedEndpoint, KeyDescriptor, RoleDescriptor,
    RoleDescriptorKind, SamlBinding,
};

/// Overrides the URL derived for a role implementor.
pub trait UrlCustomizer: Send + Sync {
    /// Returns the base URL of the implementor at `path`.
    fn url(&self, path: &ImplementorPath) -> String;
}

impl<F> UrlCustomizer for F
where
    F: Fn(&ImplementorPath) -> String + Send + Sync,
{
    fn url(&self, path: &ImplementorPath) -> String {
        self(path)
    }
}

/// This authority's metadata, as descriptor and serialized document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnMetadata {
    /// The descriptor.
    pub descriptor: EntityDescriptor,
    /// The serialized document.
    pub xml: String,
}

/// Builds this authority's metadata from its registered roles.
///
/// The exported document is cached until its `validUntil` and rebuilt
/// after any role or configuration change.
#[derive(Clone)]
pub struct MetadataExporter {
    inner: Arc<ExporterInner>,
}

struct ExporterInner {
    context: Arc<AuthorityContext>,
    registry: Arc<RoleRegistry>,
    directory: Arc<dyn ImplementorDirectory>,
    url_customizer: RwLock<Option<Arc<dyn UrlCustomizer>>>,
    cache: ValidityCache<EntityId, Arc<OwnMetadata>>,
}

impl MetadataExporter {
    /// Creates an exporter and subscribes it to change events.
    #[must_use]
    pub fn new(
        context: Arc<AuthorityContext>,
        registry: Arc<RoleRegistry>,
        directory: Arc<dyn ImplementorDirectory>,
    ) -> Self {
        let inner = Arc::new(ExporterInner {
            context,
            registry,
            directory,
            url_customizer: RwLock::new(None),
            cache: ValidityCache::new(),
        });
        inner.context.notifier().subscribe(&inner);
        Self { inner }
    }

    /// Installs or removes the URL customizer.
    pub fn set_url_customizer(&self, customizer: Option<Arc<dyn UrlCustomizer>>) {
        *self.inner.url_customizer.write() = customizer;
        self.inner.cache.clear();
    }

    /// Returns the cached metadata, building it if necessary.
    ///
    /// # Errors
    ///
    /// See [`MetadataExporter::build`].
    pub fn export(&self) -> SamlResult<Arc<OwnMetadata>> {
        let own = self.inner.context.entity_id();
        let now = self.inner.context.now();
        self.inner.cache.get_or_try_insert_with(&own, now, || {
            let descriptor = self.build()?;
            let xml = to_xml(&descriptor)?;
            let valid_until = descriptor.valid_until;
            Ok(CacheEntry::new(Arc::new(OwnMetadata { descriptor, xml }), valid_until))
        })
    }

    /// Drops the cached metadata.
    pub fn invalidate(&self) {
        self.inner.cache.clear();
    }

    /// Builds the metadata descriptor without consulting the cache.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] if no role is registered, no
    /// descriptor-producing role remains once `ap` is skipped, a registered
    /// role has no metadata generator, or no certificate is configured.
    /// Returns [`SamlError::UnknownImplementor`] for a registered path the
    /// directory cannot resolve and [`SamlError::KeyUnavailable`] if a
    /// certificate file cannot be read.
    pub fn build(&self) -> SamlResult<EntityDescriptor> {
        self.inner.build()
    }

    /// Returns the base URL of the implementor at `path`.
    #[must_use]
    pub fn url_for(&self, path: &ImplementorPath) -> String {
        self.inner.url_for(path)
    }
}

impl fmt::Debug for MetadataExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataExporter")
            .field("cached", &!self.inner.cache.is_empty())
            .field("url_customizer", &self.inner.url_customizer.read().is_some())
            .finish_non_exhaustive()
    }
}

fn no_roles() -> SamlError {
    SamlError::Configuration(
        "the authority has no associated roles; its metadata would violate the SAML 2.0 metadata schema"
            .to_string(),
    )
}

impl ExporterInner {
    fn build(&self) -> SamlResult<EntityDescriptor> {
        let assignments = self.registry.assignments();
        if assignments.is_empty() {
            return Err(no_roles());
        }

        let config = self.context.config();
        let own = config.entity();
        let certificates = certificates(&config, &own)?;

        let mut descriptor = EntityDescriptor {
            entity_id: own.clone(),
            id: Some(format!("_{}", Uuid::new_v4().simple())),
            valid_until: Some(self.context.metadata_expiry(self.context.now())?),
            roles: Vec::new(),
        };

        for (role, path) in assignments {
            if role == Role::Ap {
                continue;
            }
            let implementor = self
                .directory
                .implementor(&path)
                .ok_or_else(|| SamlError::UnknownImplementor(path.to_string()))?;

            let mut rd = match role {
                Role::Idp => RoleDescriptor::idp_sso(),
                Role::Sp => RoleDescriptor::sp_sso(),
                Role::Ap | Role::Authn | Role::Pdp => {
                    return Err(SamlError::Configuration(format!(
                        "no metadata generator for role {role}"
                    )));
                }
            };

            for certificate in &certificates {
                rd.key_descriptors.push(KeyDescriptor::signing(certificate.clone()));
            }
            if rd.supports_name_id_formats() {
                if let Some(formats) = implementor.name_id_formats() {
                    rd.name_id_formats = formats;
                }
            }

            let url = self.url_for(&path);
            match role {
                Role::Idp => generate_idpsso(implementor.as_ref(), &url, &mut rd),
                Role::Sp => generate_spsso(implementor.as_ref(), &url, &mut rd),
                _ => {}
            }
            debug!(role = %role, path = %path, "role descriptor generated");
            descriptor.roles.push(rd);
        }

        if descriptor.roles.is_empty() {
            return Err(no_roles());
        }
        info!(
            entity_id = %own,
            roles = descriptor.roles.len(),
            "own metadata exported"
        );
        Ok(descriptor)
    }

    fn url_for(&self, path: &ImplementorPath) -> String {
        if let Some(customizer) = self.url_customizer.read().as_ref() {
            return customizer.url(path);
        }
        let base = self.context.config().base_url.trim_end_matches('/').to_string();
        let segments: Vec<String> = path
            .segments()
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        format!("{base}/{}", segments.join("/"))
    }
}

impl ChangeListener for ExporterInner {
    fn on_change(&self, event: &ChangeEvent) {
        match event {
            ChangeEvent::RolesChanged | ChangeEvent::ConfigurationChanged => self.cache.clear(),
            ChangeEvent::EntityChanged { .. } => {}
        }
    }
}

/// Reads the current certificate and, when configured, the future one.
fn certificates(config: &AuthorityConfig, own: &EntityId) -> SamlResult<Vec<Vec<u8>>> {
    let current = config.certificate.as_deref().ok_or_else(|| {
        SamlError::Configuration("no signing certificate configured".to_string())
    })?;

    [Some(current), config.future_certificate.as_deref()]
        .into_iter()
        .flatten()
        .map(|path| {
            let path = config.resolve_path(path);
            let unavailable = |reason: String| SamlError::KeyUnavailable {
                entity_id: own.clone(),
                reason: format!("certificate {}: {reason}", path.display()),
            };
            let data = fs::read(&path).map_err(|e| unavailable(e.to_string()))?;
            certificate_der(&data).map_err(|e| unavailable(e.to_string()))
        })
        .collect()
}

/// Shared step of the SSO role generators. Artifact resolution and single
/// logout endpoints are not offered.
fn generate_sso(_implementor: &dyn RoleImplementor, _url: &str, _rd: &mut RoleDescriptor) {}

fn generate_idpsso(implementor: &dyn RoleImplementor, url: &str, rd: &mut RoleDescriptor) {
    generate_sso(implementor, url, rd);
    if let RoleDescriptorKind::IdpSso {
        single_sign_on_services,
        attributes,
        ..
    } = &mut rd.kind
    {
        single_sign_on_services.push(Endpoint::new(
            SamlBinding::HttpRedirect,
            format!("{url}/redirect"),
        ));
        single_sign_on_services.push(Endpoint::new(SamlBinding::HttpPost, format!("{url}/post")));
        if let Some(provider) = implementor.attribute_provider() {
            attributes.extend(provider.metadata_attributes());
        }
    }
}

fn generate_spsso(implementor: &dyn RoleImplementor, url: &str, rd: &mut RoleDescriptor) {
    generate_sso(implementor, url, rd);
    if let RoleDescriptorKind::SpSso {
        want_assertions_signed,
        assertion_consumer_services,
        attribute_consuming_services,
        ..
    } = &mut rd.kind
    {
        if implementor.wants_assertions_signed() {
            *want_assertions_signed = true;
        }
        assertion_consumer_services.push(IndexedEndpoint {
            endpoint: Endpoint::new(SamlBinding::HttpPost, format!("{url}/post")),
            index: 1,
            is_default: Some(true),
        });
        attribute_consuming_services.extend(implementor.attribute_consuming_services());
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use sa_core::{AuthorityConfig, ChangeNotifier, Clock, ManualClock};

    use super::*;
    use crate::attribute::{AttributeDescriptor, SimpleAttributeProvider};
    use crate::roles::{BasicImplementor, InMemoryDirectory};
    use crate::types::{AttributeConsumingService, RequestedAttribute, XsType};

    const IDP: &str = "https://idp.example.org";

    struct Fixture {
        dir: tempfile::TempDir,
        clock: Arc<ManualClock>,
        context: Arc<AuthorityContext>,
        registry: Arc<RoleRegistry>,
        directory: Arc<InMemoryDirectory>,
        exporter: MetadataExporter,
        certificate: Vec<u8>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = rcgen::CertificateParams::new(vec!["idp.example.org".to_string()])
            .unwrap()
            .self_signed(&key)
            .unwrap();
        std::fs::write(dir.path().join("cert.pem"), cert.pem()).unwrap();

        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let config = AuthorityConfig::new(IDP, "https://idp.example.org/site/")
            .with_certificate("cert.pem")
            .with_metadata_validity_secs(600)
            .with_home_dir(dir.path());
        let context = AuthorityContext::with_clock(config, clock.clone()).unwrap();

        let registry = Arc::new(RoleRegistry::new(Arc::clone(context.notifier())));
        let directory = Arc::new(InMemoryDirectory::new());
        let exporter = MetadataExporter::new(
            Arc::clone(&context),
            Arc::clone(&registry),
            directory.clone(),
        );
        Fixture {
            dir,
            clock,
            context,
            registry,
            directory,
            exporter,
            certificate: cert.der().to_vec(),
        }
    }

    impl Fixture {
        fn add(&self, implementor: BasicImplementor) {
            let path = implementor.path();
            let roles = implementor.roles();
            self.directory.insert(Arc::new(implementor));
            self.registry.register_all(&roles, &path).unwrap();
        }
    }

    #[test]
    fn empty_registry_is_configuration_error() {
        let f = fixture();
        assert!(matches!(f.exporter.export(), Err(SamlError::Configuration(_))));
    }

    #[test]
    fn attribute_provider_alone_is_configuration_error() {
        let f = fixture();
        f.add(BasicImplementor::new("/saml/ap", [Role::Ap]));
        assert!(matches!(f.exporter.build(), Err(SamlError::Configuration(_))));
    }

    #[test]
    fn roles_without_generator_fail() {
        let f = fixture();
        f.add(BasicImplementor::new("/saml/pdp", [Role::Pdp]));
        let err = f.exporter.build().unwrap_err();
        assert!(err.to_string().contains("pdp"));
    }

    #[test]
    fn idp_descriptor() {
        let f = fixture();
        let provider = SimpleAttributeProvider::new()
            .with_attribute(AttributeDescriptor::new("mail", "uri", "urn:mail", XsType::String));
        f.add(
            BasicImplementor::new("/saml/my idp", [Role::Idp, Role::Ap])
                .with_attribute_provider(Arc::new(provider))
                .with_name_id_formats(["urn:oasis:names:tc:SAML:2.0:nameid-format:persistent"]),
        );

        let descriptor = f.exporter.build().unwrap();
        assert_eq!(descriptor.entity_id.as_str(), IDP);
        assert!(descriptor.id.as_deref().unwrap().starts_with('_'));
        assert_eq!(descriptor.valid_until, Some(f.clock.now() + Duration::minutes(10)));
        assert_eq!(descriptor.roles.len(), 1);

        let rd = &descriptor.roles[0];
        assert_eq!(rd.key_descriptors, vec![KeyDescriptor::signing(f.certificate.clone())]);
        assert_eq!(rd.name_id_formats.len(), 1);
        let RoleDescriptorKind::IdpSso {
            single_sign_on_services,
            attributes,
            ..
        } = &rd.kind
        else {
            panic!("expected IDPSSODescriptor");
        };
        assert_eq!(
            single_sign_on_services,
            &vec![
                Endpoint::new(SamlBinding::HttpRedirect, "https://idp.example.org/site/saml/my%20idp/redirect"),
                Endpoint::new(SamlBinding::HttpPost, "https://idp.example.org/site/saml/my%20idp/post"),
            ]
        );
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes[0].friendly_name.as_deref(), Some("mail"));
    }

    #[test]
    fn sp_descriptor() {
        let f = fixture();
        f.add(
            BasicImplementor::new("/saml/sp", [Role::Sp])
                .with_signed_assertions()
                .with_attribute_consuming_service(
                    AttributeConsumingService::new(0)
                        .with_default(true)
                        .with_requested_attribute(RequestedAttribute::new("mail")),
                ),
        );

        let descriptor = f.exporter.build().unwrap();
        let RoleDescriptorKind::SpSso {
            want_assertions_signed,
            assertion_consumer_services,
            attribute_consuming_services,
            ..
        } = &descriptor.roles[0].kind
        else {
            panic!("expected SPSSODescriptor");
        };
        assert!(*want_assertions_signed);
        assert_eq!(assertion_consumer_services.len(), 1);
        assert_eq!(assertion_consumer_services[0].index, 1);
        assert_eq!(assertion_consumer_services[0].is_default, Some(true));
        assert_eq!(
            assertion_consumer_services[0].endpoint.location,
            "https://idp.example.org/site/saml/sp/post"
        );
        assert_eq!(attribute_consuming_services.len(), 1);
    }

    #[test]
    fn future_certificate_is_published() {
        let f = fixture();
        let key = rcgen::KeyPair::generate().unwrap();
        let next = rcgen::CertificateParams::new(vec!["idp.example.org".to_string()])
            .unwrap()
            .self_signed(&key)
            .unwrap();
        std::fs::write(f.dir.path().join("next.der"), next.der()).unwrap();
        let config = (*f.context.config()).clone().with_future_certificate("next.der");
        f.context.reconfigure(config).unwrap();
        f.add(BasicImplementor::new("/saml/idp", [Role::Idp]));

        let descriptor = f.exporter.build().unwrap();
        let certs: Vec<&[u8]> = descriptor.roles[0]
            .key_descriptors
            .iter()
            .map(|k| k.certificate.as_slice())
            .collect();
        let next_der = next.der().to_vec();
        assert_eq!(certs, vec![f.certificate.as_slice(), next_der.as_slice()]);
    }

    #[test]
    fn missing_certificate_is_configuration_error() {
        let f = fixture();
        f.context
            .reconfigure(AuthorityConfig::new(IDP, "https://idp.example.org/site"))
            .unwrap();
        f.add(BasicImplementor::new("/saml/idp", [Role::Idp]));
        assert!(matches!(f.exporter.build(), Err(SamlError::Configuration(_))));
    }

    #[test]
    fn validity_past_time_range_is_configuration_error() {
        let f = fixture();
        f.add(BasicImplementor::new("/saml/idp", [Role::Idp]));
        f.clock.set(chrono::DateTime::<Utc>::MAX_UTC - Duration::minutes(1));
        assert!(matches!(f.exporter.build(), Err(SamlError::Configuration(_))));
    }

    #[test]
    fn export_is_cached_until_roles_change() {
        let f = fixture();
        f.add(BasicImplementor::new("/saml/idp", [Role::Idp]));

        let first = f.exporter.export().unwrap();
        let again = f.exporter.export().unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert!(first.xml.contains("IDPSSODescriptor"));

        f.add(BasicImplementor::new("/saml/sp", [Role::Sp]));
        let rebuilt = f.exporter.export().unwrap();
        assert!(!Arc::ptr_eq(&first, &rebuilt));
        assert!(rebuilt.xml.contains("SPSSODescriptor"));
    }

    #[test]
    fn export_expires_with_validity() {
        let f = fixture();
        f.add(BasicImplementor::new("/saml/idp", [Role::Idp]));
        let first = f.exporter.export().unwrap();

        f.clock.advance(Duration::minutes(11));
        let second = f.exporter.export().unwrap();
        assert_ne!(first.descriptor.id, second.descriptor.id);
    }

    #[test]
    fn url_customizer_overrides_derivation() {
        let f = fixture();
        f.add(BasicImplementor::new("/saml/idp", [Role::Idp]));
        f.exporter.set_url_customizer(Some(Arc::new(|path: &ImplementorPath| {
            format!("https://cdn.example.org{path}")
        })));

        assert_eq!(f.exporter.url_for(&"/saml/idp".into()), "https://cdn.example.org/saml/idp");
        let export = f.exporter.export().unwrap();
        assert!(export.xml.contains("https://cdn.example.org/saml/idp/post"));
    }

    #[test]
    fn unresolvable_implementor_fails() {
        let f = fixture();
        f.registry.register(Role::Idp, "/saml/gone".into()).unwrap();
        assert!(matches!(
            f.exporter.build(),
            Err(SamlError::UnknownImplementor(_))
        ));
    }

    #[test]
    fn unrelated_notifier_does_not_invalidate() {
        let f = fixture();
        f.add(BasicImplementor::new("/saml/idp", [Role::Idp]));
        let first = f.exporter.export().unwrap();
        ChangeNotifier::new().publish(&ChangeEvent::RolesChanged);
        assert!(Arc::ptr_eq(&first, &f.exporter.export().unwrap()));
    }
}
