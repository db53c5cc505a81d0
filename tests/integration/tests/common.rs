//! Common test utilities and fixtures.

use std::path::Path;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use sa_core::{AuthorityConfig, EntityId, ManualClock};
use sa_protocol_saml::{BasicImplementor, EntityDescriptor, Role, SamlAuthority, SamlError};
use tempfile::TempDir;

pub const IDP_ID: &str = "https://idp.example.org/saml";
pub const SP_ID: &str = "https://sp.example.org/saml";

/// One authority with its key material on disk.
pub struct TestAuthority {
    /// Holds the key and certificate files.
    pub dir: TempDir,
    pub clock: Arc<ManualClock>,
    pub authority: Arc<SamlAuthority>,
    /// DER of the current certificate.
    pub certificate: Vec<u8>,
}

impl TestAuthority {
    /// Creates an authority with a fresh key pair and certificate.
    pub fn new(entity_id: &str, base_url: &str) -> anyhow::Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("sa_protocol_saml=debug")
            .with_test_writer()
            .try_init();

        let dir = tempfile::tempdir()?;
        let certificate = write_key_pair(dir.path(), "key.pem", "cert.pem")?;

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).single().unwrap(),
        ));
        let config = AuthorityConfig::new(entity_id, base_url)
            .with_certificate("cert.pem")
            .with_private_key("key.pem", None)
            .with_metadata_validity_secs(3600)
            .with_home_dir(dir.path());
        let authority = Arc::new(SamlAuthority::with_clock(config, clock.clone())?);

        Ok(Self {
            dir,
            clock,
            authority,
            certificate,
        })
    }

    /// An IdP holding the `idp` and `ap` roles.
    pub fn idp() -> anyhow::Result<Self> {
        let idp = Self::new(IDP_ID, "https://idp.example.org")?;
        idp.authority.register_implementor(Arc::new(
            BasicImplementor::new("/saml/idp", [Role::Idp, Role::Ap])
                .with_attribute_provider(Arc::new(crate::attribute_release::directory_attributes())),
        ))?;
        Ok(idp)
    }

    pub fn entity_id(&self) -> EntityId {
        self.authority.entity_id()
    }

    /// Registers `peer` as an entity whose metadata is its live export.
    pub fn trust(&self, peer: &TestAuthority) -> anyhow::Result<()> {
        let exporter = Arc::clone(&peer.authority);
        self.authority.add_entity(
            peer.entity_id(),
            Arc::new(move |_: &EntityId| -> Result<EntityDescriptor, SamlError> {
                Ok(exporter.export_own_metadata()?.descriptor.clone())
            }),
        )?;
        Ok(())
    }
}

/// Writes a new key pair and self-signed certificate, returning the
/// certificate DER.
pub fn write_key_pair(dir: &Path, key_file: &str, cert_file: &str) -> anyhow::Result<Vec<u8>> {
    let key = rcgen::KeyPair::generate()?;
    let cert = rcgen::CertificateParams::new(vec!["example.org".to_string()])?.self_signed(&key)?;
    std::fs::write(dir.join(key_file), key.serialize_pem())?;
    std::fs::write(dir.join(cert_file), cert.pem())?;
    Ok(cert.der().to_vec())
}
