//! The authority facade.
//!
//! [`SamlAuthority`] wires the components of one authority to a shared
//! [`AuthorityContext`]: role registry, implementor directory, peer metadata
//! repository, key manager and metadata exporter.

use std::fmt;
use std::sync::Arc;

use sa_core::{AuthorityConfig, Clock, EntityId};
use tracing::{debug, info};

use crate::attribute::{AttributeReleaseEngine, Subject};
use crate::context::AuthorityContext;
use crate::error::{SamlError, SamlResult};
use crate::keys::{KeyList, KeyManager};
use crate::metadata::{
    InMemoryMetadataRepository, MetadataExporter, MetadataRepository, MetadataSource, OwnMetadata,
    UrlCustomizer,
};
use crate::roles::{
    ImplementorDirectory, ImplementorPath, InMemoryDirectory, Role, RoleImplementor, RoleRegistry,
};
use crate::signature::{SignatureContext, SignaturePurpose};
use crate::types::{AttributeStatement, EntityDescriptor};

/// One SAML authority.
pub struct SamlAuthority {
    context: Arc<AuthorityContext>,
    registry: Arc<RoleRegistry>,
    directory: Arc<InMemoryDirectory>,
    repository: InMemoryMetadataRepository,
    keys: KeyManager,
    exporter: MetadataExporter,
}

impl SamlAuthority {
    /// Creates an authority using the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] if `config` does not validate.
    pub fn new(config: AuthorityConfig) -> SamlResult<Self> {
        Ok(Self::from_context(AuthorityContext::new(config)?))
    }

    /// Creates an authority with an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] if `config` does not validate.
    pub fn with_clock(config: AuthorityConfig, clock: Arc<dyn Clock>) -> SamlResult<Self> {
        Ok(Self::from_context(AuthorityContext::with_clock(config, clock)?))
    }

    fn from_context(context: Arc<AuthorityContext>) -> Self {
        let registry = Arc::new(RoleRegistry::new(Arc::clone(context.notifier())));
        let directory = Arc::new(InMemoryDirectory::new());
        let repository = InMemoryMetadataRepository::new(Arc::clone(&context));
        let keys = KeyManager::new(Arc::clone(&context), Arc::new(repository.clone()));
        let exporter = MetadataExporter::new(
            Arc::clone(&context),
            Arc::clone(&registry),
            Arc::clone(&directory) as Arc<dyn ImplementorDirectory>,
        );
        info!(entity_id = %context.entity_id(), "SAML authority created");
        Self {
            context,
            registry,
            directory,
            repository,
            keys,
            exporter,
        }
    }

    /// Returns the shared context.
    #[must_use]
    pub fn context(&self) -> &Arc<AuthorityContext> {
        &self.context
    }

    /// Returns the role registry.
    #[must_use]
    pub fn registry(&self) -> &RoleRegistry {
        &self.registry
    }

    /// Returns this authority's entity id.
    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        self.context.entity_id()
    }

    /// Replaces the configuration. Cached keys and metadata are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] if `config` does not validate.
    pub fn reconfigure(&self, config: AuthorityConfig) -> SamlResult<()> {
        self.context.reconfigure(config)
    }

    // ========================================================================
    // Roles
    // ========================================================================

    /// Assigns `role` to the implementor at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::RoleAlreadyRegistered`] if another implementor
    /// holds the role.
    pub fn register_role(&self, role: Role, path: impl Into<ImplementorPath>) -> SamlResult<()> {
        self.registry.register(role, path.into())
    }

    /// Adds `implementor` to the directory and assigns it all its roles.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::RoleAlreadyRegistered`] if any of its roles is
    /// taken; nothing is registered in that case.
    pub fn register_implementor(&self, implementor: Arc<dyn RoleImplementor>) -> SamlResult<()> {
        let path = implementor.path();
        let roles = implementor.roles();
        self.registry.register_all(&roles, &path)?;
        self.directory.insert(implementor);
        debug!(path = %path, roles = roles.len(), "implementor registered");
        Ok(())
    }

    /// Releases every role held by the implementor at `path`.
    pub fn unregister_implementor(&self, path: &ImplementorPath) -> Vec<Role> {
        self.registry.unregister(path)
    }

    /// Checks that the implementor at `path` may be deleted.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::ProtectedDeletion`] while it holds a role.
    pub fn check_removal(&self, path: &ImplementorPath) -> SamlResult<()> {
        self.registry.delete_guard(path)
    }

    /// Checks that the authority itself may be removed.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::ProtectedDeletion`] while any role is registered.
    pub fn check_authority_removal(&self) -> SamlResult<()> {
        self.registry.ensure_empty()
    }

    /// Removes the implementor at `path` from the directory.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::ProtectedDeletion`] while it holds a role and
    /// [`SamlError::UnknownImplementor`] if no such implementor exists.
    pub fn remove_implementor(&self, path: &ImplementorPath) -> SamlResult<()> {
        self.check_removal(path)?;
        self.directory
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| SamlError::UnknownImplementor(path.to_string()))
    }

    // ========================================================================
    // Metadata and keys
    // ========================================================================

    /// Registers a peer entity and the source of its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] for this authority's own id.
    pub fn add_entity(
        &self,
        entity_id: impl Into<EntityId>,
        source: Arc<dyn MetadataSource>,
    ) -> SamlResult<()> {
        self.repository.add_entity(entity_id, source)
    }

    /// Removes a peer entity.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::ProtectedDeletion`] for this authority's own id
    /// and [`SamlError::UnknownEntity`] for an unknown one.
    pub fn remove_entity(&self, entity_id: &EntityId) -> SamlResult<()> {
        self.repository.remove_entity(entity_id)
    }

    /// Returns the registered peer entity ids.
    #[must_use]
    pub fn entities(&self) -> Vec<EntityId> {
        self.repository.entities()
    }

    /// Exports this authority's metadata.
    ///
    /// # Errors
    ///
    /// See [`MetadataExporter::build`].
    pub fn export_own_metadata(&self) -> SamlResult<Arc<OwnMetadata>> {
        self.exporter.export()
    }

    /// Returns the metadata of `entity_id`: exported for this authority,
    /// fetched for a peer.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::UnknownEntity`] for an unregistered peer and
    /// propagates export and fetch failures.
    pub fn metadata_for(&self, entity_id: &EntityId) -> SamlResult<Arc<EntityDescriptor>> {
        if *entity_id == self.context.entity_id() {
            return Ok(Arc::new(self.exporter.export()?.descriptor.clone()));
        }
        self.repository.metadata_by_id(entity_id)?.get_recent_metadata()
    }

    /// Installs or removes the URL customizer used by the exporter.
    pub fn set_url_customizer(&self, customizer: Option<Arc<dyn UrlCustomizer>>) {
        self.exporter.set_url_customizer(customizer);
    }

    /// Returns the keys of `entity_id`.
    ///
    /// # Errors
    ///
    /// See [`KeyManager::get`].
    pub fn keys(&self, entity_id: &EntityId) -> SamlResult<KeyList> {
        self.keys.get(entity_id)
    }

    /// Returns a signature context for `purpose`.
    #[must_use]
    pub fn signature_context(&self, purpose: SignaturePurpose) -> SignatureContext {
        SignatureContext::new(purpose, Arc::clone(&self.context), self.keys.clone())
    }

    // ========================================================================
    // Attribute release
    // ========================================================================

    /// Computes the attributes released about `subject` to `requester`.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] if no implementor holds the `ap`
    /// role or it provides no attributes, propagates metadata failures for
    /// `requester`, and returns [`SamlError::Protocol`] for an unknown
    /// attribute consuming service index.
    pub fn release_attributes(
        &self,
        requester: &EntityId,
        requested_index: Option<u16>,
        subject: &dyn Subject,
    ) -> SamlResult<Option<AttributeStatement>> {
        let path = self.registry.path_for(Role::Ap).ok_or_else(|| {
            SamlError::Configuration("no implementor holds the ap role".to_string())
        })?;
        let implementor = self
            .directory
            .implementor(&path)
            .ok_or_else(|| SamlError::UnknownImplementor(path.to_string()))?;
        let provider = implementor.attribute_provider().ok_or_else(|| {
            SamlError::Configuration(format!("implementor {path} provides no attributes"))
        })?;

        let metadata = self.metadata_for(requester)?;
        let engine = AttributeReleaseEngine::new(provider, self.context.config().charset);
        Ok(engine.release(requester, requested_index, subject, &metadata)?)
    }
}

impl fmt::Debug for SamlAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SamlAuthority")
            .field("entity_id", &self.context.entity_id())
            .field("registry", &self.registry)
            .field("directory", &self.directory)
            .field("repository", &self.repository)
            .finish_non_exhaustive()
    }
}
