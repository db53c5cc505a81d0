//! Role implementors and their lookup.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use super::{ImplementorPath, Role};
use crate::attribute::AttributeProvider;
use crate::types::AttributeConsumingService;

/// A local object performing one or more SAML roles.
///
/// Optional behaviour is declared explicitly: an implementor that produces
/// attributes returns a provider from [`RoleImplementor::attribute_provider`],
/// one that restricts name id formats returns them from
/// [`RoleImplementor::name_id_formats`].
pub trait RoleImplementor: Send + Sync {
    /// Location of the implementor; also the base of its published URLs.
    fn path(&self) -> ImplementorPath;

    /// Roles the implementor performs when registered as a whole.
    fn roles(&self) -> Vec<Role>;

    /// Attribute production capability.
    fn attribute_provider(&self) -> Option<&dyn AttributeProvider> {
        None
    }

    /// Supported `NameIDFormat` URIs, in preference order.
    fn name_id_formats(&self) -> Option<Vec<String>> {
        None
    }

    /// Whether an SP implementor wants signed assertions.
    fn wants_assertions_signed(&self) -> bool {
        false
    }

    /// Attribute consuming services an SP implementor requests.
    fn attribute_consuming_services(&self) -> Vec<AttributeConsumingService> {
        Vec::new()
    }
}

/// A [`RoleImplementor`] assembled from plain values.
#[derive(Clone)]
pub struct BasicImplementor {
    path: ImplementorPath,
    roles: Vec<Role>,
    provider: Option<Arc<dyn AttributeProvider>>,
    name_id_formats: Option<Vec<String>>,
    wants_assertions_signed: bool,
    services: Vec<AttributeConsumingService>,
}

impl BasicImplementor {
    /// Creates an implementor at `path` performing `roles`.
    #[must_use]
    pub fn new(path: impl Into<ImplementorPath>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            path: path.into(),
            roles: roles.into_iter().collect(),
            provider: None,
            name_id_formats: None,
            wants_assertions_signed: false,
            services: Vec::new(),
        }
    }

    /// Adds attribute production capability.
    #[must_use]
    pub fn with_attribute_provider(mut self, provider: Arc<dyn AttributeProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Declares supported name id formats.
    #[must_use]
    pub fn with_name_id_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.name_id_formats = Some(formats.into_iter().map(Into::into).collect());
        self
    }

    /// Requests signed assertions.
    #[must_use]
    pub const fn with_signed_assertions(mut self) -> Self {
        self.wants_assertions_signed = true;
        self
    }

    /// Adds an attribute consuming service.
    #[must_use]
    pub fn with_attribute_consuming_service(mut self, service: AttributeConsumingService) -> Self {
        self.services.push(service);
        self
    }
}

impl RoleImplementor for BasicImplementor {
    fn path(&self) -> ImplementorPath {
        self.path.clone()
    }

    fn roles(&self) -> Vec<Role> {
        self.roles.clone()
    }

    fn attribute_provider(&self) -> Option<&dyn AttributeProvider> {
        self.provider.as_deref()
    }

    fn name_id_formats(&self) -> Option<Vec<String>> {
        self.name_id_formats.clone()
    }

    fn wants_assertions_signed(&self) -> bool {
        self.wants_assertions_signed
    }

    fn attribute_consuming_services(&self) -> Vec<AttributeConsumingService> {
        self.services.clone()
    }
}

impl fmt::Debug for BasicImplementor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicImplementor")
            .field("path", &self.path)
            .field("roles", &self.roles)
            .field("attribute_provider", &self.provider.is_some())
            .finish_non_exhaustive()
    }
}

/// Resolves implementor paths.
pub trait ImplementorDirectory: Send + Sync {
    /// Returns the implementor at `path`.
    fn implementor(&self, path: &ImplementorPath) -> Option<Arc<dyn RoleImplementor>>;
}

/// Directory of implementors held in memory.
#[derive(Default)]
pub struct InMemoryDirectory {
    implementors: DashMap<ImplementorPath, Arc<dyn RoleImplementor>>,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the implementor at its own path.
    pub fn insert(&self, implementor: Arc<dyn RoleImplementor>) {
        self.implementors.insert(implementor.path(), implementor);
    }

    /// Removes the implementor at `path`.
    pub fn remove(&self, path: &ImplementorPath) -> Option<Arc<dyn RoleImplementor>> {
        self.implementors.remove(path).map(|(_, implementor)| implementor)
    }

    /// Returns the number of implementors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.implementors.len()
    }

    /// Returns whether the directory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.implementors.is_empty()
    }
}

impl ImplementorDirectory for InMemoryDirectory {
    fn implementor(&self, path: &ImplementorPath) -> Option<Arc<dyn RoleImplementor>> {
        self.implementors.get(path).map(|entry| Arc::clone(entry.value()))
    }
}

impl fmt::Debug for InMemoryDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryDirectory")
            .field("implementors", &self.implementors.len())
            .finish()
    }
}
