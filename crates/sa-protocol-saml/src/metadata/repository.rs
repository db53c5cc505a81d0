//! Peer metadata repository.
//!
//! Fetched metadata is held in a [`ValidityCache`] until its `validUntil`,
//! or for the configured default validity when it declares none. Retrying
//! a failed fetch is left to the [`MetadataSource`].

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use sa_cache::{CacheEntry, ValidityCache};
use sa_core::{ChangeEvent, ChangeListener, EntityId};
use tracing::{debug, info};

use crate::context::AuthorityContext;
use crate::error::{SamlError, SamlResult};
use crate::types::EntityDescriptor;

/// Metadata of one entity.
pub trait EntityMetadata: Send + Sync {
    /// Returns the latest validated metadata, fetching it if no valid copy
    /// is cached.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::MetadataUnavailable`] if fetching fails.
    fn get_recent_metadata(&self) -> SamlResult<Arc<EntityDescriptor>>;

    /// Drops the cached copy so the next access fetches again.
    fn clear_metadata(&self);
}

/// Lookup of entity metadata by id.
pub trait MetadataRepository: Send + Sync {
    /// Returns the metadata handle of `entity_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::UnknownEntity`] if the entity is not registered.
    fn metadata_by_id(&self, entity_id: &EntityId) -> SamlResult<Arc<dyn EntityMetadata>>;
}

/// Produces the metadata document of an entity.
pub trait MetadataSource: Send + Sync {
    /// Fetches and validates the document.
    ///
    /// # Errors
    ///
    /// Any error is reported as [`SamlError::MetadataUnavailable`].
    fn fetch(&self, entity_id: &EntityId) -> SamlResult<EntityDescriptor>;
}

impl<F> MetadataSource for F
where
    F: Fn(&EntityId) -> SamlResult<EntityDescriptor> + Send + Sync,
{
    fn fetch(&self, entity_id: &EntityId) -> SamlResult<EntityDescriptor> {
        self(entity_id)
    }
}

/// A fixed metadata document.
#[derive(Debug, Clone)]
pub struct StaticMetadata(EntityDescriptor);

impl StaticMetadata {
    /// Wraps `descriptor`.
    #[must_use]
    pub const fn new(descriptor: EntityDescriptor) -> Self {
        Self(descriptor)
    }
}

impl MetadataSource for StaticMetadata {
    fn fetch(&self, _entity_id: &EntityId) -> SamlResult<EntityDescriptor> {
        Ok(self.0.clone())
    }
}

/// Repository of peer entities held in memory.
///
/// Adding, replacing or removing an entity and clearing its metadata
/// broadcast [`ChangeEvent::EntityChanged`], so derived caches such as
/// verification keys are dropped before the call returns.
#[derive(Clone)]
pub struct InMemoryMetadataRepository {
    inner: Arc<RepositoryInner>,
}

struct RepositoryInner {
    context: Arc<AuthorityContext>,
    sources: DashMap<EntityId, Arc<dyn MetadataSource>>,
    cache: ValidityCache<EntityId, Arc<EntityDescriptor>>,
}

impl InMemoryMetadataRepository {
    /// Creates an empty repository and subscribes it to configuration
    /// changes.
    #[must_use]
    pub fn new(context: Arc<AuthorityContext>) -> Self {
        let inner = Arc::new(RepositoryInner {
            context,
            sources: DashMap::new(),
            cache: ValidityCache::new(),
        });
        inner.context.notifier().subscribe(&inner);
        Self { inner }
    }

    /// Adds or replaces the entity `entity_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] for this authority's own id, whose
    /// metadata is exported rather than fetched.
    pub fn add_entity(
        &self,
        entity_id: impl Into<EntityId>,
        source: Arc<dyn MetadataSource>,
    ) -> SamlResult<()> {
        let entity_id = entity_id.into();
        if entity_id == self.inner.context.entity_id() {
            return Err(SamlError::Configuration(format!(
                "{entity_id} is this authority's own entity"
            )));
        }

        let replaced = self.inner.sources.insert(entity_id.clone(), source).is_some();
        self.inner.cache.invalidate(&entity_id);
        info!(entity_id = %entity_id, replaced, "entity registered");
        self.publish(entity_id);
        Ok(())
    }

    /// Removes the entity `entity_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::ProtectedDeletion`] for this authority's own id
    /// and [`SamlError::UnknownEntity`] if the entity is not registered.
    pub fn remove_entity(&self, entity_id: &EntityId) -> SamlResult<()> {
        if *entity_id == self.inner.context.entity_id() {
            return Err(SamlError::ProtectedDeletion {
                target: entity_id.to_string(),
                reason: "the authority's own entity cannot be removed".to_string(),
            });
        }
        if self.inner.sources.remove(entity_id).is_none() {
            return Err(SamlError::UnknownEntity(entity_id.clone()));
        }
        self.inner.cache.invalidate(entity_id);
        info!(entity_id = %entity_id, "entity removed");
        self.publish(entity_id.clone());
        Ok(())
    }

    /// Returns the registered entity ids in order.
    #[must_use]
    pub fn entities(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.inner.sources.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Returns whether `entity_id` is registered.
    #[must_use]
    pub fn contains(&self, entity_id: &EntityId) -> bool {
        self.inner.sources.contains_key(entity_id)
    }

    fn publish(&self, entity_id: EntityId) {
        self.inner
            .context
            .notifier()
            .publish(&ChangeEvent::EntityChanged { entity_id });
    }
}

impl MetadataRepository for InMemoryMetadataRepository {
    fn metadata_by_id(&self, entity_id: &EntityId) -> SamlResult<Arc<dyn EntityMetadata>> {
        if !self.inner.sources.contains_key(entity_id) {
            return Err(SamlError::UnknownEntity(entity_id.clone()));
        }
        Ok(Arc::new(EntityHandle {
            entity_id: entity_id.clone(),
            inner: Arc::clone(&self.inner),
        }))
    }
}

impl fmt::Debug for InMemoryMetadataRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryMetadataRepository")
            .field("entities", &self.inner.sources.len())
            .field("cached", &self.inner.cache.len())
            .finish()
    }
}

impl RepositoryInner {
    fn fetch(&self, entity_id: &EntityId) -> SamlResult<CacheEntry<Arc<EntityDescriptor>>> {
        let source = self
            .sources
            .get(entity_id)
            .map(|s| Arc::clone(s.value()))
            .ok_or_else(|| SamlError::UnknownEntity(entity_id.clone()))?;

        let unavailable = |reason: String| SamlError::MetadataUnavailable {
            entity_id: entity_id.clone(),
            reason,
        };

        let mut descriptor = source.fetch(entity_id).map_err(|e| unavailable(e.to_string()))?;
        if descriptor.entity_id != *entity_id {
            return Err(unavailable(format!(
                "document describes {}",
                descriptor.entity_id
            )));
        }

        let now = self.context.now();
        let valid_until = match descriptor.valid_until {
            Some(until) if until < now => {
                return Err(unavailable(format!("document expired at {until}")));
            }
            Some(until) => until,
            None => self.context.metadata_expiry(now)?,
        };
        descriptor.valid_until = Some(valid_until);
        debug!(entity_id = %entity_id, %valid_until, "metadata fetched");

        Ok(CacheEntry::new(Arc::new(descriptor), Some(valid_until)))
    }
}

impl ChangeListener for RepositoryInner {
    fn on_change(&self, event: &ChangeEvent) {
        if *event == ChangeEvent::ConfigurationChanged {
            self.cache.clear();
        }
    }
}

struct EntityHandle {
    entity_id: EntityId,
    inner: Arc<RepositoryInner>,
}

impl EntityMetadata for EntityHandle {
    fn get_recent_metadata(&self) -> SamlResult<Arc<EntityDescriptor>> {
        let now = self.inner.context.now();
        self.inner
            .cache
            .get_or_try_insert_with(&self.entity_id, now, || self.inner.fetch(&self.entity_id))
    }

    fn clear_metadata(&self) {
        self.inner.cache.invalidate(&self.entity_id);
        self.inner.context.notifier().publish(&ChangeEvent::EntityChanged {
            entity_id: self.entity_id.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{Duration, TimeZone, Utc};
    use sa_core::{AuthorityConfig, Clock, ManualClock};

    use super::*;

    const SP: &str = "https://sp.example.org";

    fn setup() -> (InMemoryMetadataRepository, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let context = AuthorityContext::with_clock(
            AuthorityConfig::new("https://idp.example.org", "https://idp.example.org/saml")
                .with_metadata_validity_secs(3600),
            clock.clone(),
        )
        .unwrap();
        (InMemoryMetadataRepository::new(context), clock)
    }

    fn counting_source(fetches: Arc<AtomicUsize>) -> Arc<dyn MetadataSource> {
        Arc::new(move |id: &EntityId| -> SamlResult<EntityDescriptor> {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok(EntityDescriptor::new(id.clone()))
        })
    }

    #[test]
    fn missing_validity_uses_default_window() {
        let (repository, clock) = setup();
        let fetches = Arc::new(AtomicUsize::new(0));
        repository.add_entity(SP, counting_source(fetches.clone())).unwrap();

        let handle = repository.metadata_by_id(&SP.into()).unwrap();
        let first = handle.get_recent_metadata().unwrap();
        assert_eq!(first.valid_until, Some(clock.now() + Duration::hours(1)));

        handle.get_recent_metadata().unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        clock.advance(Duration::hours(1) + Duration::seconds(1));
        handle.get_recent_metadata().unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn default_window_past_time_range_is_configuration_error() {
        let (repository, clock) = setup();
        clock.set(chrono::DateTime::<Utc>::MAX_UTC - Duration::minutes(1));
        repository
            .add_entity(SP, Arc::new(StaticMetadata::new(EntityDescriptor::new(SP))))
            .unwrap();

        let err = repository
            .metadata_by_id(&SP.into())
            .unwrap()
            .get_recent_metadata()
            .unwrap_err();
        assert!(matches!(err, SamlError::Configuration(_)));
    }

    #[test]
    fn clear_forces_refetch() {
        let (repository, _) = setup();
        let fetches = Arc::new(AtomicUsize::new(0));
        repository.add_entity(SP, counting_source(fetches.clone())).unwrap();

        let handle = repository.metadata_by_id(&SP.into()).unwrap();
        handle.get_recent_metadata().unwrap();
        handle.clear_metadata();
        handle.get_recent_metadata().unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn expired_document_is_rejected() {
        let (repository, clock) = setup();
        let expired = EntityDescriptor::new(SP).with_valid_until(clock.now() - Duration::seconds(1));
        repository
            .add_entity(SP, Arc::new(StaticMetadata::new(expired)))
            .unwrap();

        let err = repository
            .metadata_by_id(&SP.into())
            .unwrap()
            .get_recent_metadata()
            .unwrap_err();
        assert!(matches!(err, SamlError::MetadataUnavailable { .. }));
    }

    #[test]
    fn mismatched_entity_id_is_rejected() {
        let (repository, _) = setup();
        repository
            .add_entity(
                SP,
                Arc::new(StaticMetadata::new(EntityDescriptor::new("https://other.example.org"))),
            )
            .unwrap();

        let err = repository
            .metadata_by_id(&SP.into())
            .unwrap()
            .get_recent_metadata()
            .unwrap_err();
        assert!(err.to_string().contains("https://other.example.org"));
    }

    #[test]
    fn own_entity_is_protected() {
        let (repository, _) = setup();
        let own = EntityId::from("https://idp.example.org");

        let source = Arc::new(StaticMetadata::new(EntityDescriptor::new(own.clone())));
        assert!(matches!(
            repository.add_entity(own.clone(), source),
            Err(SamlError::Configuration(_))
        ));
        assert!(matches!(
            repository.remove_entity(&own),
            Err(SamlError::ProtectedDeletion { .. })
        ));
    }

    #[test]
    fn unknown_entities() {
        let (repository, _) = setup();
        assert!(matches!(
            repository.metadata_by_id(&SP.into()),
            Err(SamlError::UnknownEntity(_))
        ));
        assert!(matches!(
            repository.remove_entity(&SP.into()),
            Err(SamlError::UnknownEntity(_))
        ));
    }

    #[test]
    fn entities_are_listed_in_order() {
        let (repository, _) = setup();
        for id in ["https://b.example.org", "https://a.example.org"] {
            repository
                .add_entity(id, Arc::new(StaticMetadata::new(EntityDescriptor::new(id))))
                .unwrap();
        }
        assert_eq!(
            repository.entities(),
            vec![
                EntityId::from("https://a.example.org"),
                EntityId::from("https://b.example.org")
            ]
        );
        repository.remove_entity(&"https://a.example.org".into()).unwrap();
        assert!(!repository.contains(&"https://a.example.org".into()));
    }
}
