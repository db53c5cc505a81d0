//! Key manager.
//!
//! Supplies the keys usable for signing (own entity) or verification (peer
//! entities). The own key is read from the configured key file and never
//! expires; peer keys are the signing certificates of the peer's metadata
//! and expire with it.

use std::fmt;
use std::fs;
use std::sync::Arc;

use sa_cache::{CacheEntry, ValidityCache};
use sa_core::{ChangeEvent, ChangeListener, EntityId};
use sa_crypto::{load_private_key, KeyMaterial, VerificationKey, NO_PASSWORD};
use tracing::debug;

use crate::context::AuthorityContext;
use crate::error::{SamlError, SamlResult};
use crate::metadata::MetadataRepository;

/// Keys of one entity, in the order they should be tried.
pub type KeyList = Arc<[KeyMaterial]>;

/// Per-entity key cache.
///
/// The manager subscribes to the authority's change notifier: an
/// [`ChangeEvent::EntityChanged`] drops that entity's keys, a
/// [`ChangeEvent::ConfigurationChanged`] drops all keys.
#[derive(Clone)]
pub struct KeyManager {
    inner: Arc<KeyManagerInner>,
}

struct KeyManagerInner {
    context: Arc<AuthorityContext>,
    repository: Arc<dyn MetadataRepository>,
    cache: ValidityCache<EntityId, KeyList>,
}

impl KeyManager {
    /// Creates a manager reading peer metadata from `repository`.
    #[must_use]
    pub fn new(context: Arc<AuthorityContext>, repository: Arc<dyn MetadataRepository>) -> Self {
        let inner = Arc::new(KeyManagerInner {
            context,
            repository,
            cache: ValidityCache::new(),
        });
        inner.context.notifier().subscribe(&inner);
        Self { inner }
    }

    /// Returns the keys of `entity_id`, loading them on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] if the own entity has no private
    /// key configured, [`SamlError::KeyUnavailable`] if key material cannot
    /// be loaded, and propagates metadata repository failures.
    pub fn get(&self, entity_id: &EntityId) -> SamlResult<KeyList> {
        let now = self.inner.context.now();
        self.inner
            .cache
            .get_or_try_insert_with(entity_id, now, || self.inner.load(entity_id))
    }

    /// Drops the cached keys of `entity_id`.
    pub fn invalidate(&self, entity_id: &EntityId) {
        self.inner.cache.invalidate(entity_id);
    }

    /// Drops all cached keys.
    pub fn clear(&self) {
        self.inner.cache.clear();
    }

    /// Returns the cache slot of `entity_id` if one is valid now.
    #[must_use]
    pub fn cached(&self, entity_id: &EntityId) -> Option<Arc<CacheEntry<KeyList>>> {
        self.inner.cache.get(entity_id, self.inner.context.now())
    }
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager")
            .field("cached", &self.inner.cache.len())
            .finish_non_exhaustive()
    }
}

impl KeyManagerInner {
    fn load(&self, entity_id: &EntityId) -> SamlResult<CacheEntry<KeyList>> {
        if *entity_id == self.context.entity_id() {
            return self.load_own(entity_id);
        }
        self.load_peer(entity_id)
    }

    fn load_own(&self, entity_id: &EntityId) -> SamlResult<CacheEntry<KeyList>> {
        let config = self.context.config();
        let path = config
            .private_key
            .as_deref()
            .ok_or_else(|| SamlError::Configuration("no private key configured".to_string()))?;
        let path = config.resolve_path(path);

        let unavailable = |reason: String| SamlError::KeyUnavailable {
            entity_id: entity_id.clone(),
            reason,
        };

        let data = fs::read(&path)
            .map_err(|e| unavailable(format!("cannot read {}: {e}", path.display())))?;
        // Without a configured password the sentinel makes decryption fail
        // instead of prompting.
        let password = config
            .private_key_password
            .as_deref()
            .map_or(NO_PASSWORD, str::as_bytes);
        let key = load_private_key(&data, Some(password)).map_err(|e| unavailable(e.to_string()))?;

        debug!(entity_id = %entity_id, key_id = key.key_id(), "own signing key loaded");
        Ok(CacheEntry::never_expiring(Arc::from(vec![KeyMaterial::from(key)])))
    }

    fn load_peer(&self, entity_id: &EntityId) -> SamlResult<CacheEntry<KeyList>> {
        let metadata = self.repository.metadata_by_id(entity_id)?.get_recent_metadata()?;

        let keys = metadata
            .signing_certificates()
            .into_iter()
            .map(|der| {
                VerificationKey::from_der(der)
                    .map(KeyMaterial::from)
                    .map_err(|e| SamlError::KeyUnavailable {
                        entity_id: entity_id.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<SamlResult<Vec<_>>>()?;

        debug!(
            entity_id = %entity_id,
            keys = keys.len(),
            valid_until = ?metadata.valid_until,
            "verification keys loaded"
        );
        Ok(CacheEntry::new(Arc::from(keys), metadata.valid_until))
    }
}

impl ChangeListener for KeyManagerInner {
    fn on_change(&self, event: &ChangeEvent) {
        match event {
            ChangeEvent::EntityChanged { entity_id } => {
                self.cache.invalidate(entity_id);
            }
            ChangeEvent::ConfigurationChanged => self.cache.clear(),
            ChangeEvent::RolesChanged => {}
        }
    }
}
