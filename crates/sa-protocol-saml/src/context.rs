//! Shared authority context.
//!
//! Every component receives an [`AuthorityContext`] at construction instead
//! of looking the authority up from global state.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sa_core::{AuthorityConfig, ChangeEvent, ChangeNotifier, Clock, EntityId, SystemClock};

use crate::error::SamlResult;

/// Configuration, clock and change notifier of one authority.
pub struct AuthorityContext {
    config: RwLock<Arc<AuthorityConfig>>,
    clock: Arc<dyn Clock>,
    notifier: Arc<ChangeNotifier>,
}

impl AuthorityContext {
    /// Creates a context using the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SamlError::Configuration`] if `config` does not validate.
    pub fn new(config: AuthorityConfig) -> SamlResult<Arc<Self>> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a context with an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SamlError::Configuration`] if `config` does not validate.
    pub fn with_clock(config: AuthorityConfig, clock: Arc<dyn Clock>) -> SamlResult<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(Self {
            config: RwLock::new(Arc::new(config)),
            clock,
            notifier: Arc::new(ChangeNotifier::new()),
        }))
    }

    /// Returns a snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> Arc<AuthorityConfig> {
        Arc::clone(&self.config.read())
    }

    /// Returns this authority's entity id.
    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        self.config.read().entity()
    }

    /// Returns the current time.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Returns the end of a metadata validity window starting at `from`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SamlError::Configuration`] when the window ends past
    /// the representable time range.
    pub fn metadata_expiry(&self, from: DateTime<Utc>) -> SamlResult<DateTime<Utc>> {
        let validity = self.config().metadata_validity();
        from.checked_add_signed(validity).ok_or_else(|| {
            crate::SamlError::Configuration(format!(
                "metadata validity of {}s from {from} is out of range",
                validity.num_seconds()
            ))
        })
    }

    /// Returns the change notifier.
    #[must_use]
    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    /// Replaces the configuration and broadcasts
    /// [`ChangeEvent::ConfigurationChanged`] before returning.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SamlError::Configuration`] if `config` does not
    /// validate; the old configuration stays in place.
    pub fn reconfigure(&self, config: AuthorityConfig) -> SamlResult<()> {
        config.validate()?;
        *self.config.write() = Arc::new(config);
        tracing::info!("authority reconfigured");
        self.notifier.publish(&ChangeEvent::ConfigurationChanged);
        Ok(())
    }
}

impl fmt::Debug for AuthorityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorityContext")
            .field("entity_id", &self.entity_id())
            .field("clock", &self.clock)
            .field("notifier", &self.notifier)
            .finish()
    }
}
