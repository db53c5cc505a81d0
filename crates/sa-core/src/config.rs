//! Authority configuration.
//!
//! Supports construction in code and loading from `SA_*` environment
//! variables (optionally via a `.env` file).

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::charset::Charset;
use crate::entity::EntityId;
use crate::error::{Error, Result};

/// Default validity of exported and fetched metadata: one day.
pub const DEFAULT_METADATA_VALIDITY_SECS: i64 = 86_400;

/// Upper bound on the metadata validity: one hundred years.
pub const MAX_METADATA_VALIDITY_SECS: i64 = 3_155_760_000;

/// Configuration of one SAML authority.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// This authority's entity id.
    pub entity_id: String,
    /// Base URL under which role implementors are published.
    pub base_url: String,
    /// Validity of exported metadata (and default validity of fetched
    /// metadata that declares none), in seconds.
    pub metadata_validity_secs: i64,
    /// Current signing certificate file (PEM or DER).
    pub certificate: Option<PathBuf>,
    /// Certificate that will replace the current one (PEM or DER).
    pub future_certificate: Option<PathBuf>,
    /// Private key file (PEM).
    pub private_key: Option<PathBuf>,
    /// Password protecting the private key.
    #[serde(skip_serializing)]
    pub private_key_password: Option<String>,
    /// Character set used to decode byte-valued subject properties.
    pub charset: Charset,
    /// Directory against which relative file paths are resolved.
    pub home_dir: Option<PathBuf>,
}

impl AuthorityConfig {
    /// Creates a configuration with defaults for everything but the
    /// entity id and base URL.
    #[must_use]
    pub fn new(entity_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from the environment.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `SA_ENTITY_ID` | `entity_id` (required) |
    /// | `SA_BASE_URL` | `base_url` (required) |
    /// | `SA_METADATA_VALIDITY` | `metadata_validity_secs` |
    /// | `SA_CERTIFICATE` | `certificate` |
    /// | `SA_FUTURE_CERTIFICATE` | `future_certificate` |
    /// | `SA_PRIVATE_KEY` | `private_key` |
    /// | `SA_PRIVATE_KEY_PASSWORD` | `private_key_password` |
    /// | `SA_CHARSET` | `charset` |
    /// | `SA_HOME` | `home_dir` |
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing or a value
    /// does not parse, and propagates [`AuthorityConfig::validate`] failures.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let entity_id = env::var("SA_ENTITY_ID")
            .map_err(|_| Error::Config("SA_ENTITY_ID environment variable is required".into()))?;
        let base_url = env::var("SA_BASE_URL")
            .map_err(|_| Error::Config("SA_BASE_URL environment variable is required".into()))?;

        let mut config = Self::new(entity_id, base_url);

        if let Ok(validity) = env::var("SA_METADATA_VALIDITY") {
            config.metadata_validity_secs = validity.trim().parse().map_err(|e| {
                Error::Config(format!("SA_METADATA_VALIDITY is not a number: {e}"))
            })?;
        }
        if let Ok(charset) = env::var("SA_CHARSET") {
            config.charset = Charset::from_label(&charset)?;
        }

        config.certificate = env::var_os("SA_CERTIFICATE").map(PathBuf::from);
        config.future_certificate = env::var_os("SA_FUTURE_CERTIFICATE").map(PathBuf::from);
        config.private_key = env::var_os("SA_PRIVATE_KEY").map(PathBuf::from);
        config.private_key_password = env::var("SA_PRIVATE_KEY_PASSWORD").ok();
        config.home_dir = env::var_os("SA_HOME").map(PathBuf::from);

        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values that would make every
    /// operation fail.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty entity id, a base URL that is
    /// not an absolute URL, or a metadata validity outside
    /// `1..=MAX_METADATA_VALIDITY_SECS`.
    pub fn validate(&self) -> Result<()> {
        if self.entity_id.trim().is_empty() {
            return Err(Error::Config("entity id must not be empty".into()));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid base URL {:?}: {e}", self.base_url)))?;
        if !(1..=MAX_METADATA_VALIDITY_SECS).contains(&self.metadata_validity_secs) {
            return Err(Error::Config(format!(
                "metadata validity must be between 1 and {MAX_METADATA_VALIDITY_SECS} seconds, got {}",
                self.metadata_validity_secs
            )));
        }
        Ok(())
    }

    /// Returns the entity id as an [`EntityId`].
    #[must_use]
    pub fn entity(&self) -> EntityId {
        EntityId::new(self.entity_id.clone())
    }

    /// Returns the metadata validity window.
    #[must_use]
    pub fn metadata_validity(&self) -> chrono::Duration {
        chrono::Duration::try_seconds(self.metadata_validity_secs)
            .unwrap_or(chrono::Duration::MAX)
    }

    /// Resolves `path` against the home directory when it is relative.
    #[must_use]
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match &self.home_dir {
            Some(home) => home.join(path),
            None => env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path)),
        }
    }

    /// Sets the current certificate file.
    #[must_use]
    pub fn with_certificate(mut self, path: impl Into<PathBuf>) -> Self {
        self.certificate = Some(path.into());
        self
    }

    /// Sets the future certificate file.
    #[must_use]
    pub fn with_future_certificate(mut self, path: impl Into<PathBuf>) -> Self {
        self.future_certificate = Some(path.into());
        self
    }

    /// Sets the private key file and its optional password.
    #[must_use]
    pub fn with_private_key(mut self, path: impl Into<PathBuf>, password: Option<String>) -> Self {
        self.private_key = Some(path.into());
        self.private_key_password = password;
        self
    }

    /// Sets the metadata validity in seconds.
    #[must_use]
    pub const fn with_metadata_validity_secs(mut self, secs: i64) -> Self {
        self.metadata_validity_secs = secs;
        self
    }

    /// Sets the character set for byte-valued properties.
    #[must_use]
    pub const fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Sets the home directory for relative paths.
    #[must_use]
    pub fn with_home_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(dir.into());
        self
    }
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            entity_id: String::new(),
            base_url: "http://localhost:8080".to_string(),
            metadata_validity_secs: DEFAULT_METADATA_VALIDITY_SECS,
            certificate: None,
            future_certificate: None,
            private_key: None,
            private_key_password: None,
            charset: Charset::default(),
            home_dir: None,
        }
    }
}

impl fmt::Debug for AuthorityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorityConfig")
            .field("entity_id", &self.entity_id)
            .field("base_url", &self.base_url)
            .field("metadata_validity_secs", &self.metadata_validity_secs)
            .field("certificate", &self.certificate)
            .field("future_certificate", &self.future_certificate)
            .field("private_key", &self.private_key)
            .field(
                "private_key_password",
                &self.private_key_password.as_ref().map(|_| "<redacted>"),
            )
            .field("charset", &self.charset)
            .field("home_dir", &self.home_dir)
            .finish()
    }
}
