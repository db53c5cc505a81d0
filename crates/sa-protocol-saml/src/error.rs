//! SAML error types.
//!
//! Local faults ([`SamlError`]) abort the triggering operation. Protocol
//! conditions ([`ProtocolError`]) are typed so a caller can embed them in a
//! SAML error response. Per-attribute failures ([`AttributeError`]) never
//! leave the release engine; they are logged and the attribute is skipped.

use sa_core::EntityId;
use thiserror::Error;

use crate::types::{status_codes, sub_status_codes, Status, StatusCode, XsType};

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML authority errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// Configuration makes the operation impossible (no roles registered,
    /// missing certificate or private key).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The role already maps to an implementor.
    #[error("role {role} is already registered by {path}")]
    RoleAlreadyRegistered {
        /// The contested role.
        role: String,
        /// Path of the current implementor.
        path: String,
    },

    /// Deletion refused because something still depends on the target.
    #[error("cannot delete {target}: {reason}")]
    ProtectedDeletion {
        /// What was about to be deleted.
        target: String,
        /// What still depends on it.
        reason: String,
    },

    /// Key material for an entity could not be loaded.
    #[error("keys of {entity_id} unavailable: {reason}")]
    KeyUnavailable {
        /// The entity whose keys were requested.
        entity_id: EntityId,
        /// Loader failure.
        reason: String,
    },

    /// No metadata source is registered for the entity.
    #[error("unknown entity: {0}")]
    UnknownEntity(EntityId),

    /// The metadata source failed to produce a document.
    #[error("metadata of {entity_id} unavailable: {reason}")]
    MetadataUnavailable {
        /// The entity whose metadata was requested.
        entity_id: EntityId,
        /// Source failure.
        reason: String,
    },

    /// A registered role points at a path the directory cannot resolve.
    #[error("no implementor at {0}")]
    UnknownImplementor(String),

    /// Writing the metadata document failed.
    #[error("XML write error: {0}")]
    XmlWrite(String),

    /// Protocol-level condition.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl SamlError {
    /// Returns the SAML status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> &'static str {
        match self {
            Self::Protocol(err) => err.status_code(),
            Self::UnknownEntity(_) => status_codes::REQUESTER,
            _ => status_codes::RESPONDER,
        }
    }

    /// Returns a sub-status code if applicable.
    #[must_use]
    pub const fn sub_status_code(&self) -> Option<&'static str> {
        match self {
            Self::Protocol(err) => Some(err.sub_status_code()),
            Self::UnknownEntity(_) => Some(sub_status_codes::REQUEST_DENIED),
            _ => None,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Protocol(_) => 400,
            Self::UnknownEntity(_) => 404,
            Self::RoleAlreadyRegistered { .. } | Self::ProtectedDeletion { .. } => 409,
            Self::MetadataUnavailable { .. } => 502,
            _ => 500,
        }
    }

    /// Builds the SAML status to return for this error.
    #[must_use]
    pub fn to_status(&self) -> Status {
        let mut code = StatusCode::new(self.status_code());
        if let Some(sub) = self.sub_status_code() {
            code = code.with_sub_status(StatusCode::new(sub));
        }
        Status::new(code).with_message(self.to_string())
    }
}

impl From<sa_core::Error> for SamlError {
    fn from(err: sa_core::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XmlWrite(err.to_string())
    }
}

impl From<std::io::Error> for SamlError {
    fn from(err: std::io::Error) -> Self {
        Self::XmlWrite(err.to_string())
    }
}

/// Protocol-level conditions to report back to the requester.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The requested attribute consuming service index is not declared.
    #[error("{entity_id} declares no attribute consuming service with index {index}")]
    ResourceNotRecognized {
        /// The requesting entity.
        entity_id: EntityId,
        /// The requested index.
        index: u16,
    },
}

impl ProtocolError {
    /// Returns the top-level SAML status code.
    #[must_use]
    pub const fn status_code(&self) -> &'static str {
        match self {
            Self::ResourceNotRecognized { .. } => status_codes::REQUESTER,
        }
    }

    /// Returns the second-level SAML status code.
    #[must_use]
    pub const fn sub_status_code(&self) -> &'static str {
        match self {
            Self::ResourceNotRecognized { .. } => sub_status_codes::RESOURCE_NOT_RECOGNIZED,
        }
    }

    /// Builds the SAML status for an error response.
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            Self::ResourceNotRecognized { .. } => Status::resource_not_recognized(self.to_string()),
        }
    }
}

/// Why a single requested attribute was not released.
#[derive(Debug, Error)]
pub enum AttributeError {
    /// No catalog entry matches the requested format and name.
    #[error("attribute {name} (format {format}) not provided")]
    NotFound {
        /// Normalized name format.
        format: String,
        /// Requested name.
        name: String,
    },

    /// The subject has no value for the attribute.
    #[error("no value for attribute {0}")]
    Absent(String),

    /// The evaluator failed.
    #[error("evaluating {id} failed: {reason}")]
    Evaluation {
        /// Descriptor id.
        id: String,
        /// Evaluator failure.
        reason: String,
    },

    /// Bytes could not be decoded with the configured character set.
    #[error("decoding {id} failed: {source}")]
    Decode {
        /// Descriptor id.
        id: String,
        /// Decoder failure.
        source: sa_core::Error,
    },

    /// The value could not be converted to the declared type.
    #[error("converting {id} to xs:{xs_type} failed: {reason}")]
    Conversion {
        /// Descriptor id.
        id: String,
        /// Declared type.
        xs_type: XsType,
        /// Conversion failure.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_codes() {
        let err = SamlError::Configuration("no roles registered".to_string());
        assert_eq!(err.status_code(), status_codes::RESPONDER);
        assert_eq!(err.sub_status_code(), None);
        assert_eq!(err.http_status(), 500);

        let err = SamlError::RoleAlreadyRegistered {
            role: "idp".to_string(),
            path: "/idp".to_string(),
        };
        assert_eq!(err.http_status(), 409);
        assert_eq!(err.to_string(), "role idp is already registered by /idp");
    }

    #[test]
    fn resource_not_recognized_maps_to_requester_status() {
        let protocol = ProtocolError::ResourceNotRecognized {
            entity_id: EntityId::from("https://sp.example.org"),
            index: 5,
        };
        let status = protocol.status();
        assert_eq!(status.status_code.value, status_codes::REQUESTER);
        assert_eq!(
            status.status_code.sub_status_value(),
            Some(sub_status_codes::RESOURCE_NOT_RECOGNIZED)
        );

        let err = SamlError::from(protocol);
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.to_status().status_code, status.status_code);
    }

    #[test]
    fn core_errors_become_configuration_errors() {
        let err = SamlError::from(sa_core::Error::Config("bad".into()));
        assert!(matches!(err, SamlError::Configuration(_)));
    }
}
