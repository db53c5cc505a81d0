//! SAML 2.0 trust and attribute release for an authority.
//!
//! This crate provides the core of a SAML authority:
//!
//! - **Key management** - own signing key and peer verification keys, cached
//!   until the peer's metadata expires
//! - **Role registry** - which implementor acts as IdP, SP or attribute
//!   provider
//! - **Attribute release** - selection of the SP's attribute consuming
//!   service and computation of the released attributes
//! - **Metadata export** - this authority's `EntityDescriptor`, generated from
//!   its registered roles
//!
//! # Architecture
//!
//! - [`context`] - configuration, clock and change notifier shared by all
//!   components
//! - [`roles`] - role registry and implementor directory
//! - [`metadata`] - peer metadata repository and own metadata exporter
//! - [`keys`] - per-entity key cache
//! - [`signature`] - signing and verification contexts
//! - [`attribute`] - attribute catalog, service selection and release
//! - [`authority`] - the [`SamlAuthority`] facade
//! - [`endpoints`] - Axum handlers publishing metadata
//! - [`types`] - SAML data structures
//! - [`error`] - error types
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sa_protocol_saml::{BasicImplementor, Role, SamlAuthority};
//!
//! let authority = SamlAuthority::new(AuthorityConfig::from_env()?)?;
//! authority.register_implementor(Arc::new(BasicImplementor::new("/saml/idp", [Role::Idp])))?;
//! let metadata = authority.export_own_metadata()?;
//! ```
//!
//! # SAML Specifications
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [SAML 2.0 Metadata](https://docs.oasis-open.org/security/saml/v2.0/saml-metadata-2.0-os.pdf)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod attribute;
pub mod authority;
pub mod context;
pub mod endpoints;
pub mod error;
pub mod keys;
pub mod metadata;
pub mod roles;
pub mod signature;
pub mod types;

pub use attribute::{
    AttributeConsumingServiceSelector, AttributeDescriptor, AttributeEvaluator,
    AttributeProvider, AttributeReleaseEngine, SimpleAttributeProvider, Subject,
};
pub use authority::SamlAuthority;
pub use context::AuthorityContext;
pub use error::{AttributeError, ProtocolError, SamlError, SamlResult};
pub use keys::{KeyList, KeyManager};
pub use metadata::{
    EntityMetadata, InMemoryMetadataRepository, MetadataExporter, MetadataRepository,
    MetadataSource, OwnMetadata, StaticMetadata, UrlCustomizer,
};
pub use roles::{
    BasicImplementor, ImplementorDirectory, ImplementorPath, InMemoryDirectory, Role,
    RoleImplementor, RoleRegistry,
};
pub use signature::{Signature, SignatureContext, SignaturePurpose};
pub use types::*;
