//! Entity metadata.
//!
//! - [`MetadataRepository`] - peer metadata, fetched and cached per entity
//! - [`MetadataExporter`] - this authority's own metadata, built from its
//!   registered roles
//! - [`to_xml`] - serialization of a descriptor

mod exporter;
mod repository;
mod xml;

pub use exporter::{MetadataExporter, OwnMetadata, UrlCustomizer};
pub use repository::{
    EntityMetadata, InMemoryMetadataRepository, MetadataRepository, MetadataSource, StaticMetadata,
};
pub use xml::to_xml;
