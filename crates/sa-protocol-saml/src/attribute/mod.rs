//! Attribute release.
//!
//! An SP requests attributes through an attribute consuming service in its
//! metadata. [`AttributeConsumingServiceSelector`] picks the service,
//! [`AttributeCatalog`] matches its requested attributes against what the
//! local [`AttributeProvider`] offers, and [`AttributeReleaseEngine`] turns
//! the matches plus a [`Subject`] into an attribute statement.

mod catalog;
mod release;
mod selector;

pub use catalog::{
    AttributeCatalog, AttributeDescriptor, AttributeEvaluator, AttributeProvider, EvaluationError,
    SimpleAttributeProvider, Subject,
};
pub use release::AttributeReleaseEngine;
pub use selector::AttributeConsumingServiceSelector;
