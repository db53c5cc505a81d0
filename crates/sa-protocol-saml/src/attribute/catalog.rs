//! Locally provided attributes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use sa_core::EntityId;

use crate::types::{attrname_formats, Attribute, PropertyValue, XsType};

/// Error returned by an [`AttributeEvaluator`].
pub type EvaluationError = Box<dyn std::error::Error + Send + Sync>;

/// Source of released attribute values.
pub trait Subject {
    /// Returns the named property, or `None` if the subject lacks it.
    fn property(&self, name: &str) -> Option<PropertyValue>;
}

impl Subject for HashMap<String, PropertyValue> {
    fn property(&self, name: &str) -> Option<PropertyValue> {
        self.get(name).cloned()
    }
}

impl<S: Subject + ?Sized> Subject for &S {
    fn property(&self, name: &str) -> Option<PropertyValue> {
        (**self).property(name)
    }
}

/// Computes an attribute value instead of reading a subject property.
pub trait AttributeEvaluator: Send + Sync {
    /// Evaluates the attribute for `subject` as released to `requester`.
    ///
    /// # Errors
    ///
    /// Any error makes the release skip this attribute.
    fn evaluate(
        &self,
        subject: &dyn Subject,
        descriptor: &AttributeDescriptor,
        requester: &EntityId,
    ) -> Result<Option<PropertyValue>, EvaluationError>;
}

impl<F> AttributeEvaluator for F
where
    F: Fn(&dyn Subject, &AttributeDescriptor, &EntityId) -> Result<Option<PropertyValue>, EvaluationError>
        + Send
        + Sync,
{
    fn evaluate(
        &self,
        subject: &dyn Subject,
        descriptor: &AttributeDescriptor,
        requester: &EntityId,
    ) -> Result<Option<PropertyValue>, EvaluationError> {
        self(subject, descriptor, requester)
    }
}

/// An attribute this authority can release.
#[derive(Clone)]
pub struct AttributeDescriptor {
    /// Local identifier; the subject property read when there is no
    /// evaluator, and the default `FriendlyName`.
    pub id: String,
    /// `NameFormat` URI.
    pub format: String,
    /// `Name`.
    pub title: String,
    /// Type of the released values.
    pub xs_type: XsType,
    /// Optional value computation.
    pub evaluator: Option<Arc<dyn AttributeEvaluator>>,
}

impl AttributeDescriptor {
    /// Creates a descriptor without evaluator. Short format names such as
    /// `uri` are expanded.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        format: impl AsRef<str>,
        title: impl Into<String>,
        xs_type: XsType,
    ) -> Self {
        Self {
            id: id.into(),
            format: attrname_formats::normalize(format.as_ref()).to_string(),
            title: title.into(),
            xs_type,
            evaluator: None,
        }
    }

    /// Sets the evaluator.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Arc<dyn AttributeEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Returns the attribute as advertised in metadata.
    #[must_use]
    pub fn metadata_attribute(&self) -> Attribute {
        Attribute::new(self.title.clone())
            .with_name_format(self.format.clone())
            .with_friendly_name(self.id.clone())
    }
}

impl fmt::Debug for AttributeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeDescriptor")
            .field("id", &self.id)
            .field("format", &self.format)
            .field("title", &self.title)
            .field("xs_type", &self.xs_type)
            .field("evaluator", &self.evaluator.is_some())
            .finish()
    }
}

/// Capability of producing attributes.
pub trait AttributeProvider: Send + Sync {
    /// Returns the attributes this provider can release.
    fn attributes(&self) -> Vec<AttributeDescriptor>;

    /// Returns the attributes to advertise in metadata.
    fn metadata_attributes(&self) -> Vec<Attribute> {
        self.attributes()
            .iter()
            .map(AttributeDescriptor::metadata_attribute)
            .collect()
    }
}

/// An [`AttributeProvider`] over a fixed descriptor list.
#[derive(Debug, Clone, Default)]
pub struct SimpleAttributeProvider {
    descriptors: Vec<AttributeDescriptor>,
}

impl SimpleAttributeProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a descriptor.
    #[must_use]
    pub fn with_attribute(mut self, descriptor: AttributeDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }
}

impl AttributeProvider for SimpleAttributeProvider {
    fn attributes(&self) -> Vec<AttributeDescriptor> {
        self.descriptors.clone()
    }
}

/// Provided attributes keyed by `(format, title)`.
///
/// When two descriptors share a key the later one wins.
#[derive(Debug, Default)]
pub struct AttributeCatalog {
    entries: HashMap<(String, String), AttributeDescriptor>,
}

impl AttributeCatalog {
    /// Builds the catalog of `provider`.
    #[must_use]
    pub fn from_provider(provider: &dyn AttributeProvider) -> Self {
        Self::from_descriptors(provider.attributes())
    }

    /// Builds a catalog from descriptors.
    #[must_use]
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = AttributeDescriptor>) -> Self {
        let entries = descriptors
            .into_iter()
            .map(|d| ((d.format.clone(), d.title.clone()), d))
            .collect();
        Self { entries }
    }

    /// Looks up a descriptor. `format` must already be normalized.
    #[must_use]
    pub fn lookup(&self, format: &str, title: &str) -> Option<&AttributeDescriptor> {
        self.entries.get(&(format.to_string(), title.to_string()))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
