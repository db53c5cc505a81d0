//! Attribute statement types.

use serde::{Deserialize, Serialize};

use super::xs::XsType;

/// SAML `AttributeStatement`.
///
/// Contains the attributes released about the subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeStatement {
    /// List of attributes.
    pub attributes: Vec<Attribute>,
}

impl AttributeStatement {
    /// Creates a new empty attribute statement.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attributes: Vec::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, attr: Attribute) -> Self {
        self.attributes.push(attr);
        self
    }

    /// Returns true if the statement carries no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Finds an attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// SAML Attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// The attribute name (typically a URI).
    pub name: String,

    /// The format of the attribute name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_format: Option<String>,

    /// A human-readable name for the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,

    /// The attribute values, in release order.
    pub values: Vec<AttributeValue>,
}

impl Attribute {
    /// Creates an attribute without values.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            name_format: None,
            friendly_name: None,
            values: Vec::new(),
        }
    }

    /// Sets the name format.
    #[must_use]
    pub fn with_name_format(mut self, format: impl Into<String>) -> Self {
        self.name_format = Some(format.into());
        self
    }

    /// Sets the friendly name.
    #[must_use]
    pub fn with_friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }

    /// Adds a value.
    #[must_use]
    pub fn with_value(mut self, value: AttributeValue) -> Self {
        self.values.push(value);
        self
    }

    /// Returns the lexical values.
    pub fn value_strings(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|v| v.value.as_str())
    }
}

/// A typed `AttributeValue` in canonical lexical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValue {
    /// The `xsi:type` of the value.
    pub xs_type: XsType,
    /// Lexical representation.
    pub value: String,
}

impl AttributeValue {
    /// Creates a typed value.
    #[must_use]
    pub fn new(xs_type: XsType, value: impl Into<String>) -> Self {
        Self {
            xs_type,
            value: value.into(),
        }
    }

    /// Creates an `xs:string` value.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::new(XsType::String, value)
    }
}
