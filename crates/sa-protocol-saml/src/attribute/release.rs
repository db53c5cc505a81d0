//! Attribute statement construction.

use sa_core::{Charset, EntityId};
use tracing::{debug, error, warn};

use super::catalog::{AttributeCatalog, AttributeDescriptor, AttributeProvider, Subject};
use super::selector::AttributeConsumingServiceSelector;
use crate::error::{AttributeError, ProtocolError};
use crate::types::{
    attrname_formats, Attribute, AttributeStatement, AttributeValue, EntityDescriptor,
    PropertyValue, RequestedAttribute, XsType,
};

/// Releases the attributes an SP requests and the local provider offers.
///
/// Each requested attribute is handled on its own: a catalog miss, an
/// absent value, a failing evaluator or a failed conversion skips that
/// attribute and release continues with the next one.
pub struct AttributeReleaseEngine<'a> {
    provider: &'a dyn AttributeProvider,
    charset: Charset,
}

impl<'a> AttributeReleaseEngine<'a> {
    /// Creates an engine for `provider`, decoding byte-valued string
    /// properties with `charset`.
    #[must_use]
    pub fn new(provider: &'a dyn AttributeProvider, charset: Charset) -> Self {
        Self { provider, charset }
    }

    /// Builds the attribute statement for `subject` as released to
    /// `requester`, whose metadata is `metadata`.
    ///
    /// Returns `Ok(None)` when nothing is released: no service was requested
    /// and none is declared, or no requested attribute produced a value.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ResourceNotRecognized`] if
    /// `requested_index` names a service the SP does not declare.
    pub fn release(
        &self,
        requester: &EntityId,
        requested_index: Option<u16>,
        subject: &dyn Subject,
        metadata: &EntityDescriptor,
    ) -> Result<Option<AttributeStatement>, ProtocolError> {
        let Some(service) = AttributeConsumingServiceSelector::select(metadata, requested_index)
        else {
            return match requested_index {
                None => {
                    debug!(entity_id = %requester, "no attribute consuming service, nothing to release");
                    Ok(None)
                }
                Some(index) => {
                    error!(entity_id = %requester, index, "attribute consuming service not found");
                    Err(ProtocolError::ResourceNotRecognized {
                        entity_id: requester.clone(),
                        index,
                    })
                }
            };
        };

        let catalog = AttributeCatalog::from_provider(self.provider);
        let mut statement = AttributeStatement::new();

        for requested in &service.requested_attributes {
            match self.release_one(&catalog, requested, subject, requester) {
                Ok(attribute) => statement.attributes.push(attribute),
                Err(err @ AttributeError::NotFound { .. }) => {
                    error!(entity_id = %requester, error = %err, "requested attribute not found");
                }
                Err(err @ AttributeError::Absent(_)) => {
                    debug!(entity_id = %requester, error = %err, "attribute skipped");
                }
                Err(err) => {
                    warn!(entity_id = %requester, error = %err, "attribute skipped");
                }
            }
        }

        if statement.is_empty() {
            debug!(entity_id = %requester, service = service.index, "no attributes released");
            return Ok(None);
        }
        debug!(
            entity_id = %requester,
            service = service.index,
            count = statement.attributes.len(),
            "attributes released"
        );
        Ok(Some(statement))
    }

    fn release_one(
        &self,
        catalog: &AttributeCatalog,
        requested: &RequestedAttribute,
        subject: &dyn Subject,
        requester: &EntityId,
    ) -> Result<Attribute, AttributeError> {
        let format = attrname_formats::normalize(
            requested
                .name_format
                .as_deref()
                .unwrap_or(attrname_formats::UNSPECIFIED),
        );
        let descriptor =
            catalog
                .lookup(format, &requested.name)
                .ok_or_else(|| AttributeError::NotFound {
                    format: format.to_string(),
                    name: requested.name.clone(),
                })?;

        let raw = self
            .raw_value(descriptor, subject, requester)?
            .ok_or_else(|| AttributeError::Absent(descriptor.id.clone()))?;
        let raw = self.decode(descriptor, raw)?;

        let values = descriptor
            .xs_type
            .convert(&raw)
            .map_err(|e| AttributeError::Conversion {
                id: descriptor.id.clone(),
                xs_type: descriptor.xs_type,
                reason: e.reason,
            })?;

        let friendly_name = requested
            .friendly_name
            .clone()
            .unwrap_or_else(|| descriptor.id.clone());

        Ok(Attribute {
            name: descriptor.title.clone(),
            name_format: Some(descriptor.format.clone()),
            friendly_name: Some(friendly_name),
            values: values
                .into_iter()
                .map(|v| AttributeValue::new(descriptor.xs_type, v))
                .collect(),
        })
    }

    fn raw_value(
        &self,
        descriptor: &AttributeDescriptor,
        subject: &dyn Subject,
        requester: &EntityId,
    ) -> Result<Option<PropertyValue>, AttributeError> {
        match &descriptor.evaluator {
            None => Ok(subject.property(&descriptor.id)),
            Some(evaluator) => evaluator
                .evaluate(subject, descriptor, requester)
                .map_err(|e| AttributeError::Evaluation {
                    id: descriptor.id.clone(),
                    reason: e.to_string(),
                }),
        }
    }

    /// Byte values of string attributes are text stored undecoded.
    fn decode(
        &self,
        descriptor: &AttributeDescriptor,
        value: PropertyValue,
    ) -> Result<PropertyValue, AttributeError> {
        if descriptor.xs_type != XsType::String {
            return Ok(value);
        }
        decode_text(value, self.charset).map_err(|source| AttributeError::Decode {
            id: descriptor.id.clone(),
            source,
        })
    }
}

fn decode_text(value: PropertyValue, charset: Charset) -> sa_core::Result<PropertyValue> {
    match value {
        PropertyValue::Bytes(bytes) => charset.decode(&bytes).map(PropertyValue::Text),
        PropertyValue::List(items) => items
            .into_iter()
            .map(|item| decode_text(item, charset))
            .collect::<sa_core::Result<Vec<_>>>()
            .map(PropertyValue::List),
        other => Ok(other),
    }
}
