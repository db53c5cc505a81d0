//! Attribute consuming service selection.

use crate::types::{AttributeConsumingService, EntityDescriptor};

/// Picks the effective attribute consuming service of an SP.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeConsumingServiceSelector;

impl AttributeConsumingServiceSelector {
    /// Selects a service from the first `SPSSODescriptor` that yields one.
    ///
    /// With an index, only the service carrying that index qualifies.
    /// Without one the order is: a service with `isDefault="true"`, else the
    /// first service without any `isDefault`, else the first service. An
    /// explicit `isDefault="false"` ranks below an absent attribute.
    #[must_use]
    pub fn select(
        metadata: &EntityDescriptor,
        requested_index: Option<u16>,
    ) -> Option<&AttributeConsumingService> {
        metadata
            .sp_sso_descriptors()
            .filter_map(|sp| sp.attribute_consuming_services())
            .find_map(|services| Self::select_from(services, requested_index))
    }

    /// Applies the selection rules to one descriptor's services.
    #[must_use]
    pub fn select_from(
        services: &[AttributeConsumingService],
        requested_index: Option<u16>,
    ) -> Option<&AttributeConsumingService> {
        match requested_index {
            Some(index) => services.iter().find(|s| s.index == index),
            None => services
                .iter()
                .find(|s| s.is_default == Some(true))
                .or_else(|| services.iter().find(|s| s.is_default.is_none()))
                .or_else(|| services.first()),
        }
    }
}
