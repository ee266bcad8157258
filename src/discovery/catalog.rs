use std::fmt;

use super::provider::{DiscoveryFilter, ProviderFactory};
use crate::service::ServiceBuilder;
use crate::types::ServiceAdvertisement;

/// Extra checks an advertisement must pass before an endpoint is built
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Admission {
    /// Every advertisement is admitted
    #[default]
    Always,
    /// Rejected until the advertisement carries a location descriptor
    RequiresLocationDescriptor,
    /// Admitted only if the model name equals `model_name` and the model
    /// description exists and does not mention `modern_marker`
    /// (both compared case-insensitively)
    LegacyTv {
        /// Exact model name of the legacy profile
        model_name: &'static str,
        /// Marker that identifies a newer platform answering on the same name
        modern_marker: &'static str,
    },
}

impl Admission {
    /// Check an advertisement
    #[must_use]
    pub fn admits(&self, ad: &ServiceAdvertisement) -> bool {
        match self {
            Self::Always => true,
            Self::RequiresLocationDescriptor => ad.location_xml.is_some(),
            Self::LegacyTv {
                model_name,
                modern_marker,
            } => {
                let name_matches = ad
                    .model_name
                    .as_deref()
                    .is_some_and(|name| name.eq_ignore_ascii_case(model_name));
                let description_matches = ad.model_description.as_deref().is_some_and(|desc| {
                    !desc
                        .to_ascii_uppercase()
                        .contains(&modern_marker.to_ascii_uppercase())
                });
                name_matches && description_matches
            }
        }
    }
}

/// A device-service type: how to find it and how to build its endpoints
#[derive(Clone)]
pub struct ServiceDescriptor {
    /// Protocol id
    pub id: &'static str,
    /// What the provider scans for
    pub filter: DiscoveryFilter,
    /// Gate applied to advertisements
    pub admission: Admission,
    /// Provider kind that discovers this type
    pub provider: ProviderFactory,
    /// Endpoint constructor
    pub build: ServiceBuilder,
}

impl ServiceDescriptor {
    /// Descriptor admitting every advertisement
    #[must_use]
    pub fn new(
        id: &'static str,
        service_filter: &str,
        provider: ProviderFactory,
        build: ServiceBuilder,
    ) -> Self {
        Self {
            id,
            filter: DiscoveryFilter::new(id, service_filter),
            admission: Admission::Always,
            provider,
            build,
        }
    }

    /// Set the admission gate
    #[must_use]
    pub fn with_admission(mut self, admission: Admission) -> Self {
        self.admission = admission;
        self
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("id", &self.id)
            .field("filter", &self.filter)
            .field("admission", &self.admission)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

/// Registered device-service types in registration order
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    descriptors: Vec<ServiceDescriptor>,
}

impl ServiceCatalog {
    /// Add a descriptor, replacing one with the same id
    pub fn insert(&mut self, descriptor: ServiceDescriptor) -> Option<ServiceDescriptor> {
        let previous = self.remove(descriptor.id);
        self.descriptors.push(descriptor);
        previous
    }

    /// Remove a descriptor
    pub fn remove(&mut self, id: &str) -> Option<ServiceDescriptor> {
        let pos = self.descriptors.iter().position(|d| d.id == id)?;
        Some(self.descriptors.remove(pos))
    }

    /// Descriptor for a protocol id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ServiceDescriptor> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    /// All descriptors
    pub fn iter(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.descriptors.iter()
    }

    /// Number of descriptors
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// True if nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
