use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::{ConnectError, Result};
use crate::types::ServiceAdvertisement;

/// What a provider should scan for on behalf of one device-service type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscoveryFilter {
    /// Protocol id stamped on advertisements matching this filter
    pub service_id: String,
    /// Transport specific query (an mDNS service type, an SSDP search target)
    pub service_filter: String,
}

impl DiscoveryFilter {
    /// Create a filter
    pub fn new(service_id: impl Into<String>, service_filter: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            service_filter: service_filter.into(),
        }
    }
}

/// Events a provider emits
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// A service appeared or changed
    ServiceFound(ServiceAdvertisement),
    /// A service went away
    ServiceLost(ServiceAdvertisement),
    /// The scan failed
    ScanFailed(ConnectError),
}

/// Channel a provider reports into
pub type ProviderSink = mpsc::UnboundedSender<ProviderEvent>;

/// One discovery transport (mDNS, SSDP, ...)
///
/// Several device-service types may share a provider, each contributing a
/// filter. Methods must not block; scanning happens on tasks the provider
/// spawns.
pub trait DiscoveryProvider: Send {
    /// Begin scanning for every filter
    fn start(&mut self);

    /// Stop scanning; found services are kept
    fn stop(&mut self);

    /// Stop and start again
    fn restart(&mut self) {
        self.stop();
        self.start();
    }

    /// Stop and forget every found service
    fn reset(&mut self);

    /// Add a filter
    fn add_filter(&mut self, filter: DiscoveryFilter);

    /// Remove a filter
    fn remove_filter(&mut self, filter: &DiscoveryFilter);

    /// True if no filters remain
    fn is_empty(&self) -> bool;
}

type BuildFn = dyn Fn(ProviderSink) -> Result<Box<dyn DiscoveryProvider>> + Send + Sync;

/// Constructs a provider type on demand
///
/// Two factories for the same provider type share one instance, matched by
/// [`TypeId`].
#[derive(Clone)]
pub struct ProviderFactory {
    type_id: TypeId,
    name: &'static str,
    build: Arc<BuildFn>,
}

impl ProviderFactory {
    /// Factory for provider type `P`
    pub fn of<P, F>(name: &'static str, build: F) -> Self
    where
        P: DiscoveryProvider + 'static,
        F: Fn(ProviderSink) -> Result<Box<dyn DiscoveryProvider>> + Send + Sync + 'static,
    {
        Self {
            type_id: TypeId::of::<P>(),
            name,
            build: Arc::new(build),
        }
    }

    /// Provider type identity
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Provider name for logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn build(&self, sink: ProviderSink) -> Result<Box<dyn DiscoveryProvider>> {
        (self.build)(sink)
    }
}

impl fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderFactory")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
