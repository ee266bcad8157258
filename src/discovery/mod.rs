//! Device discovery
//!
//! Providers report service advertisements, the [`DeviceRegistry`] folds them
//! into devices, and the [`DiscoveryManager`] ties both to the network
//! lifecycle.
//!
//! # Example
//!
//! ```rust,no_run
//! use tvconnect::discovery::DiscoveryManager;
//! use tvconnect::{CapabilityFilter, ConnectConfig, DiscoveryEvent};
//!
//! # async fn example() {
//! let manager = DiscoveryManager::new(ConnectConfig::default());
//! manager
//!     .set_capability_filters(vec![CapabilityFilter::new(["KeyControl.Up"])])
//!     .await;
//!
//! let mut events = manager.subscribe().await;
//! manager.start().await;
//!
//! while let Some(event) = events.recv().await {
//!     if let DiscoveryEvent::Added(device) = event {
//!         println!("Found {} at {}", device.friendly_name, device.ip_address);
//!     }
//! }
//! # }
//! ```

mod catalog;
mod filter;
mod manager;
mod provider;
mod registry;
mod zeroconf;

#[cfg(test)]
mod tests;

pub use catalog::{Admission, ServiceCatalog, ServiceDescriptor};
pub use filter::compatible;
pub use manager::{
    ANDROID_TV_SERVICE_TYPE, ANDROID_TV_V2_SERVICE_TYPE, DiscoveryManager,
    DiscoveryManagerBuilder, DiscoveryState, VIZIO_SERVICE_TYPE, default_descriptors,
};
pub use provider::{
    DiscoveryFilter, DiscoveryProvider, ProviderEvent, ProviderFactory, ProviderSink,
};
pub use registry::DeviceRegistry;
pub use zeroconf::ZeroconfProvider;
