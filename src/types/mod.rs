//! Core types module

mod advertisement;
pub mod capability;
mod config;
mod device;
mod service_config;

#[cfg(test)]
mod tests;

pub use advertisement::ServiceAdvertisement;
pub use capability::CapabilityFilter;
pub use config::{ConnectConfig, ConnectConfigBuilder, DEFAULT_PAIRING_PORT};
pub use device::{Device, DeviceKey, IdentityMode};
pub use service_config::{PairingType, ServiceConfig};
