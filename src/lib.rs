//! # tvconnect
//!
//! Discovery and PIN pairing for networked TVs and media devices.
//!
//! ## Features
//!
//! - Device discovery via mDNS, with pluggable providers for other transports
//! - One device per physical TV, however many protocols it answers on
//! - Capability filters that keep a live set of compatible devices
//! - PIN pairing over HTTPS with certificate pinning, and key commands
//!
//! ## Example
//!
//! ```rust,no_run
//! use tvconnect::{ConnectConfig, DeviceService, DiscoveryEvent, DiscoveryManager};
//!
//! # async fn example() -> Result<(), tvconnect::ConnectError> {
//! let manager = DiscoveryManager::new(ConnectConfig::default());
//! let mut events = manager.subscribe().await;
//! manager.start().await;
//!
//! while let Some(DiscoveryEvent::Added(device)) = events.recv().await {
//!     if let Some(service) = device.service(tvconnect::service::PIN_PAIRING_ID) {
//!         service.connect().await?;
//!         // The TV now shows a PIN
//!         service.submit_pairing_key("1234").await?;
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Orchestration**: `DiscoveryManager` runs providers and follows the network
//! - **Aggregation**: `DeviceRegistry` folds advertisements into devices
//! - **Endpoints**: `DeviceService` implementations drive pairing and commands
//! - **Delivery**: every callback runs on one dispatcher task, in order

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Error types
pub mod error;
/// Listener callbacks and their delivery
pub mod events;
/// Core types
pub mod types;

/// Testing utilities
pub mod testing;

pub mod discovery;
pub mod net;
pub mod protocol;
pub mod service;
pub mod store;

// Re-exports
pub use discovery::{DeviceRegistry, DiscoveryManager, DiscoveryState, ServiceDescriptor};
pub use error::{ConnectError, PairingErrorKind, Result};
pub use events::{DiscoveryEvent, DiscoveryListener, DiscoveryStream, ListenerId};
pub use net::{HostPlatform, NetworkPlatform, NetworkState};
pub use service::{
    ConnectOutcome, DeviceService, KeyCode, KeyControl, PairingState, ServiceEvent,
    ServiceListener,
};
pub use store::{DeviceStore, FileStore, MemoryStore, StorageError};
pub use types::{
    CapabilityFilter, ConnectConfig, Device, DeviceKey, IdentityMode, PairingType,
    ServiceAdvertisement, ServiceConfig,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::{
        CapabilityFilter, ConnectConfig, ConnectError, ConnectOutcome, Device, DeviceService,
        DiscoveryEvent, DiscoveryListener, DiscoveryManager, KeyCode, KeyControl,
        PairingState, ServiceListener,
    };
}
