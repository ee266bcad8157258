use std::collections::HashMap;
use std::net::IpAddr;

/// A single service announcement produced by a discovery provider
///
/// Immutable once emitted. A newer advertisement with the same `uuid` and
/// `service_id` supersedes it.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceAdvertisement {
    /// Protocol id of the announced service (e.g. "Vizio", "AndroidTV")
    pub service_id: String,

    /// Stable identifier of the physical service instance
    pub uuid: String,

    /// Address the service answered from
    pub ip_address: IpAddr,

    /// Service port
    pub port: u16,

    /// Human-readable name (e.g. "Living Room TV")
    pub friendly_name: String,

    /// Model name reported by the device
    pub model_name: Option<String>,

    /// Model description reported by the device
    pub model_description: Option<String>,

    /// Manufacturer reported by the device
    pub manufacturer: Option<String>,

    /// Location descriptor (device description document) for protocols that use one
    pub location_xml: Option<String>,

    /// Remaining protocol specific metadata (TXT records, headers)
    pub metadata: HashMap<String, String>,
}

impl ServiceAdvertisement {
    /// Create an advertisement with the mandatory fields
    pub fn new(
        service_id: impl Into<String>,
        uuid: impl Into<String>,
        ip_address: IpAddr,
        friendly_name: impl Into<String>,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            uuid: uuid.into(),
            ip_address,
            port: 0,
            friendly_name: friendly_name.into(),
            model_name: None,
            model_description: None,
            manufacturer: None,
            location_xml: None,
            metadata: HashMap::new(),
        }
    }

    /// Set the service port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set model name and description
    #[must_use]
    pub fn with_model(
        mut self,
        name: impl Into<String>,
        description: Option<impl Into<String>>,
    ) -> Self {
        self.model_name = Some(name.into());
        self.model_description = description.map(Into::into);
        self
    }

    /// Set the manufacturer
    #[must_use]
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Set the location descriptor
    #[must_use]
    pub fn with_location_xml(mut self, xml: impl Into<String>) -> Self {
        self.location_xml = Some(xml.into());
        self
    }
}
