//! mDNS / DNS-SD discovery provider

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::provider::{
    DiscoveryFilter, DiscoveryProvider, ProviderEvent, ProviderFactory, ProviderSink,
};
use crate::error::ConnectError;
use crate::types::ServiceAdvertisement;

/// TXT keys that carry a stable instance id, in preference order
const ID_KEYS: &[&str] = &["id", "uuid", "deviceid", "bt"];
const MODEL_KEYS: &[&str] = &["md", "model"];
const MANUFACTURER_KEYS: &[&str] = &["mf", "manufacturer"];

type FoundServices = Arc<Mutex<HashMap<String, ServiceAdvertisement>>>;

struct Browse {
    filter: DiscoveryFilter,
    cancel: CancellationToken,
}

/// Browses one DNS-SD service type per filter
///
/// Resolved instances are reported as `ServiceFound` and remembered by full
/// name, so a later removal can be reported with the same advertisement.
pub struct ZeroconfProvider {
    sink: ProviderSink,
    filters: Vec<DiscoveryFilter>,
    daemon: Option<ServiceDaemon>,
    browses: Vec<Browse>,
    found: FoundServices,
}

impl ZeroconfProvider {
    /// Create an idle provider
    #[must_use]
    pub fn new(sink: ProviderSink) -> Self {
        Self {
            sink,
            filters: Vec::new(),
            daemon: None,
            browses: Vec::new(),
            found: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Factory shared by every mDNS device-service type
    #[must_use]
    pub fn factory() -> ProviderFactory {
        ProviderFactory::of::<Self, _>("zeroconf", |sink| Ok(Box::new(Self::new(sink))))
    }

    /// Whether the daemon is running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.daemon.is_some()
    }

    fn report_failure(&self, message: String) {
        warn!(%message, "mDNS scan failed");
        let _ = self
            .sink
            .send(ProviderEvent::ScanFailed(ConnectError::DiscoveryFailed {
                message,
            }));
    }

    fn browse(&mut self, filter: &DiscoveryFilter) {
        let Some(daemon) = &self.daemon else {
            return;
        };
        let receiver = match daemon.browse(&filter.service_filter) {
            Ok(receiver) => receiver,
            Err(e) => {
                self.report_failure(format!("Failed to browse {}: {e}", filter.service_filter));
                return;
            }
        };
        debug!(service_type = %filter.service_filter, "Browsing");

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let task_filter = filter.clone();
        let sink = self.sink.clone();
        let found = Arc::clone(&self.found);

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    () = task_cancel.cancelled() => break,
                    event = receiver.recv_async() => match event {
                        Ok(event) => event,
                        // Daemon shut down
                        Err(_) => break,
                    },
                };

                let event = match event {
                    ServiceEvent::ServiceResolved(info) => {
                        let Some(ad) = advertisement_from(&task_filter, &info) else {
                            debug!(name = %info.get_fullname(), "Resolved service without address");
                            continue;
                        };
                        found
                            .lock()
                            .insert(info.get_fullname().to_string(), ad.clone());
                        ProviderEvent::ServiceFound(ad)
                    }
                    ServiceEvent::ServiceRemoved(_, fullname) => {
                        let Some(ad) = found.lock().remove(&fullname) else {
                            continue;
                        };
                        ProviderEvent::ServiceLost(ad)
                    }
                    _ => continue,
                };

                if sink.send(event).is_err() {
                    break;
                }
            }
        });

        self.browses.push(Browse {
            filter: filter.clone(),
            cancel,
        });
    }

    fn stop_browse(&mut self, filter: &DiscoveryFilter) {
        if let Some(pos) = self.browses.iter().position(|b| &b.filter == filter) {
            let browse = self.browses.remove(pos);
            browse.cancel.cancel();
            if let Some(daemon) = &self.daemon {
                if let Err(e) = daemon.stop_browse(&filter.service_filter) {
                    debug!(error = %e, "stop_browse failed");
                }
            }
        }
    }
}

impl DiscoveryProvider for ZeroconfProvider {
    fn start(&mut self) {
        if self.daemon.is_some() {
            return;
        }
        match ServiceDaemon::new() {
            Ok(daemon) => self.daemon = Some(daemon),
            Err(e) => {
                self.report_failure(format!("Failed to create mDNS daemon: {e}"));
                return;
            }
        }

        info!(filters = self.filters.len(), "mDNS discovery started");
        for filter in self.filters.clone() {
            self.browse(&filter);
        }
    }

    fn stop(&mut self) {
        let Some(daemon) = self.daemon.take() else {
            return;
        };
        for browse in self.browses.drain(..) {
            browse.cancel.cancel();
            let _ = daemon.stop_browse(&browse.filter.service_filter);
        }
        if let Err(e) = daemon.shutdown() {
            debug!(error = %e, "mDNS daemon shutdown failed");
        }
        info!("mDNS discovery stopped");
    }

    fn reset(&mut self) {
        self.stop();
        self.found.lock().clear();
    }

    fn add_filter(&mut self, filter: DiscoveryFilter) {
        if !self.filters.contains(&filter) {
            self.filters.push(filter);
        }
    }

    fn remove_filter(&mut self, filter: &DiscoveryFilter) {
        self.filters.retain(|f| f != filter);
        self.stop_browse(filter);
        self.found
            .lock()
            .retain(|_, ad| ad.service_id != filter.service_id);
    }

    fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Drop for ZeroconfProvider {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Turn a resolved DNS-SD instance into an advertisement for `filter`
///
/// Returns `None` if the instance resolved without an address.
pub(crate) fn advertisement_from(
    filter: &DiscoveryFilter,
    info: &ServiceInfo,
) -> Option<ServiceAdvertisement> {
    let addresses = info.get_addresses();
    let ip: IpAddr = addresses
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addresses.iter().next())
        .copied()?;

    let fullname = info.get_fullname();
    let txt: HashMap<String, String> = info
        .get_properties()
        .iter()
        .map(|prop| (prop.key().to_string(), prop.val_str().to_string()))
        .collect();
    let lookup = |keys: &[&str]| {
        keys.iter()
            .find_map(|key| txt.get(*key).filter(|v| !v.is_empty()).cloned())
    };

    let uuid = lookup(ID_KEYS).unwrap_or_else(|| fullname.to_string());
    let friendly_name = instance_name(fullname, &filter.service_filter);

    let mut ad = ServiceAdvertisement::new(filter.service_id.clone(), uuid, ip, friendly_name)
        .with_port(info.get_port());
    if let Some(model) = lookup(MODEL_KEYS) {
        ad = ad.with_model(model, None::<String>);
    }
    if let Some(manufacturer) = lookup(MANUFACTURER_KEYS) {
        ad = ad.with_manufacturer(manufacturer);
    }
    ad.metadata = txt;
    Some(ad)
}

/// Instance part of a DNS-SD full name
fn instance_name(fullname: &str, service_type: &str) -> String {
    let suffix = format!(".{}", service_type.trim_start_matches('.'));
    fullname
        .strip_suffix(&suffix)
        .or_else(|| fullname.split('.').next())
        .unwrap_or(fullname)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIZIO_TYPE: &str = "_viziocast._tcp.local.";

    fn filter() -> DiscoveryFilter {
        DiscoveryFilter::new("Vizio", VIZIO_TYPE)
    }

    #[test]
    fn test_instance_name() {
        assert_eq!(
            instance_name("Living Room._viziocast._tcp.local.", VIZIO_TYPE),
            "Living Room"
        );
        assert_eq!(instance_name("Den.other._tcp.local.", VIZIO_TYPE), "Den");
    }

    #[test]
    fn test_advertisement_from_txt() {
        let info = ServiceInfo::new(
            VIZIO_TYPE,
            "Living Room",
            "vizio-tv.local.",
            "192.168.1.20",
            7345,
            &[("id", "abc-123"), ("md", "P65-F1"), ("mf", "VIZIO")][..],
        )
        .unwrap();

        let ad = advertisement_from(&filter(), &info).unwrap();
        assert_eq!(ad.service_id, "Vizio");
        assert_eq!(ad.uuid, "abc-123");
        assert_eq!(ad.friendly_name, "Living Room");
        assert_eq!(ad.port, 7345);
        assert_eq!(ad.model_name.as_deref(), Some("P65-F1"));
        assert_eq!(ad.manufacturer.as_deref(), Some("VIZIO"));
        assert_eq!(ad.ip_address, "192.168.1.20".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_advertisement_uuid_falls_back_to_fullname() {
        let info = ServiceInfo::new(
            VIZIO_TYPE,
            "Kitchen",
            "kitchen.local.",
            "10.0.0.5",
            7345,
            None::<HashMap<String, String>>,
        )
        .unwrap();

        let ad = advertisement_from(&filter(), &info).unwrap();
        assert_eq!(ad.uuid, "Kitchen._viziocast._tcp.local.");
        assert!(ad.model_name.is_none());
    }

    #[test]
    fn test_filters() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut provider = ZeroconfProvider::new(tx);
        assert!(provider.is_empty());

        provider.add_filter(filter());
        provider.add_filter(filter());
        assert_eq!(provider.filters.len(), 1);

        provider.remove_filter(&filter());
        assert!(provider.is_empty());
        assert!(!provider.is_running());
    }
}
