//! Watch TVs come and go on the local network

use std::time::Duration;

use futures::StreamExt;
use tracing_subscriber::EnvFilter;
use tvconnect::prelude::*;
use tvconnect::types::capability::names;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let manager = DiscoveryManager::new(ConnectConfig::default());
    manager
        .set_capability_filters(vec![CapabilityFilter::new([names::KEY_CONTROL_UP])])
        .await;

    let mut events = manager.subscribe().await;
    manager.start().await;
    println!("Discovering TVs for 30 seconds...");

    let deadline = tokio::time::sleep(Duration::from_secs(30));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            () = &mut deadline => break,
            event = events.next() => match event {
                Some(DiscoveryEvent::Added(device)) => {
                    println!("+ {} ({}) at {}", device.friendly_name, device.id, device.ip_address);
                }
                Some(DiscoveryEvent::Updated(device)) => {
                    println!("~ {} at {}", device.friendly_name, device.ip_address);
                }
                Some(DiscoveryEvent::Removed(device)) => {
                    println!("- {}", device.friendly_name);
                }
                Some(DiscoveryEvent::Failed(error)) => println!("! {error}"),
                None => break,
            },
        }
    }

    let devices = manager.compatible_devices().await;
    println!("Found {} compatible devices:", devices.len());
    for device in devices {
        let services: Vec<_> = device.services().iter().map(|s| s.service_id()).collect();
        println!("  - {} [{}]", device.friendly_name, services.join(", "));
    }

    manager.shutdown().await;
    Ok(())
}
