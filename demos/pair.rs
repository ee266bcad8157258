//! Pair with the first PIN-pairing TV found, then raise its volume
//!
//! Credentials are kept in `tvconnect-devices.json`, so a second run
//! connects without a PIN.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use tvconnect::prelude::*;
use tvconnect::service::PIN_PAIRING_ID;
use tvconnect::FileStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let store = FileStore::new("tvconnect-devices.json").await?;
    let manager = DiscoveryManager::builder()
        .config(
            ConnectConfig::builder()
                .client_device_name("tvconnect demo")
                .request_timeout(Duration::from_secs(5))
                .build(),
        )
        .store(Arc::new(store))
        .build();

    let mut events = manager.subscribe().await;
    manager.start().await;
    println!("Waiting for a TV...");

    let service = loop {
        let Some(event) = events.next().await else {
            return Err("discovery ended".into());
        };
        if let Some(service) = event.device().and_then(|d| d.service(PIN_PAIRING_ID)) {
            println!("Using {}", service.advertisement().friendly_name);
            break service;
        }
    };

    if service.connect().await? == ConnectOutcome::PairingRequired {
        println!("Enter the PIN shown on the TV:");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let pin = lines.next_line().await?.unwrap_or_default();
        if let Err(e) = service.submit_pairing_key(pin.trim()).await {
            service.cancel_pairing().await;
            return Err(e.into());
        }
    }
    println!("Paired: {}", service.state());

    let keys = service.key_control().ok_or("no key control")?;
    keys.volume_up().await?;
    println!("Volume up sent");

    // Let the stored token reach disk
    tokio::time::sleep(Duration::from_millis(200)).await;
    manager.shutdown().await;
    Ok(())
}
