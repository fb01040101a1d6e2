//! BLE Scanner Module
//!
//! Finds the configured car among advertising peripherals.

use crate::error::{RemoteError, Result};
use crate::infrastructure::bluetooth::protocol;
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use std::time::Duration;
use tracing::{debug, info, warn};

const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// BLE scanner bound to the first local adapter
pub struct BleScanner {
    adapter: Adapter,
}

impl BleScanner {
    /// Open the first Bluetooth adapter on this machine
    pub async fn new() -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|e| RemoteError::ConnectionFailure(format!("Bluetooth manager: {}", e)))?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| RemoteError::ConnectionFailure(format!("Bluetooth adapters: {}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::ConnectionFailure("No Bluetooth adapters found".into()))?;

        Ok(Self { adapter })
    }

    /// Scan until a peripheral matching `address` shows up or `timeout` passes
    pub async fn find(&self, address: &str, timeout: Duration) -> Result<Peripheral> {
        info!("Scanning for {} ...", address);
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| RemoteError::ConnectionFailure(format!("start scan: {}", e)))?;

        let found = tokio::time::timeout(timeout, self.poll_until_found(address)).await;

        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        match found {
            Ok(peripheral) => Ok(peripheral),
            Err(_) => Err(RemoteError::DeviceNotFound {
                address: address.to_string(),
                timeout,
            }),
        }
    }

    async fn poll_until_found(&self, address: &str) -> Peripheral {
        loop {
            match self.adapter.peripherals().await {
                Ok(peripherals) => {
                    for p in peripherals {
                        let id = format!("{:?}", p.id());
                        if protocol::matches_address(address, &p.address().to_string(), &id) {
                            let name = p
                                .properties()
                                .await
                                .ok()
                                .flatten()
                                .and_then(|props| props.local_name)
                                .unwrap_or_else(|| "Unknown".to_string());
                            info!("Found device {} ({})", name, address);
                            return p;
                        }
                    }
                }
                Err(e) => debug!("Listing peripherals failed: {}", e),
            }
            tokio::time::sleep(SCAN_POLL_INTERVAL).await;
        }
    }
}
