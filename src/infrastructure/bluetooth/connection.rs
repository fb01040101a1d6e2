//! BLE Connection Module
//!
//! Connects to the car, resolves its characteristics, and exposes the two
//! operations the control and battery loops need.

use crate::domain::models::BatteryLevel;
use crate::domain::settings::Settings;
use crate::domain::vehicle::DriveCommand;
use crate::error::{RemoteError, Result};
use crate::infrastructure::bluetooth::{protocol, scanner::BleScanner};
use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Operations on an open link to the car.
///
/// Both loops share one link by reference; only the session disconnects it.
#[async_trait]
pub trait VehicleLink: Send + Sync {
    /// Write one drive command to the command characteristic.
    async fn write_command(&self, command: &DriveCommand) -> Result<()>;

    /// Read the battery characteristic.
    async fn read_battery(&self) -> Result<BatteryLevel>;

    async fn is_connected(&self) -> bool;

    async fn disconnect(&self) -> Result<()>;
}

#[async_trait]
impl<T: VehicleLink + ?Sized> VehicleLink for Arc<T> {
    async fn write_command(&self, command: &DriveCommand) -> Result<()> {
        (**self).write_command(command).await
    }

    async fn read_battery(&self) -> Result<BatteryLevel> {
        (**self).read_battery().await
    }

    async fn is_connected(&self) -> bool {
        (**self).is_connected().await
    }

    async fn disconnect(&self) -> Result<()> {
        (**self).disconnect().await
    }
}

/// Configuration for connection behavior
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Peripheral address or platform id
    pub address: String,
    /// Command characteristic UUID
    pub write_char_uuid: Uuid,
    /// Battery level characteristic UUID
    pub battery_char_uuid: Uuid,
    /// How long to scan before giving up
    pub connect_timeout: Duration,
}

impl ConnectionConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            address: settings.device_address.clone(),
            write_char_uuid: protocol::parse_uuid(&settings.write_char_uuid)?,
            battery_char_uuid: protocol::parse_uuid(&settings.battery_char_uuid)?,
            connect_timeout: settings.connect_timeout(),
        })
    }
}

/// Open BLE link to the car
pub struct BleConnection {
    peripheral: Peripheral,
    write_char: Characteristic,
    battery_char: Option<Characteristic>,
}

/// Steps run on a peripheral after the radio connection is up.
#[async_trait]
pub trait GattSetup: Send + Sync {
    async fn verify_connected(&self) -> Result<bool>;

    async fn discover(&self) -> Result<()>;

    fn list_characteristics(&self) -> BTreeSet<Characteristic>;

    async fn release(&self) -> Result<()>;
}

#[async_trait]
impl GattSetup for Peripheral {
    async fn verify_connected(&self) -> Result<bool> {
        self.is_connected()
            .await
            .map_err(|e| RemoteError::ConnectionFailure(e.to_string()))
    }

    async fn discover(&self) -> Result<()> {
        self.discover_services()
            .await
            .map_err(|e| RemoteError::ConnectionFailure(format!("service discovery: {}", e)))
    }

    fn list_characteristics(&self) -> BTreeSet<Characteristic> {
        btleplug::api::Peripheral::characteristics(self)
    }

    async fn release(&self) -> Result<()> {
        self.disconnect()
            .await
            .map_err(|e| RemoteError::ConnectionFailure(format!("disconnect: {}", e)))
    }
}

/// Verify the connection and resolve the characteristics.
///
/// Any failure disconnects the peripheral before the error is returned.
pub async fn prepare<P: GattSetup + ?Sized>(
    peripheral: &P,
    config: &ConnectionConfig,
) -> Result<(Characteristic, Option<Characteristic>)> {
    let result = async {
        if !peripheral.verify_connected().await? {
            return Err(RemoteError::ConnectionFailure(
                "device did not report connected".to_string(),
            ));
        }
        peripheral.discover().await?;
        find_characteristics(&peripheral.list_characteristics(), config)
    }
    .await;

    if result.is_err() {
        match peripheral.release().await {
            Ok(()) => info!("Released device after failed setup"),
            Err(e) => warn!("Failed to release device after failed setup: {}", e),
        }
    }
    result
}

fn find_characteristics(
    characteristics: &BTreeSet<Characteristic>,
    config: &ConnectionConfig,
) -> Result<(Characteristic, Option<Characteristic>)> {
    info!("Found {} characteristics", characteristics.len());

    let write_char = characteristics
        .iter()
        .find(|c| c.uuid == config.write_char_uuid)
        .cloned()
        .ok_or(RemoteError::CharacteristicNotFound(config.write_char_uuid))?;
    let battery_char = characteristics
        .iter()
        .find(|c| c.uuid == config.battery_char_uuid)
        .cloned();

    Ok((write_char, battery_char))
}

impl BleConnection {
    /// Scan for the configured device, connect, and resolve characteristics.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let scanner = BleScanner::new().await?;
        let peripheral = scanner
            .find(&config.address, config.connect_timeout)
            .await?;

        info!("Connecting to {}", config.address);
        peripheral
            .connect()
            .await
            .map_err(|e| RemoteError::ConnectionFailure(e.to_string()))?;

        let (write_char, battery_char) = prepare(&peripheral, config).await?;
        if battery_char.is_none() {
            warn!(
                "Battery characteristic {} not found, battery reads will fail",
                config.battery_char_uuid
            );
        }

        Ok(Self {
            peripheral,
            write_char,
            battery_char,
        })
    }
}

#[async_trait]
impl VehicleLink for BleConnection {
    async fn write_command(&self, command: &DriveCommand) -> Result<()> {
        let bytes = protocol::encode_command(command);
        self.peripheral
            .write(&self.write_char, &bytes, WriteType::WithResponse)
            .await
            .map_err(|e| RemoteError::Write(e.to_string()))
    }

    async fn read_battery(&self) -> Result<BatteryLevel> {
        let battery_char = self
            .battery_char
            .as_ref()
            .ok_or_else(|| RemoteError::Read("battery characteristic unavailable".to_string()))?;
        let value = self
            .peripheral
            .read(battery_char)
            .await
            .map_err(|e| RemoteError::Read(e.to_string()))?;
        protocol::parse_battery(&value)
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn disconnect(&self) -> Result<()> {
        self.peripheral.release().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakePeripheral {
        connected: bool,
        discover_fails: bool,
        releases: AtomicUsize,
    }

    impl FakePeripheral {
        fn new(connected: bool, discover_fails: bool) -> Self {
            Self {
                connected,
                discover_fails,
                releases: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GattSetup for FakePeripheral {
        async fn verify_connected(&self) -> Result<bool> {
            Ok(self.connected)
        }

        async fn discover(&self) -> Result<()> {
            if self.discover_fails {
                return Err(RemoteError::ConnectionFailure("discovery".to_string()));
            }
            Ok(())
        }

        fn list_characteristics(&self) -> BTreeSet<Characteristic> {
            BTreeSet::new()
        }

        async fn release(&self) -> Result<()> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn config() -> ConnectionConfig {
        ConnectionConfig::from_settings(&Settings::default()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_write_characteristic_releases_device() {
        let peripheral = FakePeripheral::new(true, false);
        let err = prepare(&peripheral, &config()).await.unwrap_err();

        assert!(matches!(err, RemoteError::CharacteristicNotFound(uuid) if uuid == config().write_char_uuid));
        assert_eq!(peripheral.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_discovery_releases_device() {
        let peripheral = FakePeripheral::new(true, true);
        let err = prepare(&peripheral, &config()).await.unwrap_err();

        assert!(err.is_connection_failure());
        assert_eq!(peripheral.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_connected_releases_device() {
        let peripheral = FakePeripheral::new(false, false);
        let err = prepare(&peripheral, &config()).await.unwrap_err();

        assert!(err.is_connection_failure());
        assert_eq!(peripheral.releases.load(Ordering::SeqCst), 1);
    }
}
