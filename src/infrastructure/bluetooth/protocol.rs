//! RC Jimny BLE Protocol
//!
//! Characteristic UUIDs and payload handling for the car's command channel and
//! the standard battery service.

use crate::domain::models::BatteryLevel;
use crate::domain::vehicle::DriveCommand;
use crate::error::{RemoteError, Result};
use tracing::trace;
use uuid::Uuid;

/// Command write characteristic; takes `[angle, speed, 0x00]`.
pub const WRITE_CHAR_UUID: &str = "4fbbffe3-c59c-478d-bb99-d6e06367e344";

/// Standard GATT Battery Level characteristic (0x2A19).
pub const BATTERY_CHAR_UUID: &str = "00002a19-0000-1000-8000-00805f9b34fb";

/// Encode a drive command for the write characteristic.
pub fn encode_command(command: &DriveCommand) -> [u8; 3] {
    let bytes = command.to_bytes();
    trace!("Encoded command: {:02X?}", bytes);
    bytes
}

/// Parse a battery characteristic value. Only the first byte is used.
pub fn parse_battery(bytes: &[u8]) -> Result<BatteryLevel> {
    match bytes.first() {
        Some(&percent) => Ok(BatteryLevel(percent)),
        None => Err(RemoteError::Read("empty battery payload".to_string())),
    }
}

/// Parse a UUID string from settings.
pub fn parse_uuid(uuid_str: &str) -> Result<Uuid> {
    Uuid::parse_str(uuid_str.trim())
        .map_err(|e| RemoteError::Config(format!("invalid UUID {:?}: {}", uuid_str, e)))
}

/// Whether a discovered peripheral is the configured target.
///
/// `target` may be a BD_ADDR (`AA:BB:CC:DD:EE:FF`) or a platform peripheral
/// id such as the CoreBluetooth UUID. Both must match in full; case is
/// ignored. `peripheral_id` is the `Debug` form of the id, with or without
/// the `PeripheralId(..)` wrapper.
pub fn matches_address(target: &str, address: &str, peripheral_id: &str) -> bool {
    let target = target.trim();
    if target.is_empty() {
        return false;
    }
    if address.eq_ignore_ascii_case(target) {
        return true;
    }

    let id = peripheral_id
        .trim()
        .strip_prefix("PeripheralId(")
        .and_then(|inner| inner.strip_suffix(')'))
        .unwrap_or(peripheral_id.trim());

    match (Uuid::parse_str(target), Uuid::parse_str(id)) {
        (Ok(target), Ok(id)) => target == id,
        _ => id.eq_ignore_ascii_case(target),
    }
}
