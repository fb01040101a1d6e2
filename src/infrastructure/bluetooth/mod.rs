//! Bluetooth Module
//!
//! Provides the BLE link to the RC car.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 BleConnection (VehicleLink)              │
//! │      (write drive commands, read battery, disconnect)    │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!              ┌────────┴────────┐
//!              │                 │
//!              ▼                 ▼
//!       ┌───────────┐     ┌────────────┐
//!       │  Scanner  │     │  Protocol  │
//!       │           │     │            │
//!       │ - adapter │     │ - UUIDs    │
//!       │ - address │     │ - encoding │
//!       │   lookup  │     │ - battery  │
//!       └───────────┘     └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Characteristic UUIDs, command encoding, battery parsing
//! - [`scanner`] - Adapter selection and device lookup
//! - [`connection`] - Connection setup and the [`VehicleLink`] trait

pub mod connection;
pub mod protocol;
pub mod scanner;

pub use connection::{BleConnection, ConnectionConfig, VehicleLink};
