//! Keyboard remote control for a BLE RC car.
//!
//! Arrow keys steer and drive, Esc stops the car and exits. The battery level
//! is polled alongside the control loop over the same connection.

pub mod app;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::{RemoteError, Result};
