//! Session Module
//!
//! Owns the connection for a whole run: checks it, drives the control loop
//! and battery poller side by side, and disconnects exactly once.

use crate::app::battery::BatteryPoller;
use crate::app::control::{send_command, ControlLoop};
use crate::domain::settings::Settings;
use crate::domain::vehicle::DriveCommand;
use crate::error::{RemoteError, Result};
use crate::infrastructure::bluetooth::{BleConnection, ConnectionConfig, VehicleLink};
use crate::infrastructure::keyboard::KeySource;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Why a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Esc was pressed.
    Esc,
    /// The shutdown future resolved (Ctrl-C).
    Interrupted,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub tick: Duration,
    /// `None` disables the battery poller.
    pub battery_interval: Option<Duration>,
}

impl SessionOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            tick: settings.tick_interval(),
            battery_interval: settings
                .battery_poll_enabled
                .then(|| settings.battery_poll_interval()),
        }
    }
}

enum Ended {
    Control(Result<()>),
    Poller,
    Shutdown,
}

/// Connect to the configured car and run until Esc, a fatal error, or
/// `shutdown` resolves. Errors are returned unlogged; the caller reports them.
pub async fn connect_and_run<K, S>(settings: &Settings, keys: K, shutdown: S) -> Result<ExitReason>
where
    K: KeySource,
    S: Future<Output = ()>,
{
    let config = ConnectionConfig::from_settings(settings)?;
    let link = BleConnection::connect(&config).await?;

    run_session(link, keys, SessionOptions::from_settings(settings), shutdown).await
}

/// Run both loops over an open link.
///
/// The first loop to finish ends the session and the other one is dropped
/// with it. The link is disconnected exactly once on every path, including a
/// link that was never connected.
pub async fn run_session<L, K, S>(
    link: L,
    keys: K,
    options: SessionOptions,
    shutdown: S,
) -> Result<ExitReason>
where
    L: VehicleLink,
    K: KeySource,
    S: Future<Output = ()>,
{
    if !link.is_connected().await {
        release(&link).await;
        return Err(RemoteError::ConnectionFailure(
            "device is not connected".to_string(),
        ));
    }

    info!("Connected. ←/→ to steer | ↑/↓ to accelerate/brake | ESC to exit");

    let mut control = ControlLoop::new(keys, options.tick);
    let poller = options.battery_interval.map(BatteryPoller::new);

    let ended = {
        let battery = async {
            match &poller {
                Some(poller) => poller.run(&link).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = control.run(&link) => Ended::Control(result),
            _ = battery => Ended::Poller,
            _ = shutdown => Ended::Shutdown,
        }
    };

    let result = match ended {
        Ended::Control(Ok(())) => Ok(ExitReason::Esc),
        Ended::Control(Err(e)) => Err(e),
        Ended::Poller => {
            warn!("Battery poller stopped unexpectedly");
            Ok(ExitReason::Interrupted)
        }
        Ended::Shutdown => {
            info!("Interrupted, stopping the car");
            if let Err(e) = send_command(&link, &DriveCommand::NEUTRAL).await {
                warn!("Failed to send stop command: {}", e);
            }
            Ok(ExitReason::Interrupted)
        }
    };

    release(&link).await;
    result
}

async fn release<L: VehicleLink>(link: &L) {
    match link.disconnect().await {
        Ok(()) => info!("Disconnected"),
        Err(e) => warn!("Disconnect failed: {}", e),
    }
}
