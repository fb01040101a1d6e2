use crate::domain::vehicle::{DriveCommand, VehicleState};
use crate::error::Result;
use crate::infrastructure::bluetooth::VehicleLink;
use crate::infrastructure::keyboard::KeySource;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Samples the keyboard every tick and writes drive commands.
///
/// Owns the [`VehicleState`]; nothing else reads or mutates it.
pub struct ControlLoop<K> {
    keys: K,
    state: VehicleState,
    tick: Duration,
}

impl<K: KeySource> ControlLoop<K> {
    pub fn new(keys: K, tick: Duration) -> Self {
        Self {
            keys,
            state: VehicleState::neutral(),
            tick,
        }
    }

    pub fn state(&self) -> VehicleState {
        self.state
    }

    /// Run until Esc is pressed or a write fails.
    ///
    /// On Esc the neutral command is sent before returning. A failed write or
    /// keyboard error is returned as is. The state is neutral afterwards in
    /// every case.
    pub async fn run<L: VehicleLink + ?Sized>(&mut self, link: &L) -> Result<()> {
        let result = self.drive(link).await;
        self.state.reset();
        result
    }

    async fn drive<L: VehicleLink + ?Sized>(&mut self, link: &L) -> Result<()> {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let keys = self.keys.snapshot()?;
            let outcome = self.state.apply(&keys);

            if outcome.stop {
                info!("Exiting...");
            }
            for command in &outcome.commands {
                send_command(link, command).await?;
            }
            if outcome.stop {
                return Ok(());
            }
        }
    }
}

/// Write one command and log it.
pub async fn send_command<L: VehicleLink + ?Sized>(link: &L, command: &DriveCommand) -> Result<()> {
    debug!("Writing {:02X?}", command.to_bytes());
    link.write_command(command).await?;
    info!("Sent command: {}", command);
    Ok(())
}
