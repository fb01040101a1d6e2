use crate::domain::models::BatteryLevel;
use crate::infrastructure::bluetooth::VehicleLink;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Periodically reads and reports the car's battery level.
pub struct BatteryPoller {
    interval: Duration,
}

impl BatteryPoller {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Poll forever; the first read is immediate. Read failures are logged
    /// and the next read happens one interval later. Only cancellation (the
    /// future being dropped) ends this.
    pub async fn run<L: VehicleLink + ?Sized>(&self, link: &L) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.poll_once(link).await;
        }
    }

    pub async fn poll_once<L: VehicleLink + ?Sized>(&self, link: &L) -> Option<BatteryLevel> {
        match link.read_battery().await {
            Ok(level) => {
                info!("Battery level: {}", level);
                Some(level)
            }
            Err(e) => {
                warn!("Failed to read battery: {}", e);
                None
            }
        }
    }
}
