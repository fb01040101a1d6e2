use std::time::Duration;
use uuid::Uuid;

/// Errors raised while driving the vehicle.
///
/// Write and keyboard failures end the run. Read failures are only ever
/// logged by the battery poller.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("not connected to the car: {0}")]
    ConnectionFailure(String),

    #[error("device {address} not found within {timeout:?}")]
    DeviceNotFound { address: String, timeout: Duration },

    #[error("characteristic {0} not found on device")]
    CharacteristicNotFound(Uuid),

    #[error("command write failed: {0}")]
    Write(String),

    #[error("battery read failed: {0}")]
    Read(String),

    #[error("keyboard error: {0}")]
    Keyboard(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RemoteError {
    /// True for every variant that means the link was never usable.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailure(_) | Self::DeviceNotFound { .. } | Self::CharacteristicNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;
