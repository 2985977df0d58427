use crate::shade::DeviceId;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("Gateway discovery failed: {0}")]
    Discovery(String),

    #[error("Gateway communication error: {0}")]
    Gateway(String),

    #[error("Unknown device: {0}")]
    UnknownDevice(DeviceId),

    #[error("Device unavailable (updates disabled): {0}")]
    DeviceUnavailable(DeviceId),

    #[error("Invalid level {0}, expected 0-100")]
    InvalidLevel(u8),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
