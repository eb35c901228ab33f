use std::io;
use std::str::Utf8Error;
use std::time::Duration;
use thiserror::Error;
use btleplug;
use iced;
use serde_json;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to acquire file lock on config file: {source}")]
    CanNotLock { source: io::Error },

    #[error("Failed to decode config as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse config file: {source}")]
    JsonError { #[from] source: serde_json::Error },
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start application (iced): {source}")]
    Iced { #[from] source: iced::Error },

    #[error("Failed to start application (config): {source}")]
    ConfigError { #[from] source: ConfigError },
}

/// Failure reported by the bluetooth stack or by the deadline/cancellation wrapped around it.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Error communicating with device (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("No bluetooth adapter is available")]
    AdapterUnavailable,

    #[error("Peripheral {0} is not known to the adapter")]
    UnknownPeripheral(String),

    #[error("Operation did not complete within {0:?}")]
    Timeout(Duration),

    #[error("Operation was cancelled")]
    Cancelled,
}

impl DeviceError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, DeviceError::Btle { source: btleplug::Error::PermissionDenied })
    }
}

/// A failed transition of the scan/connect state machine.
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Failed to scan for devices: {source}")]
    Scan { source: DeviceError },

    #[error("Failed to connect to {device}: {source}")]
    Connect { device: String, source: DeviceError },

    #[error("Failed to discover services of {device}: {source}")]
    Discovery { device: String, source: DeviceError },

    #[error("Failed to disconnect from {device}: {source}")]
    Disconnect { device: String, source: DeviceError },
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("No peripheral is connected")]
    NotConnected,

    #[error("Characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    #[error("Characteristic {0} is not writable")]
    NotWritable(Uuid),

    #[error("Failed to write to characteristic: {source}")]
    Transport { #[from] source: DeviceError },
}
