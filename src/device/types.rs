use uuid::Uuid;

/// Platform assigned identifier of a peripheral (an address on most platforms).
pub type DeviceId = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub id: DeviceId,
    pub name: Option<String>,
}

impl DeviceDescriptor {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("NONE")
    }
}

/// Power state of the bluetooth radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    PoweredOn,
    PoweredOff,
    Unauthorized,
    Unsupported,
    Resetting,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    DeviceFound(DeviceDescriptor),
    DeviceDisconnected(DeviceId),
}

/// A characteristic found during service discovery, along with how it may be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicRef {
    pub service_uuid: Uuid,
    pub uuid: Uuid,
    pub writable_with_response: bool,
    pub writable_without_response: bool,
}

impl CharacteristicRef {
    pub fn is_writable(&self) -> bool {
        self.writable_with_response || self.writable_without_response
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Idle,
    Scanning,
    Connecting,
    Connected,
    Disconnecting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatus {
    pub state: DeviceState,
    // result of the last liveness check against the adapter, not derived from `state`
    pub is_connected: bool,
    pub device: Option<DeviceDescriptor>,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        DeviceStatus {
            state: DeviceState::Idle,
            is_connected: false,
            device: None,
        }
    }
}
