use uuid::Uuid;

/**
 * The advertised name a peripheral must carry before a connection is attempted.
 */
pub const DEVICE_NAME: &str = "MIDI_Controller";

/**
 * The UUID of the Bluetooth BLE service that hosts the command characteristic.
 */
pub const CONTROLLER_SERVICE: &str = "00000180-0000-1000-8000-00805f9b34fb";

/**
 * The UUID of the Bluetooth BLE remote GATT characteristic to write commands to.
 */
pub const CONTROLLER_COMMAND_CHARACTERISTIC: &str = "0000dead-0000-1000-8000-00805f9b34fb";

/**
 * How long (milliseconds) connecting, and separately discovering services, may take by default.
 */
pub const CONNECT_DEADLINE: u64 = 10_000;

/**
 * How often (milliseconds) to check whether the connected peripheral is still connected.
 */
pub const LIVENESS_INTERVAL: u64 = 1000;

/**
 * How long (milliseconds) a write to a characteristic may take.
 */
pub const WRITE_DEADLINE: u64 = 2000;

/**
 * How long (milliseconds) checking if the peripheral is still connected may take
 */
pub const IS_CONNECTED_DEADLINE: u64 = 2000;

/**
 * Platform API level from which scanning and connecting need their own permissions.
 */
pub const FINE_GRAINED_BLUETOOTH_API_LEVEL: u32 = 31;

pub const fn make_controller_service_uuid() -> Uuid {
    Uuid::from_u128(0x00000180_0000_1000_8000_00805f9b34fb)
}

pub const fn make_controller_command_uuid() -> Uuid {
    Uuid::from_u128(0x0000dead_0000_1000_8000_00805f9b34fb)
}
