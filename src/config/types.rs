use serde::{Deserialize, Serialize};
use tokio::time::Duration;
use uuid::Uuid;

use crate::device::connection::ConnectorSettings;
use crate::device::constants::{make_controller_command_uuid, make_controller_service_uuid, CONNECT_DEADLINE, DEVICE_NAME, LIVENESS_INTERVAL};
use crate::session::SessionSettings;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub device_name: String,
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
    // null: wait for connect and discovery without a deadline
    pub connect_timeout_ms: Option<u64>,
    pub liveness_interval_ms: u64,
    pub platform_api_level: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            device_name: DEVICE_NAME.to_string(),
            service_uuid: make_controller_service_uuid(),
            characteristic_uuid: make_controller_command_uuid(),
            connect_timeout_ms: Some(CONNECT_DEADLINE),
            liveness_interval_ms: LIVENESS_INTERVAL,
            platform_api_level: None,
        }
    }
}

impl Config {
    pub fn connector_settings(&self) -> ConnectorSettings {
        ConnectorSettings {
            device_name: self.device_name.clone(),
            service_uuid: self.service_uuid,
            characteristic_uuid: self.characteristic_uuid,
            connect_timeout: self.connect_timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            connector: self.connector_settings(),
            // a zero period would make the interval panic
            liveness_interval: Duration::from_millis(self.liveness_interval_ms.max(1)),
            api_level: self.platform_api_level,
        }
    }
}
