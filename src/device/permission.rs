use async_trait::async_trait;
use btleplug::api::Manager as _;
use btleplug::platform::Manager;
use indexmap::IndexMap;
use log::{info, warn};

use crate::device::constants::FINE_GRAINED_BLUETOOTH_API_LEVEL;
use crate::error::DeviceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    FineLocation,
    BluetoothScan,
    BluetoothConnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    NeverAskAgain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    Granted,
    Denied,
}

pub type PermissionResults = IndexMap<Permission, PermissionStatus>;

/// Something that can ask the operating system for permissions.
#[async_trait]
pub trait PermissionPrompter: Send + Sync {
    /// The platform API level, if the platform has such a concept.
    fn api_level(&self) -> Option<u32>;

    async fn request(&self, permissions: &[Permission]) -> Result<PermissionResults, DeviceError>;
}

pub fn required_permissions(api_level: Option<u32>) -> Vec<Permission> {
    let mut permissions = vec![Permission::FineLocation];

    if api_level.map_or(false, |level| level >= FINE_GRAINED_BLUETOOTH_API_LEVEL) {
        permissions.push(Permission::BluetoothScan);
        permissions.push(Permission::BluetoothConnect);
    }

    permissions
}

/// Requests every required permission. Only when all of them are granted is the outcome
/// `Granted`; errors are logged and count as a denial.
pub async fn request_permissions<P: PermissionPrompter + ?Sized>(prompter: &P) -> PermissionOutcome {
    let permissions = required_permissions(prompter.api_level());

    let results = match prompter.request(&permissions).await {
        Ok(results) => results,
        Err(err) => {
            warn!("Requesting permissions failed: {}", err);
            return PermissionOutcome::Denied;
        },
    };

    let all_granted = permissions.iter().all(|permission| {
        results.get(permission) == Some(&PermissionStatus::Granted)
    });

    if all_granted {
        info!("All permissions granted");
        PermissionOutcome::Granted
    } else {
        warn!("Not all permissions granted: {:?}", results);
        PermissionOutcome::Denied
    }
}

/// Desktop platforms have no permission prompt of their own; access to the adapter is either
/// allowed or refused when it is first used. This prompter uses the adapter once and reports
/// the answer for every requested permission.
pub struct AdapterPermissions {
    api_level: Option<u32>,
}

impl AdapterPermissions {
    pub fn new(api_level: Option<u32>) -> Self {
        AdapterPermissions { api_level }
    }
}

#[async_trait]
impl PermissionPrompter for AdapterPermissions {
    fn api_level(&self) -> Option<u32> {
        self.api_level
    }

    async fn request(&self, permissions: &[Permission]) -> Result<PermissionResults, DeviceError> {
        let probe = async {
            let manager = Manager::new().await?;
            Ok::<_, btleplug::Error>(manager.adapters().await?)
        };

        let status = match probe.await.map_err(DeviceError::from) {
            Ok(_) => PermissionStatus::Granted,
            Err(err) if err.is_permission_denied() => PermissionStatus::Denied,
            Err(err) => return Err(err),
        };

        Ok(permissions.iter().map(|permission| (*permission, status)).collect())
    }
}
