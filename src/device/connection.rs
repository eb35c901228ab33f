use std::future::Future;
use std::sync::Arc;
use futures::SinkExt;
use futures::channel::mpsc::Sender;
use log::{debug, error, info, trace, warn};
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::device::constants::{make_controller_command_uuid, make_controller_service_uuid, CONNECT_DEADLINE, DEVICE_NAME, IS_CONNECTED_DEADLINE};
use crate::device::transport::{Link, Radio};
use crate::device::types::{CharacteristicRef, DeviceDescriptor, DeviceId, DeviceState, DeviceStatus};
use crate::error::{ConnectorError, DeviceError};
use crate::session::types::SessionEvent;

#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    pub device_name: String,
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
    // None waits forever
    pub connect_timeout: Option<Duration>,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        ConnectorSettings {
            device_name: DEVICE_NAME.to_string(),
            service_uuid: make_controller_service_uuid(),
            characteristic_uuid: make_controller_command_uuid(),
            connect_timeout: Some(Duration::from_millis(CONNECT_DEADLINE)),
        }
    }
}

/// The one active connection, along with everything discovered on it.
#[derive(Debug)]
pub struct ConnectionHandle<L: Link> {
    link: L,
    device: DeviceDescriptor,
    characteristics: Vec<CharacteristicRef>,
    target: Option<CharacteristicRef>,
}

impl<L: Link> ConnectionHandle<L> {
    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    /// Every characteristic discovered on this connection.
    pub fn characteristics(&self) -> &[CharacteristicRef] {
        &self.characteristics
    }

    /// The command characteristic, if the peripheral has one.
    pub fn target(&self) -> Option<&CharacteristicRef> {
        self.target.as_ref()
    }
}

#[derive(Debug)]
enum ConnectionState<L: Link> {
    Idle,
    Scanning,
    Connecting {
        device: DeviceDescriptor,
    },
    Connected {
        handle: ConnectionHandle<L>,
    },
    Disconnecting {
        device: DeviceDescriptor,
    },
}

impl<L: Link> ConnectionState<L> {
    fn tag(&self) -> DeviceState {
        match self {
            ConnectionState::Idle => DeviceState::Idle,
            ConnectionState::Scanning => DeviceState::Scanning,
            ConnectionState::Connecting { .. } => DeviceState::Connecting,
            ConnectionState::Connected { .. } => DeviceState::Connected,
            ConnectionState::Disconnecting { .. } => DeviceState::Disconnecting,
        }
    }

    fn device(&self) -> Option<&DeviceDescriptor> {
        match self {
            ConnectionState::Idle | ConnectionState::Scanning => None,
            ConnectionState::Connecting { device } | ConnectionState::Disconnecting { device } => Some(device),
            ConnectionState::Connected { handle } => Some(&handle.device),
        }
    }
}

async fn deadline<T>(duration: Duration, fut: impl Future<Output = Result<T, DeviceError>>) -> Result<T, DeviceError> {
    timeout(duration, fut).await.unwrap_or(Err(DeviceError::Timeout(duration)))
}

/// Scans for the controller, connects to the first match and owns the resulting connection.
///
/// All transitions go through [`ScannerConnector::transition`], which also publishes the new
/// [`DeviceStatus`]. Every failure is logged here and leaves the machine in a valid state.
pub struct ScannerConnector<R: Radio> {
    radio: Arc<R>,
    settings: ConnectorSettings,
    cancel: CancellationToken,
    events: Sender<SessionEvent>,
    state: ConnectionState<R::Link>,
    is_connected: bool,
    published: Option<DeviceStatus>,
    scan_sessions: u64,
}

impl<R: Radio> ScannerConnector<R> {
    pub fn new(radio: Arc<R>, settings: ConnectorSettings, cancel: CancellationToken, events: Sender<SessionEvent>) -> Self {
        ScannerConnector {
            radio,
            settings,
            cancel,
            events,
            state: ConnectionState::Idle,
            is_connected: false,
            published: None,
            scan_sessions: 0,
        }
    }

    pub fn status(&self) -> DeviceStatus {
        DeviceStatus {
            state: self.state.tag(),
            is_connected: self.is_connected,
            device: self.state.device().cloned(),
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state.tag()
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn is_scanning(&self) -> bool {
        matches!(self.state, ConnectionState::Scanning)
    }

    /// How many scans were started so far.
    pub fn scan_sessions(&self) -> u64 {
        self.scan_sessions
    }

    pub fn handle(&self) -> Option<&ConnectionHandle<R::Link>> {
        match &self.state {
            ConnectionState::Connected { handle } => Some(handle),
            _ => None,
        }
    }

    pub async fn start_scan(&mut self) {
        match self.state {
            ConnectionState::Idle => {},
            ConnectionState::Scanning => {
                debug!("Already scanning");
                return;
            },
            _ => {
                info!("Ignoring scan request, connection is {:?}", self.state.tag());
                return;
            },
        }

        info!("Scanning for devices...");
        match self.radio.start_scan().await {
            Ok(()) => {
                self.scan_sessions += 1;
                self.transition(ConnectionState::Scanning).await;
            },
            Err(source) => {
                error!("{}", ConnectorError::Scan { source });
            },
        }
    }

    pub async fn stop_scan(&mut self) {
        if !self.is_scanning() {
            return;
        }

        if let Err(err) = self.radio.stop_scan().await {
            warn!("Failed to stop scanning: {}", err);
        }
        info!("Scanning stopped");
        self.transition(ConnectionState::Idle).await;
    }

    /// Handles an advertisement. Only the first advertisement of the configured name in a scan
    /// session leads to a connection attempt.
    pub async fn on_device_found(&mut self, device: DeviceDescriptor) {
        if !self.is_scanning() {
            trace!("Ignoring advertisement of {}, not scanning", device.id);
            return;
        }

        if device.name.as_deref() != Some(self.settings.device_name.as_str()) {
            trace!("Ignoring advertisement of {} ({})", device.id, device.display_name());
            return;
        }

        info!("Found {}: {}", self.settings.device_name, device.id);
        if let Err(err) = self.radio.stop_scan().await {
            warn!("Failed to stop scanning: {}", err);
        }
        self.transition(ConnectionState::Connecting { device: device.clone() }).await;

        match self.establish(&device).await {
            Ok(handle) => {
                info!("Connected to: {} {}", device.id, device.display_name());
                self.transition(ConnectionState::Connected { handle }).await;
                self.refresh_liveness().await;
            },
            Err(err) => {
                error!("{}", err);
                self.transition(ConnectionState::Idle).await;
            },
        }
    }

    /// Disconnects on request of the user. Does nothing unless the link reports itself connected.
    pub async fn request_disconnect(&mut self) {
        let link = match &self.state {
            ConnectionState::Connected { handle } => handle.link.clone(),
            _ => {
                info!("No device available to disconnect");
                return;
            },
        };

        match link.is_connected().await {
            Ok(true) => {},
            Ok(false) => {
                info!("Device is not connected.");
                return;
            },
            Err(err) => {
                error!("Failed to check connection before disconnecting: {}", err);
                return;
            },
        }

        info!("Disconnecting from device: {}", link.id());
        let device = self.state.device().cloned().unwrap_or(DeviceDescriptor { id: link.id(), name: None });
        let previous = self.transition(ConnectionState::Disconnecting { device: device.clone() }).await;

        match deadline(self.disconnect_deadline(), link.disconnect()).await {
            Ok(()) => {
                self.transition(ConnectionState::Idle).await;
                info!("Device disconnected successfully.");
            },
            Err(source) => {
                error!("{}", ConnectorError::Disconnect { device: device.id, source });
                self.transition(previous).await;
                self.refresh_liveness().await;
            },
        }
    }

    pub async fn on_peripheral_disconnected(&mut self, id: &DeviceId) {
        let device = match &self.state {
            ConnectionState::Connected { handle } if &handle.device.id == id => handle.device.clone(),
            _ => return,
        };

        warn!("Peripheral {} disconnected", id);
        self.transition(ConnectionState::Disconnecting { device }).await;
        self.transition(ConnectionState::Idle).await;
    }

    /// Asks the adapter whether the connected peripheral is still there. A peripheral that is
    /// gone is handled as if it had reported the disconnect itself.
    pub async fn refresh_liveness(&mut self) {
        let id = match &self.state {
            ConnectionState::Connected { handle } => handle.device.id.clone(),
            _ => return,
        };

        let duration = Duration::from_millis(IS_CONNECTED_DEADLINE);
        match timeout(duration, self.radio.is_device_connected(&id)).await {
            Err(_) => {
                warn!("Checking for connection status took too long");
            },
            Ok(Err(err)) => {
                error!("Failed to check device connection: {}", err);
            },
            Ok(Ok(true)) => {
                if !self.is_connected {
                    debug!("isDeviceConnected result: true");
                    self.is_connected = true;
                    self.publish().await;
                }
            },
            Ok(Ok(false)) => {
                warn!("Connection lost");
                self.on_peripheral_disconnected(&id).await;
            },
        }
    }

    /// Stops scanning and releases the connection. Safe to call any number of times.
    pub async fn teardown(&mut self) {
        let connected = match &self.state {
            ConnectionState::Connected { handle } => Some((handle.link.clone(), handle.device.clone())),
            _ => None,
        };

        if self.is_scanning() {
            self.stop_scan().await;
        }

        if let Some((link, device)) = connected {
            self.transition(ConnectionState::Disconnecting { device }).await;

            if let Err(err) = deadline(self.disconnect_deadline(), link.disconnect()).await {
                warn!("Failed to disconnect during teardown: {}", err);
            }
            self.transition(ConnectionState::Idle).await;
        }
    }

    async fn establish(&self, device: &DeviceDescriptor) -> Result<ConnectionHandle<R::Link>, ConnectorError> {
        let connect_error = |source| ConnectorError::Connect { device: device.id.clone(), source };

        let link = self.radio.link(device).await.map_err(connect_error)?;

        info!("Attempting to connect to: {}", device.id);
        if let Err(source) = self.bounded(link.connect()).await {
            self.abandon(&link).await;
            return Err(connect_error(source));
        }

        info!("Connected; Discovering services...");
        let characteristics = match self.bounded(link.discover()).await {
            Ok(v) => v,
            Err(source) => {
                self.abandon(&link).await;
                return Err(ConnectorError::Discovery { device: device.id.clone(), source });
            },
        };

        let target = characteristics
            .iter()
            .find(|c| c.service_uuid == self.settings.service_uuid && c.uuid == self.settings.characteristic_uuid)
            .copied();

        match target {
            Some(target) => info!("Using characteristic {:?} {:?}", target.service_uuid, target.uuid),
            None => warn!(
                "Peripheral {} has no characteristic {} in service {}",
                device.id, self.settings.characteristic_uuid, self.settings.service_uuid,
            ),
        }

        Ok(ConnectionHandle {
            link,
            device: device.clone(),
            characteristics,
            target,
        })
    }

    // connect and discovery stop early on cancellation or when they take too long
    async fn bounded<T>(&self, fut: impl Future<Output = Result<T, DeviceError>>) -> Result<T, DeviceError> {
        let limited = async move {
            match self.settings.connect_timeout {
                Some(duration) => deadline(duration, fut).await,
                None => fut.await,
            }
        };

        tokio::select! {
            _ = self.cancel.cancelled() => Err(DeviceError::Cancelled),
            result = limited => result,
        }
    }

    // a half established link is torn down before returning to Idle
    async fn abandon(&self, link: &R::Link) {
        if let Err(err) = deadline(self.disconnect_deadline(), link.disconnect()).await {
            debug!("Failed to disconnect abandoned link: {}", err);
        }
    }

    fn disconnect_deadline(&self) -> Duration {
        self.settings.connect_timeout.unwrap_or(Duration::from_millis(CONNECT_DEADLINE))
    }

    async fn transition(&mut self, next: ConnectionState<R::Link>) -> ConnectionState<R::Link> {
        debug!("Connection state {:?} -> {:?}", self.state.tag(), next.tag());
        let previous = std::mem::replace(&mut self.state, next);

        // the liveness check is only meaningful for the handle it was made against
        if !matches!(self.state, ConnectionState::Connected { .. }) {
            self.is_connected = false;
        }

        self.publish().await;
        previous
    }

    async fn publish(&mut self) {
        let status = self.status();
        if self.published.as_ref() == Some(&status) {
            return;
        }

        self.published = Some(status.clone());
        if let Err(err) = self.events.send(SessionEvent::Device(status)).await {
            debug!("Device status not delivered: {}", err);
        }
    }
}
