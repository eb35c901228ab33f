#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};
use async_trait::async_trait;
use futures::channel::mpsc::{channel, unbounded, Receiver, Sender, UnboundedReceiver, UnboundedSender};
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use midi_pad_remote::device::connection::{ConnectorSettings, ScannerConnector};
use midi_pad_remote::device::constants::{make_controller_command_uuid, make_controller_service_uuid};
use midi_pad_remote::device::permission::{Permission, PermissionPrompter, PermissionResults, PermissionStatus};
use midi_pad_remote::device::transport::{Link, Radio};
use midi_pad_remote::device::types::{AdapterState, CharacteristicRef, DeviceDescriptor, DeviceId, DeviceState, RadioEvent};
use midi_pad_remote::error::DeviceError;
use midi_pad_remote::session::types::SessionEvent;

pub const CONTROLLER_ID: &str = "AA:BB:CC:DD:EE:01";

pub fn controller() -> DeviceDescriptor {
    DeviceDescriptor { id: CONTROLLER_ID.to_string(), name: Some("MIDI_Controller".to_string()) }
}

pub fn other_device() -> DeviceDescriptor {
    DeviceDescriptor { id: "AA:BB:CC:DD:EE:02".to_string(), name: Some("Other_Device".to_string()) }
}

pub fn command_characteristic(writable: bool) -> CharacteristicRef {
    CharacteristicRef {
        service_uuid: make_controller_service_uuid(),
        uuid: make_controller_command_uuid(),
        writable_with_response: false,
        writable_without_response: writable,
    }
}

pub fn unrelated_characteristic() -> CharacteristicRef {
    CharacteristicRef {
        service_uuid: Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb),
        uuid: Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb),
        writable_with_response: false,
        writable_without_response: false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectBehavior {
    Succeed,
    Fail,
    Hang,
}

/// What the fake stack answers, and everything that was asked of it.
#[derive(Debug)]
pub struct FakeState {
    pub adapter_state: AdapterState,
    pub adapter_transitions: Vec<AdapterState>,
    pub radio_events: Vec<RadioEvent>,
    radio_feed: Option<UnboundedReceiver<RadioEvent>>,
    pub connect: ConnectBehavior,
    pub characteristics: Vec<CharacteristicRef>,
    pub link_connected: bool,
    pub device_connected: bool,
    pub disconnect_fails: bool,
    pub scan_fails: bool,
    pub discover_fails: bool,
    pub liveness_fails: bool,

    pub start_scan_calls: u32,
    pub stop_scan_calls: u32,
    pub connect_calls: u32,
    pub discover_calls: u32,
    pub disconnect_calls: u32,
    pub release_calls: u32,
    pub writes: Vec<(Uuid, Vec<u8>)>,
}

impl Default for FakeState {
    fn default() -> Self {
        FakeState {
            adapter_state: AdapterState::PoweredOn,
            adapter_transitions: Vec::new(),
            radio_events: Vec::new(),
            radio_feed: None,
            connect: ConnectBehavior::Succeed,
            characteristics: vec![unrelated_characteristic(), command_characteristic(true)],
            link_connected: true,
            device_connected: true,
            disconnect_fails: false,
            scan_fails: false,
            discover_fails: false,
            liveness_fails: false,
            start_scan_calls: 0,
            stop_scan_calls: 0,
            connect_calls: 0,
            discover_calls: 0,
            disconnect_calls: 0,
            release_calls: 0,
            writes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeRadio {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRadio {
    pub fn new() -> Self {
        FakeRadio::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Radio events sent here are delivered after the scripted ones. Call before the events
    /// are subscribed to.
    pub fn feed_radio_events(&self) -> UnboundedSender<RadioEvent> {
        let (sender, receiver) = unbounded();
        self.state().radio_feed = Some(receiver);
        sender
    }

    /// The payloads written so far, as text.
    pub fn written(&self) -> Vec<String> {
        self.state().writes.iter().map(|(_, payload)| String::from_utf8(payload.clone()).unwrap()).collect()
    }
}

#[async_trait]
impl Radio for FakeRadio {
    type Link = FakeLink;

    async fn adapter_state(&self) -> Result<AdapterState, DeviceError> {
        Ok(self.state().adapter_state)
    }

    async fn adapter_events(&self) -> Result<BoxStream<'static, AdapterState>, DeviceError> {
        let transitions = self.state().adapter_transitions.clone();
        Ok(stream::iter(transitions).chain(stream::pending()).boxed())
    }

    async fn device_events(&self) -> Result<BoxStream<'static, RadioEvent>, DeviceError> {
        let mut state = self.state();
        let scripted = stream::iter(state.radio_events.clone());

        match state.radio_feed.take() {
            Some(feed) => Ok(scripted.chain(feed).chain(stream::pending()).boxed()),
            None => Ok(scripted.chain(stream::pending()).boxed()),
        }
    }

    async fn start_scan(&self) -> Result<(), DeviceError> {
        let mut state = self.state();
        state.start_scan_calls += 1;
        if state.scan_fails {
            return Err(DeviceError::Btle { source: btleplug::Error::RuntimeError("scan refused".to_string()) });
        }
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), DeviceError> {
        self.state().stop_scan_calls += 1;
        Ok(())
    }

    async fn link(&self, device: &DeviceDescriptor) -> Result<FakeLink, DeviceError> {
        Ok(FakeLink { id: device.id.clone(), state: self.state.clone() })
    }

    async fn is_device_connected(&self, _id: &DeviceId) -> Result<bool, DeviceError> {
        let state = self.state();
        if state.liveness_fails {
            return Err(DeviceError::Btle { source: btleplug::Error::RuntimeError("registry unavailable".to_string()) });
        }
        Ok(state.device_connected)
    }

    fn release(&self) {
        self.state().release_calls += 1;
    }
}

#[derive(Debug, Clone)]
pub struct FakeLink {
    id: DeviceId,
    state: Arc<Mutex<FakeState>>,
}

impl FakeLink {
    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl Link for FakeLink {
    fn id(&self) -> DeviceId {
        self.id.clone()
    }

    async fn connect(&self) -> Result<(), DeviceError> {
        let behavior = {
            let mut state = self.state();
            state.connect_calls += 1;
            state.connect
        };

        match behavior {
            ConnectBehavior::Succeed => Ok(()),
            ConnectBehavior::Fail => Err(DeviceError::Btle { source: btleplug::Error::DeviceNotFound }),
            ConnectBehavior::Hang => future::pending().await,
        }
    }

    async fn discover(&self) -> Result<Vec<CharacteristicRef>, DeviceError> {
        let mut state = self.state();
        state.discover_calls += 1;
        if state.discover_fails {
            return Err(DeviceError::Btle { source: btleplug::Error::RuntimeError("discovery failed".to_string()) });
        }
        Ok(state.characteristics.clone())
    }

    async fn is_connected(&self) -> Result<bool, DeviceError> {
        Ok(self.state().link_connected)
    }

    async fn disconnect(&self) -> Result<(), DeviceError> {
        let mut state = self.state();
        state.disconnect_calls += 1;
        if state.disconnect_fails {
            return Err(DeviceError::Btle { source: btleplug::Error::NotConnected });
        }
        Ok(())
    }

    async fn write_without_response(&self, characteristic: &CharacteristicRef, payload: &[u8]) -> Result<(), DeviceError> {
        self.state().writes.push((characteristic.uuid, payload.to_vec()));
        Ok(())
    }
}

/// Answers every permission request with the same status.
pub struct FixedPermissions {
    pub api_level: Option<u32>,
    pub status: PermissionStatus,
}

#[async_trait]
impl PermissionPrompter for FixedPermissions {
    fn api_level(&self) -> Option<u32> {
        self.api_level
    }

    async fn request(&self, permissions: &[Permission]) -> Result<PermissionResults, DeviceError> {
        Ok(permissions.iter().map(|permission| (*permission, self.status)).collect())
    }
}

pub fn event_channel() -> (Sender<SessionEvent>, Receiver<SessionEvent>) {
    channel(256)
}

pub fn connector(radio: &FakeRadio, connect_timeout: Option<Duration>) -> (ScannerConnector<FakeRadio>, Receiver<SessionEvent>, CancellationToken) {
    let (sender, receiver) = event_channel();
    let cancel = CancellationToken::new();
    let settings = ConnectorSettings { connect_timeout, ..ConnectorSettings::default() };
    let connector = ScannerConnector::new(Arc::new(radio.clone()), settings, cancel.clone(), sender);
    (connector, receiver, cancel)
}

/// Everything that was emitted so far.
pub fn drain(events: &mut Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut drained = Vec::new();
    while let Ok(Some(event)) = events.try_next() {
        drained.push(event);
    }
    drained
}

/// The published device states, in order.
pub fn device_states(events: &[SessionEvent]) -> Vec<DeviceState> {
    events.iter().filter_map(|event| match event {
        SessionEvent::Device(status) => Some(status.state),
        _ => None,
    }).collect()
}
