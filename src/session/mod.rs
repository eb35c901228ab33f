use std::any::TypeId;
use std::convert::Infallible;
use std::sync::Arc;
use futures::{future, stream, SinkExt, StreamExt};
use futures::channel::mpsc::{channel, Receiver, Sender};
use iced::subscription::{self, Subscription};
use log::{debug, error, info, warn};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::device::btle::BtleRadio;
use crate::device::connection::{ConnectorSettings, ScannerConnector};
use crate::device::monitor::AdapterMonitor;
use crate::device::permission::{request_permissions, AdapterPermissions, PermissionOutcome, PermissionPrompter};
use crate::device::transport::Radio;
use crate::device::types::{AdapterState, RadioEvent};
use crate::error::WriteError;
use crate::protocol::command::Command;
use crate::protocol::writer::CharacteristicWriter;
use crate::session::types::{SessionAction, SessionEvent};
use crate::surface::state::ControlSurfaceState;

pub mod types;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub connector: ConnectorSettings,
    pub liveness_interval: Duration,
    pub api_level: Option<u32>,
}

enum Input {
    Adapter(AdapterState),
    Radio(RadioEvent),
    Action(SessionAction),
    Liveness,
}

/// One run of the application: the connection to the controller plus the control surface.
///
/// Everything happens on the task that drives [`Session::run`]; handlers are awaited one at a
/// time, so a transition of the connector is never interleaved with another one.
pub struct Session<R: Radio> {
    radio: Arc<R>,
    permissions: Box<dyn PermissionPrompter>,
    monitor: AdapterMonitor<R>,
    connector: ScannerConnector<R>,
    writer: CharacteristicWriter,
    surface: ControlSurfaceState,
    events: Sender<SessionEvent>,
    cancel: CancellationToken,
    liveness_interval: Duration,
    ended: bool,
}

impl<R: Radio> Session<R> {
    pub fn new(
        radio: Arc<R>,
        permissions: Box<dyn PermissionPrompter>,
        settings: SessionSettings,
        cancel: CancellationToken,
        events: Sender<SessionEvent>,
    ) -> Self {
        let writer = CharacteristicWriter::from_settings(&settings.connector);
        let connector = ScannerConnector::new(radio.clone(), settings.connector, cancel.clone(), events.clone());

        Session {
            monitor: AdapterMonitor::new(radio.clone()),
            radio,
            permissions,
            connector,
            writer,
            surface: ControlSurfaceState::default(),
            events,
            cancel,
            liveness_interval: settings.liveness_interval,
            ended: false,
        }
    }

    pub fn surface(&self) -> &ControlSurfaceState {
        &self.surface
    }

    pub fn connector(&self) -> &ScannerConnector<R> {
        &self.connector
    }

    pub fn monitor(&self) -> &AdapterMonitor<R> {
        &self.monitor
    }

    /// Requests permissions, then starts following the adapter. A denial is not fatal, scanning
    /// is attempted anyway.
    pub async fn start(&mut self) {
        let outcome = request_permissions(self.permissions.as_ref()).await;
        self.emit(SessionEvent::Permissions(outcome)).await;
        self.emit(SessionEvent::Surface(self.surface.clone())).await;

        if let Err(err) = self.monitor.subscribe().await {
            error!("Could not follow the adapter state: {}", err);
            self.emit(SessionEvent::AdapterUnavailable(err.to_string())).await;
        }
    }

    pub async fn on_adapter_state(&mut self, state: AdapterState) {
        self.monitor.apply(state, &mut self.connector).await;
    }

    pub async fn on_radio_event(&mut self, event: RadioEvent) {
        match event {
            RadioEvent::DeviceFound(device) => self.connector.on_device_found(device).await,
            RadioEvent::DeviceDisconnected(id) => self.connector.on_peripheral_disconnected(&id).await,
        }
    }

    pub async fn on_action(&mut self, action: SessionAction) {
        match action {
            SessionAction::ToggleConnection => {
                // a connection whose liveness is still unconfirmed can be disconnected too
                if self.connector.handle().is_some() {
                    self.connector.request_disconnect().await;
                } else {
                    self.connector.start_scan().await;
                }
            },
            SessionAction::TogglePad(pad) => {
                let command = self.surface.toggle_note(pad);
                self.emit(SessionEvent::Surface(self.surface.clone())).await;
                let _ = self.transmit(command).await;
            },
            SessionAction::SetControl(control, value) => {
                let command = self.surface.set_control(control, value);
                self.emit(SessionEvent::Surface(self.surface.clone())).await;
                let _ = self.transmit(command).await;
            },
            SessionAction::AdvanceBank => {
                self.surface.advance_bank();
                self.emit(SessionEvent::Surface(self.surface.clone())).await;
            },
        }
    }

    pub async fn on_liveness_tick(&mut self) {
        self.connector.refresh_liveness().await;
    }

    /// Sends a command over the current connection. Failing to send is logged and otherwise
    /// ignored; there is no queue and no retry.
    pub async fn transmit(&mut self, command: Option<Command>) -> Result<(), WriteError> {
        let Some(command) = command else {
            return Ok(());
        };

        match self.writer.write(self.connector.handle(), &command).await {
            Ok(()) => {
                info!("Message written to characteristic: {}", command);
                self.emit(SessionEvent::Transmitted(command)).await;
                Ok(())
            },
            Err(WriteError::NotConnected) => {
                debug!("Not connected, dropping {}", command);
                Err(WriteError::NotConnected)
            },
            Err(err) => {
                warn!("Failed to send {}: {}", command, err);
                Err(err)
            },
        }
    }

    /// Stops scanning, releases the connection and the adapter. Safe to call repeatedly.
    pub async fn teardown(&mut self) {
        if self.ended {
            return;
        }

        info!("Ending session");
        self.connector.teardown().await;
        self.monitor.teardown();
        self.ended = true;
        self.emit(SessionEvent::Ended).await;
    }

    pub async fn run(mut self, mut actions: Receiver<SessionAction>) {
        self.start().await;

        let mut radio_events = match self.radio.device_events().await {
            Ok(events) => events.fuse(),
            Err(err) => {
                error!("Could not follow advertisements: {}", err);
                stream::pending().boxed().fuse()
            },
        };

        let mut liveness = interval(self.liveness_interval);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let cancel = self.cancel.clone();

        loop {
            let input = tokio::select! {
                _ = cancel.cancelled() => break,
                Some(state) = self.monitor.next_state() => Input::Adapter(state),
                Some(event) = radio_events.next() => Input::Radio(event),
                action = actions.next() => match action {
                    Some(action) => Input::Action(action),
                    None => {
                        info!("No more actions will arrive");
                        break;
                    },
                },
                _ = liveness.tick() => Input::Liveness,
            };

            match input {
                Input::Adapter(state) => self.on_adapter_state(state).await,
                Input::Radio(event) => self.on_radio_event(event).await,
                Input::Action(action) => self.on_action(action).await,
                Input::Liveness => self.on_liveness_tick().await,
            }
        }

        self.teardown().await;
    }

    async fn emit(&mut self, event: SessionEvent) {
        if let Err(err) = self.events.send(event).await {
            debug!("Session event not delivered: {}", err);
        }
    }
}

async fn run_btle_session(settings: SessionSettings, cancel: CancellationToken, mut output: Sender<SessionEvent>) {
    let radio = match BtleRadio::new().await {
        Ok(radio) => Arc::new(radio),
        Err(err) => {
            error!("Bluetooth is not available: {}", err);
            if err.is_permission_denied() {
                let _ = output.send(SessionEvent::Permissions(PermissionOutcome::Denied)).await;
            }
            let _ = output.send(SessionEvent::AdapterUnavailable(err.to_string())).await;
            let _ = output.send(SessionEvent::Ended).await;
            return;
        },
    };

    let (action_sender, action_receiver) = channel::<SessionAction>(64);
    if output.send(SessionEvent::Ready(action_sender)).await.is_err() {
        return;
    }

    let permissions = Box::new(AdapterPermissions::new(settings.api_level));
    let session = Session::new(radio, permissions, settings, cancel, output);
    session.run(action_receiver).await;
}

pub fn session_subscription(settings: SessionSettings, cancel: CancellationToken) -> Subscription<SessionEvent> {
    struct Worker;

    subscription::channel(
        TypeId::of::<Worker>(),
        64,
        move |output| {
            let settings = settings.clone();
            let cancel = cancel.clone();

            async move {
                run_btle_session(settings, cancel, output).await;

                // note: subscription::channel expects the future to never resolve (Infallible)
                future::pending::<Infallible>().await
            }
        },
    )
}
