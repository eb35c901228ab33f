mod common;

use std::sync::Arc;
use futures::StreamExt;
use futures::channel::mpsc::channel;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

use midi_pad_remote::device::connection::ConnectorSettings;
use midi_pad_remote::device::permission::{PermissionOutcome, PermissionStatus};
use midi_pad_remote::device::types::{AdapterState, DeviceState, RadioEvent};
use midi_pad_remote::error::WriteError;
use midi_pad_remote::session::{Session, SessionSettings};
use midi_pad_remote::session::types::{SessionAction, SessionEvent};
use midi_pad_remote::surface::state::Control;

use common::*;

fn settings() -> SessionSettings {
    SessionSettings {
        connector: ConnectorSettings::default(),
        liveness_interval: Duration::from_millis(1000),
        api_level: Some(33),
    }
}

fn session(radio: &FakeRadio, status: PermissionStatus) -> (Session<FakeRadio>, futures::channel::mpsc::Receiver<SessionEvent>, CancellationToken) {
    let (sender, receiver) = event_channel();
    let cancel = CancellationToken::new();
    let permissions = Box::new(FixedPermissions { api_level: Some(33), status });
    let session = Session::new(Arc::new(radio.clone()), permissions, settings(), cancel.clone(), sender);
    (session, receiver, cancel)
}

async fn connected_session(radio: &FakeRadio) -> (Session<FakeRadio>, futures::channel::mpsc::Receiver<SessionEvent>) {
    let (mut session, mut events, _cancel) = session(radio, PermissionStatus::Granted);
    session.start().await;
    session.on_adapter_state(AdapterState::PoweredOn).await;
    session.on_radio_event(RadioEvent::DeviceFound(controller())).await;
    assert_eq!(session.connector().state(), DeviceState::Connected);
    drain(&mut events);
    (session, events)
}

fn assert_send<T: Send>(_: &T) {}

fn transmitted(events: &[SessionEvent]) -> Vec<String> {
    events.iter().filter_map(|event| match event {
        SessionEvent::Transmitted(command) => Some(command.to_string()),
        _ => None,
    }).collect()
}

#[tokio::test]
async fn start_reports_permissions_and_follows_the_adapter() {
    let radio = FakeRadio::new();
    let (mut session, mut events, _cancel) = session(&radio, PermissionStatus::Granted);

    session.start().await;
    assert!(session.monitor().is_subscribed());

    let emitted = drain(&mut events);
    assert!(matches!(emitted[0], SessionEvent::Permissions(PermissionOutcome::Granted)));
    assert!(matches!(emitted[1], SessionEvent::Surface(_)));
}

#[tokio::test]
async fn denied_permissions_are_not_fatal() {
    let radio = FakeRadio::new();
    let (mut session, mut events, _cancel) = session(&radio, PermissionStatus::NeverAskAgain);

    session.start().await;
    let emitted = drain(&mut events);
    assert!(matches!(emitted[0], SessionEvent::Permissions(PermissionOutcome::Denied)));

    // scanning is still attempted
    session.on_adapter_state(AdapterState::PoweredOn).await;
    assert_eq!(session.connector().state(), DeviceState::Scanning);
    assert_eq!(radio.state().start_scan_calls, 1);
}

#[tokio::test]
async fn pads_send_note_commands() {
    let radio = FakeRadio::new();
    let (mut session, mut events) = connected_session(&radio).await;

    session.on_action(SessionAction::SetControl(Control::Velocity, 0.5)).await;
    session.on_action(SessionAction::TogglePad(3)).await;
    session.on_action(SessionAction::TogglePad(3)).await;

    assert_eq!(radio.written(), vec!["O00003050", "F00003050"]);
    assert_eq!(transmitted(&drain(&mut events)), vec!["O00003050", "F00003050"]);
    assert!(!session.surface().note(3));
}

#[tokio::test]
async fn bank_offset_moves_the_note_index() {
    let radio = FakeRadio::new();
    let (mut session, _events) = connected_session(&radio).await;

    session.on_action(SessionAction::AdvanceBank).await;
    session.on_action(SessionAction::AdvanceBank).await;
    session.on_action(SessionAction::TogglePad(0)).await;

    assert_eq!(session.surface().bank_offset(), 2);
    assert_eq!(radio.written(), vec!["O00024000"]);
}

#[tokio::test]
async fn controls_send_their_commands() {
    let radio = FakeRadio::new();
    let (mut session, _events) = connected_session(&radio).await;

    session.on_action(SessionAction::SetControl(Control::MidiChannel, 3.0)).await;
    session.on_action(SessionAction::SetControl(Control::Aftertouch, 0.5)).await;
    session.on_action(SessionAction::SetControl(Control::ProgramChange, 7.0)).await;
    session.on_action(SessionAction::SetControl(Control::Channel, 7.0)).await;
    session.on_action(SessionAction::SetControl(Control::ChannelValue, 0.25)).await;
    session.on_action(SessionAction::SetControl(Control::PitchBend, 0.75)).await;

    // channel selection, MIDI channel and pitch bend only change local state
    assert_eq!(radio.written(), vec!["H03050", "R03007", "C03007025"]);
}

#[tokio::test]
async fn surface_changes_while_disconnected_are_not_sent() {
    let radio = FakeRadio::new();
    let (mut session, mut events, _cancel) = session(&radio, PermissionStatus::Granted);
    session.start().await;
    drain(&mut events);

    session.on_action(SessionAction::TogglePad(0)).await;

    assert!(session.surface().note(0));
    assert!(radio.written().is_empty());

    let emitted = drain(&mut events);
    assert!(transmitted(&emitted).is_empty());
    assert!(emitted.iter().any(|event| matches!(event, SessionEvent::Surface(surface) if surface.note(0))));

    let command = session.surface().clone().toggle_note(1);
    let result = session.transmit(command).await;
    assert!(matches!(result, Err(WriteError::NotConnected)));
}

#[tokio::test]
async fn connect_button_toggles_the_connection() {
    let radio = FakeRadio::new();
    let (mut session, _events, _cancel) = session(&radio, PermissionStatus::Granted);
    session.start().await;

    session.on_action(SessionAction::ToggleConnection).await;
    assert_eq!(session.connector().state(), DeviceState::Scanning);

    session.on_radio_event(RadioEvent::DeviceFound(controller())).await;
    assert!(session.connector().is_connected());

    session.on_action(SessionAction::ToggleConnection).await;
    assert_eq!(session.connector().state(), DeviceState::Idle);
    assert_eq!(radio.state().disconnect_calls, 1);
}

#[tokio::test]
async fn unconfirmed_connection_can_be_disconnected() {
    let radio = FakeRadio::new();
    radio.state().liveness_fails = true;
    let (mut session, _events, _cancel) = session(&radio, PermissionStatus::Granted);
    session.start().await;
    session.on_adapter_state(AdapterState::PoweredOn).await;
    session.on_radio_event(RadioEvent::DeviceFound(controller())).await;

    // the check after connecting failed, the connection stays but is not confirmed
    assert_eq!(session.connector().state(), DeviceState::Connected);
    assert!(!session.connector().is_connected());

    session.on_action(SessionAction::ToggleConnection).await;

    assert_eq!(session.connector().state(), DeviceState::Idle);
    assert_eq!(radio.state().disconnect_calls, 1);
    assert_eq!(radio.state().start_scan_calls, 1);
}

#[tokio::test]
async fn liveness_tick_notices_a_lost_peripheral() {
    let radio = FakeRadio::new();
    let (mut session, _events) = connected_session(&radio).await;

    radio.state().device_connected = false;
    session.on_liveness_tick().await;

    assert_eq!(session.connector().state(), DeviceState::Idle);
}

#[tokio::test]
async fn teardown_happens_once() {
    let radio = FakeRadio::new();
    let (mut session, mut events) = connected_session(&radio).await;

    session.teardown().await;
    session.teardown().await;

    assert_eq!(radio.state().release_calls, 1);
    assert_eq!(radio.state().disconnect_calls, 1);

    let ended = drain(&mut events).iter().filter(|event| matches!(event, SessionEvent::Ended)).count();
    assert_eq!(ended, 1);
}

async fn wait_for_state(events: &mut futures::channel::mpsc::Receiver<SessionEvent>, wanted: DeviceState) {
    timeout(Duration::from_secs(5), async {
        while let Some(event) = events.next().await {
            if matches!(&event, SessionEvent::Device(status) if status.state == wanted) {
                return;
            }
        }
        panic!("events ended before {:?}", wanted);
    }).await.unwrap();
}

#[tokio::test]
async fn run_connects_and_ends_on_cancel() {
    let radio = FakeRadio::new();
    let feed = radio.feed_radio_events();
    let (session, mut events, cancel) = session(&radio, PermissionStatus::Granted);
    let (_actions, action_receiver) = channel::<SessionAction>(16);

    let run = session.run(action_receiver);
    assert_send(&run);
    let task = tokio::spawn(run);

    wait_for_state(&mut events, DeviceState::Scanning).await;
    feed.unbounded_send(RadioEvent::DeviceFound(other_device())).unwrap();
    feed.unbounded_send(RadioEvent::DeviceFound(controller())).unwrap();
    wait_for_state(&mut events, DeviceState::Connected).await;

    cancel.cancel();
    timeout(Duration::from_secs(5), task).await.unwrap().unwrap();

    let emitted = drain(&mut events);
    assert!(matches!(emitted.last(), Some(SessionEvent::Ended)));
    assert_eq!(radio.state().connect_calls, 1);
    assert_eq!(radio.state().disconnect_calls, 1);
    assert_eq!(radio.state().release_calls, 1);
}

#[tokio::test]
async fn run_ends_when_the_actions_channel_closes() {
    let radio = FakeRadio::new();
    radio.state().adapter_state = AdapterState::PoweredOff;
    let (session, mut events, _cancel) = session(&radio, PermissionStatus::Granted);
    let (actions, action_receiver) = channel::<SessionAction>(16);
    drop(actions);

    timeout(Duration::from_secs(5), session.run(action_receiver)).await.unwrap();

    let emitted = drain(&mut events);
    assert!(matches!(emitted.last(), Some(SessionEvent::Ended)));
    assert_eq!(radio.state().release_calls, 1);
    assert_eq!(radio.state().start_scan_calls, 0);
}
