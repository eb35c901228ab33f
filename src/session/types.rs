use futures::channel::mpsc::Sender;

use crate::device::permission::PermissionOutcome;
use crate::device::types::DeviceStatus;
use crate::protocol::command::Command;
use crate::surface::state::{Control, ControlSurfaceState};

/// Something the user did.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    ToggleConnection,
    TogglePad(usize),
    SetControl(Control, f32),
    AdvanceBank,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    // actions for the session are sent to this channel
    Ready(Sender<SessionAction>),
    AdapterUnavailable(String),
    Permissions(PermissionOutcome),
    Device(DeviceStatus),
    Surface(ControlSurfaceState),
    Transmitted(Command),
    // teardown has completed
    Ended,
}
