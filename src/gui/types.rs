use iced::Event;

use crate::config::types::Config;
use crate::session::types::SessionEvent;
use crate::surface::state::Control;

#[derive(Debug, Clone)]
pub enum Message {
    EventOccurred(Event),
    ConfigLoadComplete((Config, Option<String>)),
    Session(SessionEvent),
    NoticeConfirmed,
    ConnectPressed,
    PadPressed(usize),
    SliderChanged(Control, f32),
    SliderReleased(Control),
    AdvanceBankPressed,
}
