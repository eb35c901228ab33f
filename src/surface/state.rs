use std::ops::RangeInclusive;
use log::{debug, warn};

use crate::protocol::command::{encode, Command, ControlEvent, EncodeContext, BANK_STRIDE};

pub const PAD_COUNT: usize = 16;
pub const MAX_BANK_OFFSET: u8 = 9;
pub const MAX_CHANNEL: u8 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    PitchBend,
    Channel,
    ChannelValue,
    Aftertouch,
    ProgramChange,
    Velocity,
    MidiChannel,
}

impl Control {
    pub const ALL: [Control; 7] = [
        Control::PitchBend,
        Control::Channel,
        Control::ChannelValue,
        Control::Aftertouch,
        Control::ProgramChange,
        Control::Velocity,
        Control::MidiChannel,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Control::PitchBend => "Pitch Bend",
            Control::Channel => "Channel Control",
            Control::ChannelValue => "Channel Value",
            Control::Aftertouch => "Aftertouch",
            Control::ProgramChange => "Program Change",
            Control::Velocity => "Velocity",
            Control::MidiChannel => "MIDI Channel",
        }
    }

    /// Whether the control holds a value in `[0, 1]` rather than a whole number.
    pub fn is_normalized(self) -> bool {
        !matches!(self, Control::Channel | Control::ProgramChange | Control::MidiChannel)
    }

    /// Velocity follows the slider while it is dragged, everything else is applied on release.
    pub fn applies_while_dragging(self) -> bool {
        self == Control::Velocity
    }
}

/// The musical state of the control surface. It is independent of the connection: it can be
/// changed while disconnected, the resulting commands are simply not delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlSurfaceState {
    note_states: [bool; PAD_COUNT],
    channel: u8,
    midi_channel: u8,
    velocity: f32,
    aftertouch: f32,
    program_change: u8,
    pitch_bend: f32,
    channel_value: f32,
    bank_offset: u8,
}

impl Default for ControlSurfaceState {
    fn default() -> Self {
        ControlSurfaceState {
            note_states: [false; PAD_COUNT],
            channel: 0,
            midi_channel: 0,
            velocity: 0.0,
            aftertouch: 0.0,
            program_change: 0,
            pitch_bend: 0.0,
            channel_value: 0.0,
            bank_offset: 0,
        }
    }
}

fn whole(value: f32) -> u8 {
    // `as` truncates and maps NaN to 0
    value.clamp(0.0, f32::from(MAX_CHANNEL)) as u8
}

impl ControlSurfaceState {
    pub fn note_states(&self) -> &[bool; PAD_COUNT] {
        &self.note_states
    }

    pub fn note(&self, pad: usize) -> bool {
        self.note_states.get(pad).copied().unwrap_or(false)
    }

    pub fn bank_offset(&self) -> u8 {
        self.bank_offset
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn midi_channel(&self) -> u8 {
        self.midi_channel
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn value(&self, control: Control) -> f32 {
        match control {
            Control::PitchBend => self.pitch_bend,
            Control::Channel => f32::from(self.channel),
            Control::ChannelValue => self.channel_value,
            Control::Aftertouch => self.aftertouch,
            Control::ProgramChange => f32::from(self.program_change),
            Control::Velocity => self.velocity,
            Control::MidiChannel => f32::from(self.midi_channel),
        }
    }

    pub fn context(&self) -> EncodeContext {
        EncodeContext {
            midi_channel: self.midi_channel,
            channel: self.channel,
            bank_offset: self.bank_offset,
            velocity: self.velocity,
        }
    }

    /// The range a control's slider covers with the current bank offset.
    pub fn range(&self, control: Control) -> RangeInclusive<f32> {
        let base = f32::from(self.bank_offset * BANK_STRIDE);
        match control {
            Control::Channel | Control::MidiChannel => base..=base + 12.0,
            Control::ProgramChange => base..=base + 9.0,
            _ => 0.0..=1.0,
        }
    }

    /// The 1 based number shown on a pad.
    pub fn pad_label(&self, pad: usize) -> usize {
        pad + 1 + usize::from(self.bank_offset) * usize::from(BANK_STRIDE)
    }

    /// Flips a pad and returns the note on/off command for its new state.
    pub fn toggle_note(&mut self, pad: usize) -> Option<Command> {
        let Some(note) = self.note_states.get_mut(pad) else {
            warn!("There is no pad {}", pad);
            return None;
        };

        *note = !*note;
        let on = *note;
        encode(ControlEvent::NoteToggle { pad, on }, &self.context())
    }

    /// Stores a control value and returns the command to send, if the control sends any.
    pub fn set_control(&mut self, control: Control, value: f32) -> Option<Command> {
        let normalized = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };

        let event = match control {
            Control::PitchBend => {
                self.pitch_bend = normalized;
                ControlEvent::PitchBend(normalized)
            },
            Control::Channel => {
                self.channel = whole(value);
                ControlEvent::Channel(f32::from(self.channel))
            },
            Control::ChannelValue => {
                self.channel_value = normalized;
                ControlEvent::ControllerValue(normalized)
            },
            Control::Aftertouch => {
                self.aftertouch = normalized;
                ControlEvent::Aftertouch(normalized)
            },
            Control::ProgramChange => {
                self.program_change = whole(value);
                ControlEvent::ProgramChange(f32::from(self.program_change))
            },
            Control::Velocity => {
                self.velocity = normalized;
                ControlEvent::Velocity(normalized)
            },
            Control::MidiChannel => {
                self.midi_channel = whole(value);
                ControlEvent::MidiChannel(f32::from(self.midi_channel))
            },
        };

        encode(event, &self.context())
    }

    /// Moves to the next bank, wrapping from the last bank back to the first.
    pub fn advance_bank(&mut self) {
        self.bank_offset = if self.bank_offset < MAX_BANK_OFFSET { self.bank_offset + 1 } else { 0 };
        debug!("Bank offset is now {}", self.bank_offset);
    }
}
