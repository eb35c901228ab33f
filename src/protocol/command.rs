//! The compact ASCII command format understood by the controller.
//!
//! A command is one opcode character followed by zero padded decimal fields without any
//! separator, e.g. `O02027050`: note on, MIDI channel 2, index 27, velocity 50.

use std::fmt;
use log::warn;

pub const CHANNEL_WIDTH: usize = 2;
pub const INDEX_WIDTH: usize = 3;
pub const VALUE_WIDTH: usize = 3;

/// How far one step of the bank offset shifts pad indices and slider ranges.
pub const BANK_STRIDE: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    NoteOn,
    NoteOff,
    Aftertouch,
    ProgramChange,
    ControllerValue,
}

impl Opcode {
    pub fn as_char(self) -> char {
        match self {
            Opcode::NoteOn => 'O',
            Opcode::NoteOff => 'F',
            Opcode::Aftertouch => 'H',
            Opcode::ProgramChange => 'R',
            Opcode::ControllerValue => 'C',
        }
    }
}

/// A decimal field of fixed width. Values that do not fit are clamped into `0..10^width`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    value: u32,
    width: usize,
}

impl Field {
    pub fn new(value: i64, width: usize) -> Self {
        let max = 10_i64.pow(width as u32) - 1;
        let clamped = value.clamp(0, max);

        if clamped != value {
            warn!("Value {} does not fit in {} digits, sending {} instead", value, width, clamped);
        }

        Field { value: clamped as u32, width }
    }

    /// A value in `[0, 1]` sent as a percentage, truncated.
    pub fn percent(value: f32, width: usize) -> Self {
        Field::new(truncate(value * 100.0), width)
    }

    /// A raw value, truncated.
    pub fn whole(value: f32, width: usize) -> Self {
        Field::new(truncate(value), width)
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

// `as` saturates at the integer bounds and maps NaN to 0
fn truncate(value: f32) -> i64 {
    value.trunc() as i64
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    opcode: Opcode,
    fields: Vec<Field>,
}

impl Command {
    pub fn new(opcode: Opcode, fields: Vec<Field>) -> Self {
        Command { opcode, fields }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode.as_char())?;
        for field in &self.fields {
            write!(f, "{:0width$}", field.value, width = field.width)?;
        }
        Ok(())
    }
}

/// Everything besides the event itself that ends up in a command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeContext {
    pub midi_channel: u8,
    // doubles as the controller index of ControllerValue
    pub channel: u8,
    pub bank_offset: u8,
    pub velocity: f32,
}

impl Default for EncodeContext {
    fn default() -> Self {
        EncodeContext {
            midi_channel: 0,
            channel: 0,
            bank_offset: 0,
            velocity: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    NoteToggle { pad: usize, on: bool },
    Aftertouch(f32),
    ProgramChange(f32),
    ControllerValue(f32),
    Velocity(f32),
    PitchBend(f32),
    MidiChannel(f32),
    Channel(f32),
}

/// Encodes an event. Events that only change local state (velocity, pitch bend, MIDI channel
/// and channel selection) produce no command.
pub fn encode(event: ControlEvent, context: &EncodeContext) -> Option<Command> {
    let channel = Field::new(i64::from(context.midi_channel), CHANNEL_WIDTH);

    match event {
        ControlEvent::NoteToggle { pad, on } => {
            let index = pad as i64 + i64::from(context.bank_offset) * i64::from(BANK_STRIDE);
            let opcode = if on { Opcode::NoteOn } else { Opcode::NoteOff };

            Some(Command::new(opcode, vec![
                channel,
                Field::new(index, INDEX_WIDTH),
                Field::percent(context.velocity, VALUE_WIDTH),
            ]))
        },
        ControlEvent::Aftertouch(value) => Some(Command::new(Opcode::Aftertouch, vec![
            channel,
            Field::percent(value, VALUE_WIDTH),
        ])),
        ControlEvent::ProgramChange(value) => Some(Command::new(Opcode::ProgramChange, vec![
            channel,
            Field::whole(value, VALUE_WIDTH),
        ])),
        ControlEvent::ControllerValue(value) => Some(Command::new(Opcode::ControllerValue, vec![
            channel,
            Field::new(i64::from(context.channel), INDEX_WIDTH),
            Field::percent(value, VALUE_WIDTH),
        ])),
        ControlEvent::Velocity(_)
        | ControlEvent::PitchBend(_)
        | ControlEvent::MidiChannel(_)
        | ControlEvent::Channel(_) => None,
    }
}
