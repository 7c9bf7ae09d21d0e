//! Input event records.
//!
//! On the wire an input batch is a JSON array of positional records,
//! `[event_type, ...]`, with a per-type arity. In memory each record is a
//! tagged variant with named fields; the deserializer validates arity and
//! field types by construction, so a decoded event is always well-formed.

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const EVENT_MOUSE_MOVE: u8 = 0;
pub const EVENT_MOUSE_DOWN: u8 = 1;
pub const EVENT_MOUSE_UP: u8 = 2;
pub const EVENT_MOUSE_SCROLL: u8 = 3;
pub const EVENT_KEY_DOWN: u8 = 4;
pub const EVENT_KEY_UP: u8 = 5;

/// Mouse button codes as sent by the client: 1 = left, 2 = middle, 3 = right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

impl MouseButton {
    /// Map a wire code to a button. Out-of-range codes are an input error
    /// (the event is dropped), not a protocol error.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Left),
            2 => Some(Self::Middle),
            3 => Some(Self::Right),
            _ => None,
        }
    }
}

/// One remote input event. Coordinates are client-viewport pixels; the
/// dispatcher scales them to the host display. Key names are symbolic and
/// already normalized to the synthesizer's vocabulary by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    MouseMove { x: i32, y: i32 },
    MouseDown { x: i32, y: i32, button: u8 },
    MouseUp { x: i32, y: i32, button: u8 },
    /// `dy > 0` scrolls up, `dy < 0` scrolls down; magnitude is in notches.
    MouseScroll { x: i32, y: i32, dy: i32 },
    KeyDown { key: String },
    KeyUp { key: String },
}

impl Serialize for InputEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            InputEvent::MouseMove { x, y } => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&EVENT_MOUSE_MOVE)?;
                seq.serialize_element(x)?;
                seq.serialize_element(y)?;
                seq.end()
            }
            InputEvent::MouseDown { x, y, button } => {
                let mut seq = serializer.serialize_seq(Some(4))?;
                seq.serialize_element(&EVENT_MOUSE_DOWN)?;
                seq.serialize_element(x)?;
                seq.serialize_element(y)?;
                seq.serialize_element(button)?;
                seq.end()
            }
            InputEvent::MouseUp { x, y, button } => {
                let mut seq = serializer.serialize_seq(Some(4))?;
                seq.serialize_element(&EVENT_MOUSE_UP)?;
                seq.serialize_element(x)?;
                seq.serialize_element(y)?;
                seq.serialize_element(button)?;
                seq.end()
            }
            InputEvent::MouseScroll { x, y, dy } => {
                let mut seq = serializer.serialize_seq(Some(4))?;
                seq.serialize_element(&EVENT_MOUSE_SCROLL)?;
                seq.serialize_element(x)?;
                seq.serialize_element(y)?;
                seq.serialize_element(dy)?;
                seq.end()
            }
            InputEvent::KeyDown { key } => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&EVENT_KEY_DOWN)?;
                seq.serialize_element(key)?;
                seq.end()
            }
            InputEvent::KeyUp { key } => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&EVENT_KEY_UP)?;
                seq.serialize_element(key)?;
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for InputEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EventVisitor;

        impl<'de> Visitor<'de> for EventVisitor {
            type Value = InputEvent;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a positional input event record [event_type, ...]")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<InputEvent, A::Error> {
                fn field<'de, A: SeqAccess<'de>, T: Deserialize<'de>>(
                    seq: &mut A,
                    index: usize,
                ) -> Result<T, A::Error> {
                    seq.next_element()?
                        .ok_or_else(|| de::Error::invalid_length(index, &"a complete event record"))
                }

                let event_type: u8 = field(&mut seq, 0)?;
                let event = match event_type {
                    EVENT_MOUSE_MOVE => InputEvent::MouseMove {
                        x: field(&mut seq, 1)?,
                        y: field(&mut seq, 2)?,
                    },
                    EVENT_MOUSE_DOWN => InputEvent::MouseDown {
                        x: field(&mut seq, 1)?,
                        y: field(&mut seq, 2)?,
                        button: field(&mut seq, 3)?,
                    },
                    EVENT_MOUSE_UP => InputEvent::MouseUp {
                        x: field(&mut seq, 1)?,
                        y: field(&mut seq, 2)?,
                        button: field(&mut seq, 3)?,
                    },
                    EVENT_MOUSE_SCROLL => InputEvent::MouseScroll {
                        x: field(&mut seq, 1)?,
                        y: field(&mut seq, 2)?,
                        dy: field(&mut seq, 3)?,
                    },
                    EVENT_KEY_DOWN => InputEvent::KeyDown {
                        key: field(&mut seq, 1)?,
                    },
                    EVENT_KEY_UP => InputEvent::KeyUp {
                        key: field(&mut seq, 1)?,
                    },
                    other => {
                        return Err(de::Error::custom(format!("unknown event type {other}")));
                    }
                };

                // Exact arity: trailing fields are a schema violation.
                if seq.next_element::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::custom("trailing fields in event record"));
                }
                Ok(event)
            }
        }

        deserializer.deserialize_seq(EventVisitor)
    }
}
