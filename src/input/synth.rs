//! enigo-backed OS input synthesizer.
//!
//! Key names arrive pre-translated by the browser client; this module only
//! maps them onto the `enigo` vocabulary. Anything unmapped is an input
//! error for the dispatcher to drop.

use anyhow::Result;
use enigo::{Axis, Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

use super::Synthesizer;
use crate::protocol::MouseButton;

pub struct EnigoSynthesizer {
    enigo: Option<Enigo>,
}

impl EnigoSynthesizer {
    /// The OS connection is established lazily on first use, so sessions
    /// that never dispatch input (viewers, or clients that only watch)
    /// work on hosts without an input backend.
    pub fn new() -> Self {
        Self { enigo: None }
    }

    fn backend(&mut self) -> Result<&mut Enigo> {
        if self.enigo.is_none() {
            let enigo = Enigo::new(&Settings::default())
                .map_err(|e| anyhow::anyhow!("input synthesizer init failed: {e}"))?;
            self.enigo = Some(enigo);
        }
        Ok(self.enigo.as_mut().expect("initialized above"))
    }
}

impl Default for EnigoSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

fn direction(pressed: bool) -> Direction {
    if pressed {
        Direction::Press
    } else {
        Direction::Release
    }
}

impl Synthesizer for EnigoSynthesizer {
    fn display_size(&mut self) -> Result<(u32, u32)> {
        let (w, h) = self
            .backend()?
            .main_display()
            .map_err(|e| anyhow::anyhow!("display size query failed: {e}"))?;
        Ok((w as u32, h as u32))
    }

    fn mouse_move(&mut self, x: i32, y: i32) -> Result<()> {
        self.backend()?
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| anyhow::anyhow!("mouse move failed: {e}"))
    }

    fn mouse_button(&mut self, x: i32, y: i32, button: MouseButton, pressed: bool) -> Result<()> {
        self.mouse_move(x, y)?;
        let button = match button {
            MouseButton::Left => Button::Left,
            MouseButton::Middle => Button::Middle,
            MouseButton::Right => Button::Right,
        };
        self.backend()?
            .button(button, direction(pressed))
            .map_err(|e| anyhow::anyhow!("mouse button failed: {e}"))
    }

    fn mouse_scroll(&mut self, x: i32, y: i32, notches: i32) -> Result<()> {
        self.mouse_move(x, y)?;
        // The wire is positive-up; enigo's vertical axis is positive-down.
        self.backend()?
            .scroll(-notches, Axis::Vertical)
            .map_err(|e| anyhow::anyhow!("scroll failed: {e}"))
    }

    fn key(&mut self, name: &str, pressed: bool) -> Result<()> {
        let key =
            key_from_name(name).ok_or_else(|| anyhow::anyhow!("unknown key name {name:?}"))?;
        self.backend()?
            .key(key, direction(pressed))
            .map_err(|e| anyhow::anyhow!("key event failed: {e}"))
    }
}

/// Map a symbolic client key name onto the synthesizer vocabulary.
/// Single-character names become unicode key events.
fn key_from_name(name: &str) -> Option<Key> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(Key::Unicode(c));
    }

    let key = match name.to_ascii_lowercase().as_str() {
        "enter" | "return" => Key::Return,
        "escape" | "esc" => Key::Escape,
        "tab" => Key::Tab,
        "space" => Key::Space,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        "up" | "arrowup" => Key::UpArrow,
        "down" | "arrowdown" => Key::DownArrow,
        "left" | "arrowleft" => Key::LeftArrow,
        "right" | "arrowright" => Key::RightArrow,
        "shift" => Key::Shift,
        "control" | "ctrl" => Key::Control,
        "alt" => Key::Alt,
        "meta" | "super" | "command" => Key::Meta,
        "capslock" => Key::CapsLock,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        _ => return None,
    };
    Some(key)
}
