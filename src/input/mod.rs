//! Remote input dispatch.
//!
//! Decoded batches arrive from the session reader; the dispatcher gates
//! them on the session role, scales viewport coordinates to the host
//! display, rate-limits, and drives the OS input synthesizer.

pub mod synth;

use anyhow::Result;
use std::time::Instant;

use crate::protocol::{InputEvent, MouseButton, Role};

/// Seam to the OS input synthesizer. The production implementation wraps
/// `enigo`; tests record calls instead.
pub trait Synthesizer: Send {
    /// Current host display size in pixels.
    fn display_size(&mut self) -> Result<(u32, u32)>;
    fn mouse_move(&mut self, x: i32, y: i32) -> Result<()>;
    fn mouse_button(&mut self, x: i32, y: i32, button: MouseButton, pressed: bool) -> Result<()>;
    /// Positive notches scroll up, negative down.
    fn mouse_scroll(&mut self, x: i32, y: i32, notches: i32) -> Result<()>;
    /// Fails when `name` is outside the synthesizer vocabulary.
    fn key(&mut self, name: &str, pressed: bool) -> Result<()>;
}

/// Token bucket over dispatched events. Capacity equals the rate, so at
/// most one second's budget is admitted as a burst.
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    rate: f64,
    refilled_at: Instant,
}

impl TokenBucket {
    fn new(rate: u32) -> Self {
        Self {
            capacity: rate as f64,
            tokens: rate as f64,
            rate: rate as f64,
            refilled_at: Instant::now(),
        }
    }

    /// How many whole events fit into the current budget.
    fn available(&mut self) -> usize {
        let now = Instant::now();
        let elapsed = now.duration_since(self.refilled_at).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.refilled_at = now;
        self.tokens as usize
    }

    fn take(&mut self, count: usize) {
        self.tokens -= count as f64;
    }
}

/// Per-session input dispatcher.
pub struct Dispatcher {
    synth: Box<dyn Synthesizer>,
    role: Role,
    bucket: TokenBucket,
}

impl Dispatcher {
    pub fn new(synth: Box<dyn Synthesizer>, role: Role, max_ips: u32) -> Self {
        Self {
            synth,
            role,
            bucket: TokenBucket::new(max_ips),
        }
    }

    /// Dispatch one decoded batch in receipt order. `viewport` is the most
    /// recent client viewport, used to scale coordinates onto the host
    /// display.
    ///
    /// Viewer batches are discarded without side effects. Events beyond the
    /// rate budget are dropped oldest-first within the batch. A failing
    /// event (unknown key, synthesizer error) is dropped and the batch
    /// continues.
    pub fn dispatch(&mut self, mut events: Vec<InputEvent>, viewport: Option<(u16, u16)>) {
        if self.role != Role::Controller {
            return;
        }
        let Some(viewport) = viewport else {
            // No viewport negotiated yet, so coordinates cannot be mapped.
            log::debug!("dropping {} input events before first frame request", events.len());
            return;
        };

        let available = self.bucket.available();
        if events.len() > available {
            let dropped = events.len() - available;
            log::debug!("input rate cap reached, dropping {dropped} oldest events");
            events.drain(..dropped);
        }
        self.bucket.take(events.len());

        for event in events {
            if let Err(e) = self.apply(event, viewport) {
                log::debug!("input event dropped: {e:#}");
            }
        }
    }

    fn apply(&mut self, event: InputEvent, viewport: (u16, u16)) -> Result<()> {
        match event {
            InputEvent::MouseMove { x, y } => {
                let (hx, hy) = self.scale(x, y, viewport)?;
                self.synth.mouse_move(hx, hy)
            }
            InputEvent::MouseDown { x, y, button } => {
                let button = MouseButton::from_code(button)
                    .ok_or_else(|| anyhow::anyhow!("unknown mouse button {button}"))?;
                let (hx, hy) = self.scale(x, y, viewport)?;
                self.synth.mouse_button(hx, hy, button, true)
            }
            InputEvent::MouseUp { x, y, button } => {
                let button = MouseButton::from_code(button)
                    .ok_or_else(|| anyhow::anyhow!("unknown mouse button {button}"))?;
                let (hx, hy) = self.scale(x, y, viewport)?;
                self.synth.mouse_button(hx, hy, button, false)
            }
            InputEvent::MouseScroll { x, y, dy } => {
                let (hx, hy) = self.scale(x, y, viewport)?;
                self.synth.mouse_scroll(hx, hy, dy)
            }
            InputEvent::KeyDown { key } => self.synth.key(&key, true),
            InputEvent::KeyUp { key } => self.synth.key(&key, false),
        }
    }

    /// Linear viewport-to-host scaling, rounded to nearest and clamped to
    /// the display bounds.
    fn scale(&mut self, x: i32, y: i32, viewport: (u16, u16)) -> Result<(i32, i32)> {
        let (host_w, host_h) = self.synth.display_size()?;
        let sx = (x as f64 * host_w as f64 / viewport.0 as f64).round() as i32;
        let sy = (y as f64 * host_h as f64 / viewport.1 as f64).round() as i32;
        Ok((
            sx.clamp(0, host_w as i32 - 1),
            sy.clamp(0, host_h as i32 - 1),
        ))
    }
}
