//! Display capture.
//!
//! `scrap::Capturer` is not `Send` on X11, so each session runs its grabber
//! on a dedicated thread and requests frames over a channel. The session
//! task stays suspendable while a grab is in flight, and an idle session
//! (no pending frame request) performs no captures at all.

use anyhow::{Context, Result};
use scrap::{Capturer, Display};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

use super::Frame;

/// A blocking source of desktop frames.
pub trait Grabber {
    fn grab(&mut self) -> Result<Frame>;
}

struct Screen {
    capturer: Capturer,
    width: usize,
    height: usize,
}

/// scrap-backed grabber over one or more displays. Multiple displays are
/// composited left to right on a canvas of summed width and maximum height.
pub struct ScrapGrabber {
    screens: Vec<Screen>,
    canvas_width: u32,
    canvas_height: u32,
}

impl ScrapGrabber {
    /// Primary display only, or the union of all displays.
    pub fn open(fullscreen: bool) -> Result<Self> {
        if fullscreen {
            let displays = Display::all().context("cannot enumerate displays")?;
            anyhow::ensure!(!displays.is_empty(), "no displays found");
            Self::from_displays(displays)
        } else {
            let display = Display::primary().context("no primary display")?;
            Self::from_displays(vec![display])
        }
    }

    fn from_displays(displays: Vec<Display>) -> Result<Self> {
        let mut screens = Vec::with_capacity(displays.len());
        let mut canvas_width = 0u32;
        let mut canvas_height = 0u32;
        for display in displays {
            let width = display.width();
            let height = display.height();
            let capturer = Capturer::new(display).context("failed to start capturer")?;
            canvas_width += width as u32;
            canvas_height = canvas_height.max(height as u32);
            screens.push(Screen {
                capturer,
                width,
                height,
            });
        }
        Ok(Self {
            screens,
            canvas_width,
            canvas_height,
        })
    }

    fn grab_screen(screen: &mut Screen) -> Result<Vec<u8>> {
        let deadline = Instant::now() + Duration::from_secs(1);
        loop {
            match screen.capturer.frame() {
                Ok(frame) => {
                    // scrap yields BGRA; the row stride may include padding.
                    let stride = frame.len() / screen.height;
                    return Ok(bgra_to_rgb(&frame, screen.width, screen.height, stride));
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        anyhow::bail!("display frame not ready");
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(e) => return Err(e).context("display capture failed"),
            }
        }
    }
}

impl Grabber for ScrapGrabber {
    fn grab(&mut self) -> Result<Frame> {
        if self.screens.len() == 1 {
            let screen = &mut self.screens[0];
            let rgb = Self::grab_screen(screen)?;
            return Ok(Frame::new(screen.width as u32, screen.height as u32, rgb));
        }

        let mut canvas = Frame::solid(self.canvas_width, self.canvas_height, [0, 0, 0]);
        let mut x_offset = 0u32;
        for screen in &mut self.screens {
            let rgb = Self::grab_screen(screen)?;
            let row_bytes = screen.width * 3;
            for y in 0..screen.height as u32 {
                let src_start = y as usize * row_bytes;
                let dst_start = canvas.offset(x_offset, y);
                canvas.pixels[dst_start..dst_start + row_bytes]
                    .copy_from_slice(&rgb[src_start..src_start + row_bytes]);
            }
            x_offset += screen.width as u32;
        }
        Ok(canvas)
    }
}

/// Convert a strided BGRA buffer to tightly packed RGB.
fn bgra_to_rgb(bgra: &[u8], width: usize, height: usize, stride: usize) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        let row = y * stride;
        for x in 0..width {
            let offset = row + x * 4;
            if offset + 2 < bgra.len() {
                rgb.push(bgra[offset + 2]);
                rgb.push(bgra[offset + 1]);
                rgb.push(bgra[offset]);
            } else {
                rgb.extend_from_slice(&[0, 0, 0]);
            }
        }
    }
    rgb
}

type GrabReply = oneshot::Sender<Result<Frame>>;

/// Async handle to a per-session capture thread.
#[derive(Clone)]
pub struct CaptureHandle {
    requests: mpsc::Sender<GrabReply>,
}

impl CaptureHandle {
    /// Spawn the capture thread. The grabber is constructed inside the
    /// thread (it is not `Send` on X11) and only on the first request, so a
    /// session that never asks for a frame never touches the display. A
    /// failed construction turns every grab into an error instead of
    /// killing the session.
    pub fn spawn<G, F>(factory: F) -> Self
    where
        G: Grabber,
        F: FnOnce() -> Result<G> + Send + 'static,
    {
        let (requests, mut rx) = mpsc::channel::<GrabReply>(1);
        std::thread::spawn(move || {
            let mut factory = Some(factory);
            let mut grabber: Option<G> = None;
            let mut error: Option<String> = None;

            while let Some(reply) = rx.blocking_recv() {
                if let Some(make) = factory.take() {
                    match make() {
                        Ok(ready) => grabber = Some(ready),
                        Err(e) => error = Some(format!("{e:#}")),
                    }
                }
                let result = match grabber.as_mut() {
                    Some(grabber) => grabber.grab(),
                    None => {
                        let reason = error.as_deref().unwrap_or("capture init failed");
                        Err(anyhow::anyhow!("capture unavailable: {reason}"))
                    }
                };
                let _ = reply.send(result);
            }
        });
        Self { requests }
    }

    /// Grab one frame.
    pub async fn grab(&self) -> Result<Frame> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(tx)
            .await
            .map_err(|_| anyhow::anyhow!("capture thread is gone"))?;
        rx.await
            .map_err(|_| anyhow::anyhow!("capture thread dropped the request"))?
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Replays a fixed frame sequence, repeating the last frame forever,
    /// and counts how often it was asked.
    pub(crate) struct ScriptedGrabber {
        frames: Vec<Frame>,
        cursor: usize,
        grabs: Arc<AtomicUsize>,
    }

    impl ScriptedGrabber {
        pub(crate) fn new(frames: Vec<Frame>) -> (Self, Arc<AtomicUsize>) {
            assert!(!frames.is_empty());
            let grabs = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    frames,
                    cursor: 0,
                    grabs: grabs.clone(),
                },
                grabs,
            )
        }
    }

    impl Grabber for ScriptedGrabber {
        fn grab(&mut self) -> Result<Frame> {
            self.grabs.fetch_add(1, Ordering::SeqCst);
            let frame = self.frames[self.cursor.min(self.frames.len() - 1)].clone();
            self.cursor += 1;
            Ok(frame)
        }
    }
}
