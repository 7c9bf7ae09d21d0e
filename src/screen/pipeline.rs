//! Per-session capture-encode pipeline.
//!
//! Owns the reference image (`last_sent`), the negotiated viewport, and the
//! repaint budget. Each serve tick turns a captured frame plus the pending
//! request into exactly one frame response.
//!
//! The repaint budget bounds JPEG drift: partial rectangles re-encoded
//! against an already lossy reference stack artifacts, and a long idle
//! stretch could hide a silent divergence between server and client views.
//! A forced full frame every N partials / N empties resets both.

use anyhow::Result;

use super::diff::{self, Delta};
use super::{clamp_viewport, encode, Frame};
use crate::config::Config;
use crate::protocol::{FrameRequest, FrameResponse};

pub struct Pipeline {
    min_quality: u8,
    max_quality: u8,
    partial_budget: u32,
    empty_budget: u32,
    /// Viewport of the reference image; a change invalidates it.
    viewport: Option<(u16, u16)>,
    /// The image the client currently shows, reconstructed server-side.
    last_sent: Option<Frame>,
    partial_streak: u32,
    empty_streak: u32,
}

impl Pipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            min_quality: config.min_quality,
            max_quality: config.max_quality,
            partial_budget: config.partial_frames_before_full_repaint,
            empty_budget: config.empty_frames_before_full_repaint,
            viewport: None,
            last_sent: None,
            partial_streak: 0,
            empty_streak: 0,
        }
    }

    /// Produce the response for one frame request from a captured image.
    pub fn produce(&mut self, src: &Frame, request: &FrameRequest) -> Result<FrameResponse> {
        let (vw, vh) = clamp_viewport(request.width, request.height);
        if self.viewport != Some((vw, vh)) {
            self.viewport = Some((vw, vh));
            self.last_sent = None;
        }

        let cur = encode::resize(src, vw, vh)?;
        let quality = request.quality.clamp(self.min_quality, self.max_quality);

        let candidate = match &self.last_sent {
            None => Delta::Full,
            Some(prev) => diff::diff(prev, &cur),
        };
        let delta = match candidate {
            Delta::Empty if self.empty_streak + 1 >= self.empty_budget => Delta::Full,
            Delta::Partial(_) if self.partial_streak + 1 >= self.partial_budget => Delta::Full,
            other => other,
        };

        match delta {
            Delta::Full => {
                let jpeg = encode::jpeg(&cur, quality)?;
                self.last_sent = Some(cur);
                self.partial_streak = 0;
                self.empty_streak = 0;
                Ok(FrameResponse::Full {
                    width: vw,
                    height: vh,
                    jpeg,
                })
            }
            Delta::Partial(region) => {
                let jpeg = encode::jpeg_region(&cur, &region, quality)?;
                let reference = self.last_sent.as_mut().expect("partial implies a reference");
                reference.blit_from(&cur, region.x, region.y, region.width, region.height);
                self.partial_streak += 1;
                self.empty_streak = 0;
                Ok(FrameResponse::Partial {
                    width: vw,
                    height: vh,
                    x: region.x as u16,
                    y: region.y as u16,
                    jpeg,
                })
            }
            Delta::Empty => {
                self.empty_streak += 1;
                self.partial_streak = 0;
                Ok(FrameResponse::Empty {
                    width: vw,
                    height: vh,
                })
            }
        }
    }

    /// Substitute response for a failed capture or encode: report no change
    /// at the requested viewport. The repaint budget is left untouched; this
    /// is not a differ outcome.
    pub fn placeholder(&self, request: &FrameRequest) -> FrameResponse {
        let (vw, vh) = clamp_viewport(request.width, request.height);
        FrameResponse::Empty {
            width: vw,
            height: vh,
        }
    }

    #[cfg(test)]
    pub(crate) fn reference(&self) -> Option<&Frame> {
        self.last_sent.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegDecoder;
    use image::ImageDecoder;
    use std::io::Cursor;

    fn config(partial_budget: u32, empty_budget: u32) -> Config {
        Config {
            control_password: "a".into(),
            min_quality: 1,
            max_quality: 100,
            partial_frames_before_full_repaint: partial_budget,
            empty_frames_before_full_repaint: empty_budget,
            ..Config::default()
        }
    }

    fn request(width: u16, height: u16) -> FrameRequest {
        FrameRequest {
            width,
            height,
            quality: 50,
        }
    }

    #[test]
    fn test_first_frame_is_full() {
        let mut pipeline = Pipeline::new(&config(60, 600));
        let src = Frame::solid(64, 48, [40, 80, 120]);

        let resp = pipeline.produce(&src, &request(32, 24)).unwrap();
        match resp {
            FrameResponse::Full { width, height, jpeg } => {
                assert_eq!((width, height), (32, 24));
                let dims = JpegDecoder::new(Cursor::new(&jpeg)).unwrap().dimensions();
                assert_eq!(dims, (32, 24));
            }
            other => panic!("expected full frame, got {:?}", other.kind()),
        }
        assert_eq!(pipeline.reference().unwrap().width, 32);
    }

    #[test]
    fn test_stationary_display_cycles_empties_then_full() {
        let mut pipeline = Pipeline::new(&config(60, 3));
        let src = Frame::solid(64, 64, [9, 9, 9]);
        let req = request(64, 64);

        let kinds: Vec<u8> = (0..4)
            .map(|_| pipeline.produce(&src, &req).unwrap().kind())
            .collect();
        assert_eq!(
            kinds,
            vec![
                crate::protocol::FRAME_FULL,
                crate::protocol::FRAME_EMPTY,
                crate::protocol::FRAME_EMPTY,
                crate::protocol::FRAME_FULL,
            ]
        );
    }

    #[test]
    fn test_partial_streak_forces_full_repaint() {
        let mut pipeline = Pipeline::new(&config(2, 600));
        let req = request(64, 64);
        let mut src = Frame::solid(64, 64, [0, 0, 0]);

        let mut kinds = Vec::new();
        for tick in 0u8..5 {
            // A 10x10 square at (8, 8) changes every tick.
            for y in 8..18 {
                for x in 8..18 {
                    src.put_pixel(x, y, [tick + 1, 0, 0]);
                }
            }
            kinds.push(pipeline.produce(&src, &req).unwrap());
        }

        assert_eq!(kinds[0].kind(), crate::protocol::FRAME_FULL);
        match &kinds[1] {
            FrameResponse::Partial { x, y, jpeg, .. } => {
                assert_eq!((*x, *y), (8, 8));
                let dims = JpegDecoder::new(Cursor::new(jpeg)).unwrap().dimensions();
                assert_eq!(dims, (10, 10));
            }
            other => panic!("expected partial, got {:?}", other.kind()),
        }
        // Second consecutive partial would exhaust the budget of 2.
        assert_eq!(kinds[2].kind(), crate::protocol::FRAME_FULL);
        assert_eq!(kinds[3].kind(), crate::protocol::FRAME_PARTIAL);
        assert_eq!(kinds[4].kind(), crate::protocol::FRAME_FULL);
    }

    #[test]
    fn test_viewport_change_forces_full() {
        let mut pipeline = Pipeline::new(&config(60, 600));
        let src = Frame::solid(64, 64, [5, 5, 5]);

        assert_eq!(
            pipeline.produce(&src, &request(64, 64)).unwrap().kind(),
            crate::protocol::FRAME_FULL
        );
        // Same pixels, new viewport: still a full frame at the new size.
        let resp = pipeline.produce(&src, &request(32, 32)).unwrap();
        assert_eq!(resp.kind(), crate::protocol::FRAME_FULL);
        assert_eq!((resp.width(), resp.height()), (32, 32));
    }

    #[test]
    fn test_oversized_viewport_is_clamped() {
        let mut pipeline = Pipeline::new(&config(60, 600));
        let src = Frame::solid(64, 64, [5, 5, 5]);

        let resp = pipeline.produce(&src, &request(5000, 4)).unwrap();
        assert_eq!(
            (resp.width(), resp.height()),
            (super::super::MAX_VIEWPORT_DIM, super::super::MIN_VIEWPORT_DIM)
        );
    }

    #[test]
    fn test_client_reconstruction_matches_reference() {
        // Apply each emitted packet to a model client canvas and check it
        // stays bitwise equal to the pipeline's reference image.
        let mut pipeline = Pipeline::new(&config(60, 600));
        let req = request(64, 64);
        let mut src = Frame::solid(64, 64, [0, 0, 0]);
        let mut canvas: Option<Frame> = None;

        for tick in 0u8..4 {
            src.put_pixel(20 + tick as u32, 40, [200, tick, 0]);
            let resp = pipeline.produce(&src, &req).unwrap();
            let cur = encode::resize(&src, 64, 64).unwrap();

            match resp {
                FrameResponse::Full { .. } => canvas = Some(cur),
                FrameResponse::Partial { x, y, jpeg, .. } => {
                    let (rw, rh) = JpegDecoder::new(Cursor::new(&jpeg)).unwrap().dimensions();
                    canvas
                        .as_mut()
                        .unwrap()
                        .blit_from(&cur, x as u32, y as u32, rw, rh);
                }
                FrameResponse::Empty { .. } => {}
            }
            assert_eq!(canvas.as_ref(), pipeline.reference());
        }
    }

    #[test]
    fn test_placeholder_reports_requested_viewport() {
        let pipeline = Pipeline::new(&config(60, 600));
        let resp = pipeline.placeholder(&request(640, 480));
        assert_eq!(resp.kind(), crate::protocol::FRAME_EMPTY);
        assert_eq!((resp.width(), resp.height()), (640, 480));
    }
}
