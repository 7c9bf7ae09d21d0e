//! Viewport resizing and JPEG encoding.

use anyhow::Result;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::io::Cursor;

use super::diff::Region;
use super::Frame;

fn to_image(frame: &Frame) -> Result<RgbImage> {
    RgbImage::from_raw(frame.width, frame.height, frame.pixels.clone())
        .ok_or_else(|| anyhow::anyhow!("invalid frame dimensions"))
}

/// Resample a frame to the client viewport. Lanczos is deterministic, so a
/// stationary display keeps producing bitwise-identical viewport frames.
pub fn resize(frame: &Frame, width: u16, height: u16) -> Result<Frame> {
    let (w, h) = (width as u32, height as u32);
    if frame.width == w && frame.height == h {
        return Ok(frame.clone());
    }
    let resized = imageops::resize(&to_image(frame)?, w, h, FilterType::Lanczos3);
    Ok(Frame::new(w, h, resized.into_raw()))
}

fn encode_image(img: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    img.write_with_encoder(encoder)
        .map_err(|e| anyhow::anyhow!("JPEG encode failed: {}", e))?;
    Ok(buf.into_inner())
}

/// JPEG-encode a whole frame.
pub fn jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>> {
    encode_image(&to_image(frame)?, quality)
}

/// JPEG-encode the sub-rectangle of a frame.
pub fn jpeg_region(frame: &Frame, region: &Region, quality: u8) -> Result<Vec<u8>> {
    let img = to_image(frame)?;
    let cropped =
        imageops::crop_imm(&img, region.x, region.y, region.width, region.height).to_image();
    encode_image(&cropped, quality)
}
