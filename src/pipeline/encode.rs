//! Raster encoding: `DynamicImage` → JPEG at the plan's quality.
//!
//! Every synthesised page ends up as a DCT-compressed image XObject, so the
//! JPEG quality chosen by the compression plan is the single knob that steers
//! output size. Alpha is flattened onto white first; JPEG has no alpha and
//! transparent regions would otherwise turn black.

use crate::error::FileError;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use tracing::debug;

/// Edge length of the fallback canvas, in pixels.
const BLANK_CANVAS_EDGE: u32 = 8;

/// Pixel payload of an encoded page image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RasterData {
    /// Baseline JPEG, embedded with `DCTDecode`.
    Jpeg(Vec<u8>),
    /// Raw 8-bit RGB samples, embedded uncompressed (stream compression
    /// is applied later with the rest of the document).
    Rgb(Vec<u8>),
}

/// An image ready to embed as a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRaster {
    pub data: RasterData,
    pub width: u32,
    pub height: u32,
}

impl EncodedRaster {
    pub fn byte_len(&self) -> usize {
        match &self.data {
            RasterData::Jpeg(b) | RasterData::Rgb(b) => b.len(),
        }
    }

    pub fn is_jpeg(&self) -> bool {
        matches!(self.data, RasterData::Jpeg(_))
    }
}

/// Encode an image as JPEG at `quality` (1–100).
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<EncodedRaster, FileError> {
    let rgb = flatten_alpha(img);
    let (width, height) = rgb.dimensions();

    let mut buf = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    encoder
        .encode_image(&rgb)
        .map_err(|e| FileError::RenderFailed {
            detail: format!("JPEG encoding failed: {e}"),
        })?;

    debug!(
        "Encoded {}x{} raster at quality {} → {} bytes",
        width,
        height,
        quality,
        buf.len()
    );
    Ok(EncodedRaster {
        data: RasterData::Jpeg(buf),
        width,
        height,
    })
}

/// Decode an uploaded raster, cap its longest edge at `max_pixels`, and
/// re-encode it at `quality`.
pub fn reencode(bytes: &[u8], quality: u8, max_pixels: u32) -> Result<EncodedRaster, FileError> {
    let img = image::load_from_memory(bytes).map_err(|e| FileError::RasterDecodeFailed {
        detail: e.to_string(),
    })?;
    let img = downscale(img, max_pixels);
    encode_jpeg(&img, quality)
}

/// Minimal white page used when every rendering path failed.
pub fn blank_canvas() -> EncodedRaster {
    let edge = BLANK_CANVAS_EDGE;
    EncodedRaster {
        data: RasterData::Rgb(vec![255u8; (edge * edge * 3) as usize]),
        width: edge,
        height: edge,
    }
}

fn downscale(img: DynamicImage, max_pixels: u32) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    let longest = w.max(h);
    if longest <= max_pixels || max_pixels == 0 {
        return img;
    }
    let scale = max_pixels as f64 / longest as f64;
    let nw = ((w as f64 * scale).round() as u32).max(1);
    let nh = ((h as f64 * scale).round() as u32).max(1);
    debug!("Downscaling raster {}x{} → {}x{}", w, h, nw, nh);
    img.resize_exact(nw, nh, FilterType::Triangle)
}

/// Composite onto an opaque white background.
fn flatten_alpha(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut out = RgbImage::new(w, h);
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let blend = |c: u8| ((c as u32 * a as u32 + 255 * (255 - a as u32)) / 255) as u8;
        out.put_pixel(x, y, image::Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}
