//! Page rendering: layout or error banner → raster page image.
//!
//! A page is first described as a small display list ([`PageDescription`]):
//! a frame, a title, a separator rule and one text op per line at fixed
//! vertical spacing. The list is rasterised onto a white canvas (shapes with
//! tiny-skia, glyphs with rusttype), then handed to [`encode`] for JPEG
//! compression at the plan's quality. The lossless canvas is dropped as soon
//! as it has been encoded.
//!
//! Rendering never fails from the caller's point of view: if the canvas
//! cannot be built or encoded, a blank page is returned instead.
//!
//! Glyphs come from the configured font, or the first usable font found in a
//! fixed list of system locations. Without any font each visible character
//! is drawn as a small block so that the page still shows the text's shape.
//!
//! [`encode`]: crate::pipeline::encode

use crate::config::ConversionConfig;
use crate::error::FileError;
use crate::pipeline::encode::{blank_canvas, encode_jpeg, EncodedRaster};
use crate::pipeline::layout::{clip_chars, layout, LayoutPage, TRUNCATION_MARKER};
use crate::pipeline::postprocess::remove_control_chars;
use image::{DynamicImage, Rgba, RgbaImage};
use rusttype::{point, Font, Scale};
use std::path::Path;
use tiny_skia::{Color, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};
use tracing::{debug, info, warn};

/// Geometry of the reference canvas (794×1123); scaled for other sizes.
const REF_WIDTH: f32 = 794.0;
const REF_HEIGHT: f32 = 1123.0;
const MARGIN: f32 = 40.0;
const TITLE_BASELINE: f32 = 60.0;
const SEPARATOR_Y: f32 = 80.0;
const FIRST_LINE_BASELINE: f32 = 110.0;
const LINE_SPACING: f32 = 24.0;
const TITLE_SIZE: f32 = 20.0;
const BODY_SIZE: f32 = 15.0;
const BANNER_HEIGHT: f32 = 90.0;

const INK: [u8; 3] = [30, 30, 30];
const MUTED: [u8; 3] = [120, 120, 120];
const FRAME: [u8; 3] = [180, 180, 180];
const BANNER: [u8; 3] = [200, 40, 40];
const WHITE: [u8; 3] = [255, 255, 255];

/// Fonts probed when no font is configured, CJK-capable ones first.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/nanum/NanumGothic.ttf",
    "/usr/share/fonts/nanum/NanumGothic.ttf",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/google-noto-cjk/NotoSansCJK-Regular.ttc",
    "/System/Library/Fonts/AppleSDGothicNeo.ttc",
    "C:\\Windows\\Fonts\\malgun.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// One drawing operation, in canvas pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Rectangle outline inset from the canvas edge.
    Frame { inset: f32, stroke_width: f32, color: [u8; 3] },
    /// Horizontal rule.
    Rule { y: f32, x0: f32, x1: f32, color: [u8; 3] },
    /// Filled band across the canvas.
    Banner { y: f32, height: f32, color: [u8; 3] },
    /// Single line of text; `baseline` is the y of the glyph baseline.
    Text {
        x: f32,
        baseline: f32,
        size: f32,
        color: [u8; 3],
        text: String,
    },
}

/// Display list for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageDescription {
    pub width: u32,
    pub height: u32,
    pub ops: Vec<DrawOp>,
}

impl PageDescription {
    /// Frame, title, separator, then one text op per display line.
    pub fn text_page(page: &LayoutPage, width: u32, height: u32) -> Self {
        let g = Geometry::new(width, height);
        let mut ops = vec![
            DrawOp::Frame {
                inset: g.x(MARGIN / 2.0),
                stroke_width: 1.5,
                color: FRAME,
            },
            g.text(MARGIN, TITLE_BASELINE, TITLE_SIZE, INK, &page.title),
            DrawOp::Rule {
                y: g.y(SEPARATOR_Y),
                x0: g.x(MARGIN),
                x1: width as f32 - g.x(MARGIN),
                color: FRAME,
            },
        ];

        for (i, line) in page.lines.iter().enumerate() {
            let baseline = FIRST_LINE_BASELINE + LINE_SPACING * i as f32;
            ops.push(g.text(MARGIN, baseline, BODY_SIZE, INK, line));
        }
        if page.truncated {
            let baseline = FIRST_LINE_BASELINE + LINE_SPACING * page.lines.len() as f32;
            ops.push(g.text(MARGIN, baseline, BODY_SIZE, MUTED, TRUNCATION_MARKER));
        }

        Self { width, height, ops }
    }

    /// Red banner naming the file, followed by the wrapped error message.
    pub fn error_page(
        file_name: &str,
        message: &str,
        width: u32,
        height: u32,
        max_lines: usize,
        max_line_chars: usize,
    ) -> Self {
        let g = Geometry::new(width, height);
        let mut ops = vec![
            DrawOp::Frame {
                inset: g.x(MARGIN / 2.0),
                stroke_width: 1.5,
                color: BANNER,
            },
            DrawOp::Banner {
                y: g.y(MARGIN / 2.0),
                height: g.y(BANNER_HEIGHT),
                color: BANNER,
            },
            g.text(MARGIN, TITLE_BASELINE, TITLE_SIZE, WHITE, "Conversion error"),
            g.text(
                MARGIN,
                FIRST_LINE_BASELINE + LINE_SPACING,
                BODY_SIZE,
                INK,
                &clip_chars(&format!("File: {file_name}"), max_line_chars),
            ),
        ];

        // Banner and file name take three lines; the message always gets one.
        let wrapped = layout("", message, max_lines.saturating_sub(3).max(1), max_line_chars);
        for (i, line) in wrapped.display_lines().enumerate() {
            let baseline = FIRST_LINE_BASELINE + LINE_SPACING * (i as f32 + 3.0);
            ops.push(g.text(MARGIN, baseline, BODY_SIZE, INK, line));
        }

        Self { width, height, ops }
    }

    /// Text of every text op, in drawing order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Maps reference-canvas coordinates onto the actual canvas.
struct Geometry {
    sx: f32,
    sy: f32,
}

impl Geometry {
    fn new(width: u32, height: u32) -> Self {
        Self {
            sx: width as f32 / REF_WIDTH,
            sy: height as f32 / REF_HEIGHT,
        }
    }

    fn x(&self, v: f32) -> f32 {
        v * self.sx
    }

    fn y(&self, v: f32) -> f32 {
        v * self.sy
    }

    fn text(&self, x: f32, baseline: f32, size: f32, color: [u8; 3], text: &str) -> DrawOp {
        DrawOp::Text {
            x: self.x(x),
            baseline: self.y(baseline),
            size: size * self.sx.min(self.sy),
            color,
            text: sanitize(text),
        }
    }
}

/// Renders page descriptions and raster input for one request.
pub struct PageRenderer {
    font: Option<Font<'static>>,
    width: u32,
    height: u32,
    max_lines: usize,
    max_line_chars: usize,
    max_image_pixels: u32,
}

impl PageRenderer {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            font: load_font(config.font_path.as_deref()),
            width: config.canvas_width,
            height: config.canvas_height,
            max_lines: config.max_lines,
            max_line_chars: config.max_line_chars,
            max_image_pixels: config.max_image_pixels,
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Render a laid-out text page at `quality`.
    pub fn render_text_page(&self, page: &LayoutPage, quality: u8) -> EncodedRaster {
        let desc = PageDescription::text_page(page, self.width, self.height);
        self.render_or_blank(&desc, quality)
    }

    /// Render an error banner page for `file_name` at `quality`.
    pub fn render_error_page(&self, file_name: &str, message: &str, quality: u8) -> EncodedRaster {
        let desc = PageDescription::error_page(
            file_name,
            message,
            self.width,
            self.height,
            self.max_lines,
            self.max_line_chars,
        );
        self.render_or_blank(&desc, quality)
    }

    /// Re-encode uploaded raster bytes at `quality`.
    pub fn reencode(&self, bytes: &[u8], quality: u8) -> Result<EncodedRaster, FileError> {
        crate::pipeline::encode::reencode(bytes, quality, self.max_image_pixels)
    }

    fn render_or_blank(&self, desc: &PageDescription, quality: u8) -> EncodedRaster {
        match rasterize(desc, self.font.as_ref()).and_then(|img| encode_jpeg(&img, quality)) {
            Ok(raster) => raster,
            Err(e) => {
                warn!("Page rendering failed, using blank page: {}", e);
                blank_canvas()
            }
        }
    }
}

/// Load the configured font, or probe the system list.
pub fn load_font(configured: Option<&Path>) -> Option<Font<'static>> {
    if let Some(path) = configured {
        match std::fs::read(path).ok().and_then(Font::try_from_vec) {
            Some(font) => {
                info!("Loaded font: {}", path.display());
                return Some(font);
            }
            None => warn!("Configured font {} is unusable; probing system fonts", path.display()),
        }
    }

    for path in SYSTEM_FONTS {
        if let Some(font) = std::fs::read(path).ok().and_then(Font::try_from_vec) {
            debug!("Loaded system font: {}", path);
            return Some(font);
        }
    }

    warn!("No usable font found; text will be drawn as placeholder blocks");
    None
}

/// Rasterise a display list onto a white canvas.
pub fn rasterize(desc: &PageDescription, font: Option<&Font<'_>>) -> Result<DynamicImage, FileError> {
    let mut pixmap = Pixmap::new(desc.width, desc.height).ok_or_else(|| FileError::RenderFailed {
        detail: format!("cannot allocate {}x{} canvas", desc.width, desc.height),
    })?;
    pixmap.fill(Color::WHITE);

    for op in &desc.ops {
        draw_shape(&mut pixmap, op, desc.width as f32, desc.height as f32);
    }

    let mut img = pixmap_to_image(&pixmap);
    for op in &desc.ops {
        if let DrawOp::Text {
            x,
            baseline,
            size,
            color,
            text,
        } = op
        {
            let max_width = desc.width as f32 - 2.0 * x;
            draw_text(&mut img, font, *x, *baseline, *size, *color, text, max_width);
        }
    }

    Ok(DynamicImage::ImageRgba8(img))
}

fn paint(color: [u8; 3]) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color[0], color[1], color[2], 255);
    paint.anti_alias = true;
    paint
}

fn draw_shape(pixmap: &mut Pixmap, op: &DrawOp, width: f32, height: f32) {
    match op {
        DrawOp::Frame {
            inset,
            stroke_width,
            color,
        } => {
            if let Some(rect) = Rect::from_ltrb(*inset, *inset, width - inset, height - inset) {
                let path = PathBuilder::from_rect(rect);
                let stroke = Stroke {
                    width: *stroke_width,
                    ..Stroke::default()
                };
                pixmap.stroke_path(&path, &paint(*color), &stroke, Transform::identity(), None);
            }
        }
        DrawOp::Rule { y, x0, x1, color } => {
            let mut pb = PathBuilder::new();
            pb.move_to(*x0, *y);
            pb.line_to(*x1, *y);
            if let Some(path) = pb.finish() {
                let stroke = Stroke {
                    width: 1.0,
                    ..Stroke::default()
                };
                pixmap.stroke_path(&path, &paint(*color), &stroke, Transform::identity(), None);
            }
        }
        DrawOp::Banner {
            y,
            height: band,
            color,
        } => {
            if let Some(rect) = Rect::from_xywh(0.0, *y, width, *band) {
                pixmap.fill_rect(rect, &paint(*color), Transform::identity(), None);
            }
        }
        DrawOp::Text { .. } => {}
    }
}

/// The canvas is opaque, so premultiplied and straight RGBA coincide.
fn pixmap_to_image(pixmap: &Pixmap) -> RgbaImage {
    let mut img = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in img.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = Rgba([c.red(), c.green(), c.blue(), 255]);
    }
    img
}

#[allow(clippy::too_many_arguments)]
fn draw_text(
    img: &mut RgbaImage,
    font: Option<&Font<'_>>,
    x: f32,
    baseline: f32,
    size: f32,
    color: [u8; 3],
    text: &str,
    max_width: f32,
) {
    if text.is_empty() {
        return;
    }
    let Some(font) = font else {
        draw_placeholder(img, x, baseline, size, color, text);
        return;
    };

    let mut scale = Scale::uniform(size);
    let width = text_width(font, scale, text);
    if width > max_width && max_width > 0.0 {
        scale = Scale::uniform((size * max_width / width).max(4.0));
    }

    let (w, h) = img.dimensions();
    for glyph in font.layout(text, scale, point(x, baseline)) {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, coverage| {
            let px = bb.min.x + gx as i32;
            let py = bb.min.y + gy as i32;
            if px >= 0 && py >= 0 && (px as u32) < w && (py as u32) < h {
                blend(img, px as u32, py as u32, color, coverage);
            }
        });
    }
}

fn text_width(font: &Font<'_>, scale: Scale, text: &str) -> f32 {
    font.layout(text, scale, point(0.0, 0.0))
        .last()
        .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0)
}

/// Fontless fallback: one block per visible character.
fn draw_placeholder(img: &mut RgbaImage, x: f32, baseline: f32, size: f32, color: [u8; 3], text: &str) {
    let advance = size * 0.6;
    let block_w = (advance * 0.7).max(1.0) as u32;
    let block_h = (size * 0.6).max(1.0) as u32;
    let top = (baseline - size * 0.6).max(0.0) as u32;
    let (w, h) = img.dimensions();

    for (i, c) in text.chars().enumerate() {
        if c.is_whitespace() {
            continue;
        }
        let left = (x + advance * i as f32) as u32;
        for py in top..(top + block_h).min(h) {
            for px in left..(left + block_w).min(w) {
                blend(img, px, py, color, 0.6);
            }
        }
    }
}

fn blend(img: &mut RgbaImage, x: u32, y: u32, color: [u8; 3], coverage: f32) {
    let a = coverage.clamp(0.0, 1.0);
    let px = img.get_pixel_mut(x, y);
    for i in 0..3 {
        px.0[i] = (px.0[i] as f32 * (1.0 - a) + color[i] as f32 * a).round() as u8;
    }
}

/// Drawn strings carry no control characters; tabs and newlines become spaces.
fn sanitize(text: &str) -> String {
    remove_control_chars(text)
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::RasterData;

    fn page(lines: &[&str], truncated: bool) -> LayoutPage {
        LayoutPage {
            title: "notes.txt".into(),
            lines: lines.iter().map(|s| s.to_string()).collect(),
            truncated,
        }
    }

    #[test]
    fn text_page_has_title_and_lines() {
        let desc = PageDescription::text_page(&page(&["Hello world"], false), 794, 1123);
        let texts: Vec<&str> = desc.texts().collect();
        assert_eq!(texts, vec!["notes.txt", "Hello world"]);
        assert!(matches!(desc.ops[0], DrawOp::Frame { .. }));
        assert!(desc.ops.iter().any(|op| matches!(op, DrawOp::Rule { .. })));
    }

    #[test]
    fn lines_use_fixed_spacing() {
        let desc = PageDescription::text_page(&page(&["a", "b", "c"], false), 794, 1123);
        let baselines: Vec<f32> = desc
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { baseline, size, .. } if *size == BODY_SIZE => Some(*baseline),
                _ => None,
            })
            .collect();
        assert_eq!(baselines, vec![110.0, 134.0, 158.0]);
    }

    #[test]
    fn full_page_fits_canvas() {
        let lines: Vec<String> = (0..40).map(|i| format!("line {i}")).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let desc = PageDescription::text_page(&page(&refs, true), 794, 1123);
        let texts: Vec<&str> = desc.texts().collect();
        assert_eq!(texts.last(), Some(&TRUNCATION_MARKER));
        for op in &desc.ops {
            if let DrawOp::Text { baseline, .. } = op {
                assert!(*baseline < 1123.0);
            }
        }
    }

    #[test]
    fn drawn_text_is_sanitized() {
        let desc = PageDescription::text_page(&page(&["a\u{1}b\tc"], false), 794, 1123);
        assert!(desc.texts().any(|t| t == "ab c"));
    }

    #[test]
    fn error_page_names_file_and_message() {
        let desc = PageDescription::error_page("broken.pdf", "cannot import PDF: bad xref", 794, 1123, 40, 70);
        let texts: Vec<&str> = desc.texts().collect();
        assert!(texts.contains(&"Conversion error"));
        assert!(texts.contains(&"File: broken.pdf"));
        assert!(texts.iter().any(|t| t.contains("bad xref")));
        assert!(desc.ops.iter().any(|op| matches!(op, DrawOp::Banner { .. })));
    }

    #[test]
    fn error_page_keeps_message_with_tiny_line_budget() {
        for max_lines in [0, 1, 2, 3] {
            let desc = PageDescription::error_page("x.docx", "zip header missing", 794, 1123, max_lines, 70);
            assert!(
                desc.texts().any(|t| t.contains("zip header missing")),
                "no message with max_lines = {max_lines}"
            );
        }
    }

    #[test]
    fn rasterize_without_font_draws_blocks() {
        let desc = PageDescription::text_page(&page(&["Hello"], false), 300, 400);
        let img = rasterize(&desc, None).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (300, 400));
        let dark = img.pixels().filter(|p| p.0[0] < 128).count();
        assert!(dark > 0);
        assert_eq!(img.get_pixel(150, 300).0, [255, 255, 255, 255]);
    }

    #[test]
    fn zero_canvas_fails_to_rasterize() {
        let desc = PageDescription {
            width: 0,
            height: 0,
            ops: Vec::new(),
        };
        assert!(rasterize(&desc, None).is_err());
    }

    #[test]
    fn renderer_always_produces_a_page() {
        let config = ConversionConfig::default();
        let renderer = PageRenderer {
            font: None,
            width: 0,
            height: 0,
            max_lines: config.max_lines,
            max_line_chars: config.max_line_chars,
            max_image_pixels: config.max_image_pixels,
        };
        let raster = renderer.render_text_page(&page(&["x"], false), 80);
        assert!(matches!(raster.data, RasterData::Rgb(_)));
    }

    #[test]
    fn text_page_renders_to_jpeg() {
        let renderer = PageRenderer::new(&ConversionConfig::default());
        let raster = renderer.render_text_page(&page(&["Hello world"], false), 80);
        assert!(raster.is_jpeg());
        assert_eq!((raster.width, raster.height), (794, 1123));
    }
}
