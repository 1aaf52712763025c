//! Configuration types for document-to-PDF conversion.
//!
//! Everything that is not part of a single request (which files, which
//! compression tier) lives in [`ConversionConfig`], built via its
//! [`ConversionConfigBuilder`]. The layout budgets and canvas size are
//! empirically tuned constants; they are exposed here so callers can adjust
//! them without touching the pipeline.

use crate::error::Docs2PdfError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Maximum number of lines rendered on a synthesised text page.
pub const DEFAULT_MAX_LINES: usize = 40;

/// Maximum characters per rendered line.
pub const DEFAULT_MAX_LINE_CHARS: usize = 70;

/// Raster canvas for synthesised pages: A4 at 96 DPI.
pub const DEFAULT_CANVAS_WIDTH: u32 = 794;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 1123;

/// Per-file upload limit enforced by the admission check.
pub const MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;

/// Batch size limit enforced by the admission check.
pub const MAX_BATCH_FILES: usize = 20;

/// Configuration for a conversion request.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use docs2pdf::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .max_image_pixels(1600)
///     .delete_sources(false)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Maximum lines on a text page. Default: 40.
    pub max_lines: usize,

    /// Maximum characters per text line. Default: 70.
    ///
    /// This is a character budget, not a measured width. It is tuned so that
    /// 70 characters of the default font fit the default canvas with margins.
    pub max_line_chars: usize,

    /// Width of synthesised page rasters in pixels. Default: 794.
    pub canvas_width: u32,

    /// Height of synthesised page rasters in pixels. Default: 1123.
    pub canvas_height: u32,

    /// Longest edge, in pixels, of re-encoded native images. Default: 2000.
    ///
    /// A 12 000 px camera scan would otherwise be embedded at full
    /// resolution and dwarf every other page in the output.
    pub max_image_pixels: u32,

    /// Font used to draw text pages. If None, common system locations are
    /// probed; if nothing is found glyphs are drawn as placeholder blocks.
    pub font_path: Option<PathBuf>,

    /// Directory the merged PDF is written to. Default: system temp dir.
    pub output_dir: PathBuf,

    /// Prefix joined with the output file name to form the download URL.
    /// Default: "/download/".
    pub download_url_prefix: String,

    /// Delete the batch's source files once assembly finishes. Default: true.
    pub delete_sources: bool,

    /// Sheets serialised per workbook. Default: 3.
    pub max_sheets: usize,

    /// Rows serialised per sheet. Default: 20.
    pub max_sheet_rows: usize,

    /// Characters kept from a legacy-binary salvage. Default: 2000.
    pub salvage_char_budget: usize,

    /// Per-file progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LINES,
            max_line_chars: DEFAULT_MAX_LINE_CHARS,
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            max_image_pixels: 2000,
            font_path: None,
            output_dir: std::env::temp_dir(),
            download_url_prefix: "/download/".to_string(),
            delete_sources: true,
            max_sheets: 3,
            max_sheet_rows: 20,
            salvage_char_budget: 2000,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("max_lines", &self.max_lines)
            .field("max_line_chars", &self.max_line_chars)
            .field("canvas_width", &self.canvas_width)
            .field("canvas_height", &self.canvas_height)
            .field("max_image_pixels", &self.max_image_pixels)
            .field("font_path", &self.font_path)
            .field("output_dir", &self.output_dir)
            .field("download_url_prefix", &self.download_url_prefix)
            .field("delete_sources", &self.delete_sources)
            .field("max_sheets", &self.max_sheets)
            .field("max_sheet_rows", &self.max_sheet_rows)
            .field("salvage_char_budget", &self.salvage_char_budget)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn max_lines(mut self, n: usize) -> Self {
        self.config.max_lines = n.max(1);
        self
    }

    pub fn max_line_chars(mut self, n: usize) -> Self {
        self.config.max_line_chars = n.max(1);
        self
    }

    pub fn canvas_size(mut self, width: u32, height: u32) -> Self {
        self.config.canvas_width = width;
        self.config.canvas_height = height;
        self
    }

    pub fn max_image_pixels(mut self, px: u32) -> Self {
        self.config.max_image_pixels = px.max(100);
        self
    }

    pub fn font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.font_path = Some(path.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn download_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.download_url_prefix = prefix.into();
        self
    }

    pub fn delete_sources(mut self, v: bool) -> Self {
        self.config.delete_sources = v;
        self
    }

    pub fn max_sheets(mut self, n: usize) -> Self {
        self.config.max_sheets = n;
        self
    }

    pub fn max_sheet_rows(mut self, n: usize) -> Self {
        self.config.max_sheet_rows = n;
        self
    }

    pub fn salvage_char_budget(mut self, n: usize) -> Self {
        self.config.salvage_char_budget = n;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Docs2PdfError> {
        let c = &self.config;
        if c.canvas_width < 200 || c.canvas_height < 200 {
            return Err(Docs2PdfError::InvalidConfig(format!(
                "Canvas must be at least 200x200 px, got {}x{}",
                c.canvas_width, c.canvas_height
            )));
        }
        if c.max_sheets == 0 || c.max_sheet_rows == 0 {
            return Err(Docs2PdfError::InvalidConfig(
                "Sheet and row limits must be ≥ 1".into(),
            ));
        }
        if c.salvage_char_budget < 10 {
            return Err(Docs2PdfError::InvalidConfig(format!(
                "Salvage budget must be ≥ 10 characters, got {}",
                c.salvage_char_budget
            )));
        }
        Ok(self.config)
    }
}
