//! # docs2pdf
//!
//! Merge a batch of heterogeneous documents into one PDF whose size is
//! steered toward a requested budget.
//!
//! Accepted inputs: raster images, PDFs, Word (`.docx`), Excel
//! (`.xlsx`/`.xls`), plain text, HTML, and legacy Hangul word-processor files
//! (`.hwp`/`.hwpx`). PDF pages are copied verbatim; everything else is
//! turned into text or an image and drawn onto one fixed-size page per file.
//!
//! ## Pipeline Overview
//!
//! ```text
//! [FileDescriptor]
//!  │
//!  ├─ 1. Input     classify by extension, read bytes (missing → skipped)
//!  ├─ 2. Dispatch  PDF import │ text extraction │ raw raster
//!  ├─ 3. Decode    encoding recovery chain (EUC-KR, CP949, UTF-8, …)
//!  ├─ 4. Layout    40 lines × 70 chars, truncation marker
//!  ├─ 5. Render    frame + title + lines → JPEG at the planned quality
//!  └─ 6. Assemble  ordered merge, error pages, size report
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docs2pdf::{convert, CompressionTier, ConversionConfig, ConversionRequest, FileDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let files = vec![
//!         FileDescriptor::from_path("scan.jpg")?,
//!         FileDescriptor::from_path("report.pdf")?,
//!         FileDescriptor::from_path("budget.xlsx")?,
//!     ];
//!     docs2pdf::validate_batch(&files)?;
//!
//!     let config = ConversionConfig::builder().delete_sources(false).build()?;
//!     let request = ConversionRequest::new(files, CompressionTier::Medium);
//!     let result = convert(&request, &config).await?;
//!     println!(
//!         "{} pages, {} KB → {} KB ({}% saved)",
//!         result.page_count,
//!         result.original_size_kb,
//!         result.compressed_size_kb,
//!         result.savings_percent
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docs2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docs2pdf = { version = "0.1", default-features = false }
//! ```
//!
//! ## Compression Tiers
//!
//! | Tier | JPEG quality | Target ratio |
//! |------|--------------|--------------|
//! | `low`    | 95 | 0.9 |
//! | `medium` | 80 | 0.7 |
//! | `high`   | 60 | 0.5 |
//! | `custom` | 95 / 85 / 70 / 55 / 40 by ratio bucket | target size ÷ input size, or explicit |
//!
//! Only synthesised pages are affected; native PDF pages are never re-encoded.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{convert, convert_request, convert_sync, copy_output, move_output};
pub use error::{Docs2PdfError, FileError};
pub use output::{ConversionRequest, ConversionResponse, ConversionResult, FileOutcome, FileStatus};
pub use pipeline::compress::{CompressionPlan, CompressionTier};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use storage::{validate_batch, FileDescriptor, UploadStore};
