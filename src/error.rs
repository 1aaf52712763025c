//! Error types for the docs2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Docs2PdfError`] — **Fatal**: the request cannot proceed at all
//!   (batch rejected at admission, merged document could not be serialised,
//!   output artefact could not be written). Returned as `Err(Docs2PdfError)`
//!   from the top-level `convert*` functions.
//!
//! * [`FileError`] — **Non-fatal**: a single input file could not be turned
//!   into a page (corrupt PDF, undecodable image). The assembler replaces the
//!   file with an error banner page and records the error in
//!   [`crate::output::FileOutcome`]; the rest of the batch is unaffected.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docs2pdf library.
///
/// File-level failures use [`FileError`] and are contained inside the
/// assembly loop rather than propagated here.
#[derive(Debug, Error)]
pub enum Docs2PdfError {
    // ── Admission errors ──────────────────────────────────────────────────
    /// The batch is empty.
    #[error("No files were provided")]
    NoFiles,

    /// The batch holds more files than allowed.
    #[error("Too many files: {count} (maximum is {max})")]
    TooManyFiles { count: usize, max: usize },

    /// A single file exceeds the per-file size limit.
    #[error("File '{name}' is too large: {size} bytes (maximum is {max} bytes)")]
    FileTooLarge { name: String, size: u64, max: u64 },

    // ── Request errors ────────────────────────────────────────────────────
    /// Compression settings cannot be turned into a plan.
    #[error("Invalid compression settings: {0}")]
    InvalidCompression(String),

    // ── Assembly errors ───────────────────────────────────────────────────
    /// The merged document could not be serialised.
    #[error("Failed to assemble output PDF: {detail}")]
    AssemblyFailed { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Docs2PdfError {
    /// True for errors raised before the pipeline starts (bad batch shape).
    pub fn is_admission(&self) -> bool {
        matches!(
            self,
            Docs2PdfError::NoFiles
                | Docs2PdfError::TooManyFiles { .. }
                | Docs2PdfError::FileTooLarge { .. }
        )
    }
}

/// A non-fatal error for a single input file.
///
/// The assembler turns it into a one-page error banner carrying the file
/// name and this message.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum FileError {
    /// The source bytes could not be read.
    #[error("cannot read file: {detail}")]
    Unreadable { detail: String },

    /// A native PDF could not be opened or merged.
    #[error("cannot import PDF: {detail}")]
    PdfImportFailed { detail: String },

    /// A raster image could not be decoded.
    #[error("cannot decode image: {detail}")]
    RasterDecodeFailed { detail: String },

    /// Encoding the page raster failed.
    #[error("cannot render page: {detail}")]
    RenderFailed { detail: String },
}
