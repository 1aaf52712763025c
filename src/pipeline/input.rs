//! Input resolution: classify an uploaded file and read its bytes.
//!
//! Routing is by file extension only (case-insensitive); the MIME type the
//! browser declared at upload time is not trusted. The original name is
//! preferred over the storage path because upload stores often drop the
//! extension. A source that has vanished from storage is reported as
//! [`ResolvedSource::Missing`] so the assembler can skip it without
//! emitting a page.

use crate::error::FileError;
use std::path::Path;
use tracing::debug;

/// Content family a file is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Image,
    Pdf,
    Docx,
    Spreadsheet,
    Text,
    Html,
    LegacyHwp,
}

impl SourceKind {
    /// Classify by the extension of `original_name`, falling back to the
    /// storage path. Unknown or missing extensions are treated as text.
    pub fn classify(original_name: &str, storage_path: &Path) -> Self {
        let ext = extension_of(original_name).or_else(|| {
            storage_path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase())
        });
        let kind = ext.as_deref().map(Self::from_extension).unwrap_or(SourceKind::Text);
        debug!("Routing '{}' ({:?}) → {:?}", original_name, ext, kind);
        kind
    }

    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp" | "tif" | "tiff" => SourceKind::Image,
            "pdf" => SourceKind::Pdf,
            "docx" => SourceKind::Docx,
            "xlsx" | "xls" => SourceKind::Spreadsheet,
            "html" | "htm" => SourceKind::Html,
            "hwp" | "hwpx" => SourceKind::LegacyHwp,
            _ => SourceKind::Text,
        }
    }

    /// Human-readable family name, used in page titles and logs.
    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Image => "image",
            SourceKind::Pdf => "PDF",
            SourceKind::Docx => "Word document",
            SourceKind::Spreadsheet => "spreadsheet",
            SourceKind::Text => "text",
            SourceKind::Html => "HTML",
            SourceKind::LegacyHwp => "HWP document",
        }
    }
}

/// Lowercased extension of a file name, if it has one.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_ascii_lowercase())
}

/// Outcome of reading a stored upload.
#[derive(Debug)]
pub enum ResolvedSource {
    /// The file no longer exists.
    Missing,
    Bytes(Vec<u8>),
}

/// Read a stored upload. Only a vanished file is `Missing`; any other I/O
/// failure is a per-file error.
pub fn read_source(path: &Path) -> Result<ResolvedSource, FileError> {
    match std::fs::read(path) {
        Ok(bytes) => {
            debug!("Read {} bytes from {}", bytes.len(), path.display());
            Ok(ResolvedSource::Bytes(bytes))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ResolvedSource::Missing),
        Err(e) => Err(FileError::Unreadable {
            detail: format!("{}: {}", path.display(), e),
        }),
    }
}
