//! Format dispatch: route a file's bytes to the extractor for its family.
//!
//! Each branch returns either content or a diagnostic string standing in for
//! content, so a bad file still yields a labelled page. Only two failures
//! escape as [`FileError`]: a PDF that cannot be imported and a raster that
//! cannot be decoded (the latter surfaces later, at re-encode time).

use crate::config::ConversionConfig;
use crate::error::FileError;
use crate::pipeline::encoding;
use crate::pipeline::input::{extension_of, SourceKind};
use crate::pipeline::postprocess::html_to_text;
use crate::pipeline::salvage::salvage_text;
use crate::pipeline::spreadsheet::{extract_workbook_text, SheetLimits};
use lopdf::Document;
use tracing::{debug, warn};

/// Diagnostic used when a Word document yields no text.
pub const DOCX_UNREADABLE: &str = "Cannot read document: the Word file could not be parsed.";

/// What a file turned into.
#[derive(Debug)]
pub enum ExtractedContent {
    /// Pages to copy verbatim.
    NativePdf(Document),
    /// Text to lay out on one page.
    Text(String),
    /// Raster bytes to re-encode.
    Raster(Vec<u8>),
}

impl ExtractedContent {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ExtractedContent::NativePdf(_) => "native PDF",
            ExtractedContent::Text(_) => "text",
            ExtractedContent::Raster(_) => "raster",
        }
    }
}

/// Extract content from `bytes` according to `kind`.
pub fn dispatch(
    kind: SourceKind,
    bytes: Vec<u8>,
    original_name: &str,
    config: &ConversionConfig,
) -> Result<ExtractedContent, FileError> {
    debug!("Dispatching '{}' as {}", original_name, kind.label());
    let content = match kind {
        SourceKind::Image => ExtractedContent::Raster(bytes),
        SourceKind::Pdf => ExtractedContent::NativePdf(import_pdf(&bytes)?),
        SourceKind::Docx => ExtractedContent::Text(extract_docx(&bytes, original_name)),
        SourceKind::Spreadsheet => {
            let ext = extension_of(original_name).unwrap_or_else(|| "xlsx".into());
            let limits = SheetLimits {
                max_sheets: config.max_sheets,
                max_rows: config.max_sheet_rows,
            };
            ExtractedContent::Text(extract_workbook_text(&bytes, &ext, limits))
        }
        SourceKind::Text => ExtractedContent::Text(encoding::recover(&bytes)),
        SourceKind::Html => ExtractedContent::Text(html_to_text(&encoding::recover(&bytes))),
        SourceKind::LegacyHwp => ExtractedContent::Text(salvage_text(
            &bytes,
            original_name,
            config.salvage_char_budget,
        )),
    };
    Ok(content)
}

/// Parse a PDF for page copying. Encrypted and page-less documents are
/// rejected.
pub fn import_pdf(bytes: &[u8]) -> Result<Document, FileError> {
    let doc = Document::load_mem(bytes).map_err(|e| FileError::PdfImportFailed {
        detail: e.to_string(),
    })?;
    if doc.is_encrypted() {
        return Err(FileError::PdfImportFailed {
            detail: "document is encrypted".into(),
        });
    }
    if doc.get_pages().is_empty() {
        return Err(FileError::PdfImportFailed {
            detail: "document has no pages".into(),
        });
    }
    Ok(doc)
}

fn extract_docx(bytes: &[u8], original_name: &str) -> String {
    match docx_lite::extract_text_from_bytes(bytes) {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => "(empty document)".to_string(),
        Err(e) => {
            warn!("DOCX extraction failed for '{}': {}", original_name, e);
            DOCX_UNREADABLE.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(content: ExtractedContent) -> String {
        match content {
            ExtractedContent::Text(t) => t,
            other => panic!("expected text, got {}", other.kind_name()),
        }
    }

    #[test]
    fn plain_text_is_recovered() {
        let config = ConversionConfig::default();
        let out = dispatch(SourceKind::Text, b"Hello world".to_vec(), "a.txt", &config).unwrap();
        assert_eq!(text_of(out), "Hello world");
    }

    #[test]
    fn euc_kr_text_is_recovered() {
        let config = ConversionConfig::default();
        let (bytes, _, _) = encoding_rs::EUC_KR.encode("회의록 초안입니다");
        let out = dispatch(SourceKind::Text, bytes.into_owned(), "memo.txt", &config).unwrap();
        assert_eq!(text_of(out), "회의록 초안입니다");
    }

    #[test]
    fn html_is_stripped() {
        let config = ConversionConfig::default();
        let html = b"<html><script>x()</script><p>Hi &amp; bye</p></html>".to_vec();
        let out = dispatch(SourceKind::Html, html, "page.html", &config).unwrap();
        assert_eq!(text_of(out), "Hi & bye");
    }

    #[test]
    fn corrupt_docx_yields_diagnostic() {
        let config = ConversionConfig::default();
        let out = dispatch(SourceKind::Docx, b"PK\x03\x04garbage".to_vec(), "r.docx", &config).unwrap();
        assert_eq!(text_of(out), DOCX_UNREADABLE);
    }

    #[test]
    fn corrupt_spreadsheet_yields_diagnostic() {
        let config = ConversionConfig::default();
        let out = dispatch(SourceKind::Spreadsheet, b"nope".to_vec(), "s.xlsx", &config).unwrap();
        assert!(text_of(out).starts_with("Cannot read this spreadsheet"));
    }

    #[test]
    fn images_pass_through() {
        let config = ConversionConfig::default();
        let out = dispatch(SourceKind::Image, vec![1, 2, 3], "a.png", &config).unwrap();
        assert!(matches!(out, ExtractedContent::Raster(b) if b == vec![1, 2, 3]));
    }

    #[test]
    fn corrupt_pdf_is_an_error() {
        let config = ConversionConfig::default();
        let err = dispatch(SourceKind::Pdf, b"%PDF-1.4 broken".to_vec(), "a.pdf", &config).unwrap_err();
        assert!(matches!(err, FileError::PdfImportFailed { .. }));
    }

    #[test]
    fn hwp_salvage_never_fails() {
        let config = ConversionConfig::default();
        let out = dispatch(SourceKind::LegacyHwp, vec![0xD0, 0xCF, 0x11, 0xE0], "old.hwp", &config).unwrap();
        assert!(text_of(out).contains("old.hwp"));
    }
}
