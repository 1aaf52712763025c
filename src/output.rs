//! Request, result and response types.
//!
//! Wire names follow the upload service's JSON contract (camelCase, with the
//! `KB` suffix kept upper-case).

use crate::error::{Docs2PdfError, FileError};
use crate::pipeline::compress::{CompressionPlan, CompressionTier};
use crate::storage::FileDescriptor;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A conversion request as posted by the upload front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    pub files: Vec<FileDescriptor>,
    #[serde(default)]
    pub compression: CompressionTier,
    #[serde(rename = "targetSizeKB", default, skip_serializing_if = "Option::is_none")]
    pub target_size_kb: Option<f64>,
    /// Requested output/input ratio in `(0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f64>,
}

impl ConversionRequest {
    pub fn new(files: Vec<FileDescriptor>, compression: CompressionTier) -> Self {
        Self {
            files,
            compression,
            target_size_kb: None,
            compression_ratio: None,
        }
    }

    pub fn with_target_size_kb(mut self, kb: f64) -> Self {
        self.target_size_kb = Some(kb);
        self
    }

    pub fn with_ratio(mut self, ratio: f64) -> Self {
        self.compression_ratio = Some(ratio);
        self
    }

    /// Target size in bytes, when one was requested. Negative and NaN
    /// sizes are treated as zero.
    pub fn target_size_bytes(&self) -> Option<u64> {
        self.target_size_kb
            .map(|kb| if kb.is_finite() && kb > 0.0 { (kb * 1024.0).round() as u64 } else { 0 })
    }

    /// Sum of the declared sizes of every file in the batch.
    pub fn aggregate_input_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.byte_size).sum()
    }
}

/// What happened to one input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum FileStatus {
    /// Pages copied verbatim from a PDF.
    Native { pages: usize },
    /// One synthesised raster page.
    Rendered,
    /// One error banner page.
    ErrorPage { error: FileError },
    /// Source was missing; no page emitted.
    Skipped,
}

impl FileStatus {
    /// Pages this file contributed to the output.
    pub fn pages(&self) -> usize {
        match self {
            FileStatus::Native { pages } => *pages,
            FileStatus::Rendered | FileStatus::ErrorPage { .. } => 1,
            FileStatus::Skipped => 0,
        }
    }
}

/// Per-file entry of a [`ConversionResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    pub name: String,
    #[serde(flatten)]
    pub status: FileStatus,
}

/// Result of one successful conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    /// Where the merged PDF was written.
    pub output_path: PathBuf,
    /// File name of the artefact (`merged-<uuid>.pdf`).
    pub filename: String,
    /// Serialised length of the merged PDF.
    pub output_bytes: u64,
    #[serde(rename = "originalSizeKB")]
    pub original_size_kb: f64,
    #[serde(rename = "compressedSizeKB")]
    pub compressed_size_kb: f64,
    pub savings_percent: u32,
    pub page_count: usize,
    pub plan: CompressionPlan,
    pub files: Vec<FileOutcome>,
}

impl ConversionResult {
    pub fn failed_files(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::ErrorPage { .. }))
    }
}

/// Response returned to the upload front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(rename = "originalSizeKB", default)]
    pub original_size_kb: f64,
    #[serde(rename = "compressedSizeKB", default)]
    pub compressed_size_kb: f64,
    /// Savings in percent.
    #[serde(default)]
    pub compression_ratio: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConversionResponse {
    pub fn from_result(result: &ConversionResult, download_url_prefix: &str) -> Self {
        Self {
            success: true,
            filename: Some(result.filename.clone()),
            download_url: Some(format!("{}{}", download_url_prefix, result.filename)),
            original_size_kb: result.original_size_kb,
            compressed_size_kb: result.compressed_size_kb,
            compression_ratio: result.savings_percent,
            error: None,
        }
    }

    pub fn failure(error: &Docs2PdfError) -> Self {
        Self {
            success: false,
            filename: None,
            download_url: None,
            original_size_kb: 0.0,
            compressed_size_kb: 0.0,
            compression_ratio: 0,
            error: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> ConversionResult {
        ConversionResult {
            output_path: PathBuf::from("/tmp/merged-x.pdf"),
            filename: "merged-x.pdf".into(),
            output_bytes: 2048,
            original_size_kb: 10.0,
            compressed_size_kb: 2.0,
            savings_percent: 80,
            page_count: 2,
            plan: CompressionPlan {
                quality_percent: 80,
                target_ratio: 0.7,
            },
            files: vec![
                FileOutcome {
                    name: "a.pdf".into(),
                    status: FileStatus::Native { pages: 1 },
                },
                FileOutcome {
                    name: "b.png".into(),
                    status: FileStatus::ErrorPage {
                        error: FileError::RasterDecodeFailed {
                            detail: "bad header".into(),
                        },
                    },
                },
            ],
        }
    }

    #[test]
    fn request_wire_format() {
        let json = r#"{
            "files": [],
            "compression": "custom",
            "targetSizeKB": 100,
            "compressionRatio": 0.5
        }"#;
        let req: ConversionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.compression, CompressionTier::Custom);
        assert_eq!(req.target_size_bytes(), Some(102_400));
        assert_eq!(req.compression_ratio, Some(0.5));
    }

    #[test]
    fn request_defaults_to_medium() {
        let req: ConversionRequest = serde_json::from_str(r#"{"files": []}"#).unwrap();
        assert_eq!(req.compression, CompressionTier::Medium);
        assert_eq!(req.target_size_bytes(), None);
    }

    #[test]
    fn negative_target_is_zero() {
        let req = ConversionRequest::new(Vec::new(), CompressionTier::Custom).with_target_size_kb(-5.0);
        assert_eq!(req.target_size_bytes(), Some(0));
    }

    #[test]
    fn response_from_result() {
        let resp = ConversionResponse::from_result(&result(), "/download/");
        assert!(resp.success);
        assert_eq!(resp.download_url.as_deref(), Some("/download/merged-x.pdf"));
        assert_eq!(resp.compression_ratio, 80);

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["originalSizeKB"], 10.0);
        assert_eq!(json["compressedSizeKB"], 2.0);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn failure_response() {
        let resp = ConversionResponse::failure(&Docs2PdfError::NoFiles);
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("No files were provided"));
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("downloadUrl").is_none());
    }

    #[test]
    fn outcomes_serialize_with_status_tag() {
        let r = result();
        let json = serde_json::to_value(&r.files).unwrap();
        assert_eq!(json[0]["status"], "native");
        assert_eq!(json[0]["pages"], 1);
        assert_eq!(json[1]["status"], "errorPage");
        assert_eq!(r.failed_files().count(), 1);
        assert_eq!(r.files.iter().map(|f| f.status.pages()).sum::<usize>(), 2);
    }
}
