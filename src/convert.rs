//! Conversion entry points.
//!
//! [`convert`] plans compression, runs the blocking assembly loop on the
//! blocking thread pool, writes the merged PDF atomically into
//! `config.output_dir`, and reclaims the batch's source files.
//! [`convert_request`] wraps it for the upload service: it never returns an
//! error, only a success or failure response.

use crate::config::ConversionConfig;
use crate::error::Docs2PdfError;
use crate::output::{ConversionRequest, ConversionResponse, ConversionResult};
use crate::pipeline::assemble::assemble;
use crate::pipeline::compress::plan;
use crate::storage::remove_sources;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Convert a batch into one PDF.
///
/// The batch is assumed to have passed [`crate::storage::validate_batch`].
///
/// # Errors
/// Returns `Err(Docs2PdfError)` only for fatal errors:
/// - unusable compression settings
/// - the merged document could not be serialised
/// - the output file could not be written
///
/// Per-file failures are reported in [`ConversionResult::files`].
pub async fn convert(
    request: &ConversionRequest,
    config: &ConversionConfig,
) -> Result<ConversionResult, Docs2PdfError> {
    let start = Instant::now();
    info!(
        "Starting conversion: {} file(s), compression {}",
        request.files.len(),
        request.compression
    );

    let result = run(request, config).await;

    if config.delete_sources {
        let files = request.files.clone();
        let removed = tokio::task::spawn_blocking(move || remove_sources(&files))
            .await
            .unwrap_or_else(|e| {
                warn!("Source cleanup task failed: {}", e);
                0
            });
        debug!("Removed {} source file(s)", removed);
    }

    if let Ok(ref r) = result {
        info!(
            "Conversion complete: {} page(s), {} KB → {} KB ({}% saved) in {}ms",
            r.page_count,
            r.original_size_kb,
            r.compressed_size_kb,
            r.savings_percent,
            start.elapsed().as_millis()
        );
    }
    result
}

async fn run(
    request: &ConversionRequest,
    config: &ConversionConfig,
) -> Result<ConversionResult, Docs2PdfError> {
    let plan = plan(
        request.compression,
        request.target_size_bytes(),
        request.compression_ratio,
        request.aggregate_input_bytes(),
    )?;

    let files = request.files.clone();
    let task_config = config.clone();
    let assembly = tokio::task::spawn_blocking(move || assemble(&files, &plan, &task_config))
        .await
        .map_err(|e| Docs2PdfError::Internal(format!("Assembly task panicked: {}", e)))??;

    let report = assembly.size_report();
    let filename = format!("merged-{}.pdf", Uuid::new_v4());
    let output_path = config.output_dir.join(&filename);
    write_atomic(&output_path, &assembly.bytes).await?;

    Ok(ConversionResult {
        output_path,
        filename,
        output_bytes: assembly.bytes.len() as u64,
        original_size_kb: report.original_size_kb,
        compressed_size_kb: report.compressed_size_kb,
        savings_percent: report.savings_percent,
        page_count: assembly.page_count,
        plan,
        files: assembly.files,
    })
}

/// Write via a temp file and rename so readers never see a partial PDF.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Docs2PdfError> {
    let write_err = |e| Docs2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    request: &ConversionRequest,
    config: &ConversionConfig,
) -> Result<ConversionResult, Docs2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Docs2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(request, config))
}

/// Convert and map the outcome onto the service response.
pub async fn convert_request(
    request: &ConversionRequest,
    config: &ConversionConfig,
) -> ConversionResponse {
    match convert(request, config).await {
        Ok(result) => ConversionResponse::from_result(&result, &config.download_url_prefix),
        Err(e) => {
            warn!("Conversion failed: {}", e);
            ConversionResponse::failure(&e)
        }
    }
}

/// Copy a finished artefact to a caller-chosen location.
pub async fn copy_output(result: &ConversionResult, dest: impl AsRef<Path>) -> Result<PathBuf, Docs2PdfError> {
    let dest = dest.as_ref().to_path_buf();
    let bytes = tokio::fs::read(&result.output_path)
        .await
        .map_err(|e| Docs2PdfError::OutputWriteFailed {
            path: result.output_path.clone(),
            source: e,
        })?;
    write_atomic(&dest, &bytes).await?;
    Ok(dest)
}

/// Move a finished artefact to a caller-chosen location, removing the copy
/// left in the output directory.
pub async fn move_output(result: &ConversionResult, dest: impl AsRef<Path>) -> Result<PathBuf, Docs2PdfError> {
    let dest = dest.as_ref();
    if dest == result.output_path {
        return Ok(dest.to_path_buf());
    }
    let dest = copy_output(result, dest).await?;
    if let Err(e) = tokio::fs::remove_file(&result.output_path).await {
        warn!("Could not remove {}: {}", result.output_path.display(), e);
    }
    Ok(dest)
}
