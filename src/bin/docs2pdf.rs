//! CLI binary for docs2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use docs2pdf::{
    convert, move_output, validate_batch, CompressionTier, ConversionConfig,
    ConversionProgressCallback, ConversionRequest, ConversionResponse, FileDescriptor,
    FileStatus, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the batch plus a log line per file.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-file wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Planning compression…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Merging");
    }

    fn elapsed(&self, index: usize) -> String {
        let ms = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        dim(&format!("{:.1}s", ms as f64 / 1000.0))
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_files: usize) {
        self.activate_bar(total_files);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Merging {total_files} file(s)…"))
        ));
    }

    fn on_file_start(&self, index: usize, _total: usize, name: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_file_complete(&self, index: usize, total: usize, name: &str, pages: usize) {
        self.bar.println(format!(
            "  {} {:>2}/{:<2}  {:<32}  {}  {}",
            green("✓"),
            index + 1,
            total,
            name,
            dim(&format!("{pages:>3} page(s)")),
            self.elapsed(index),
        ));
        self.bar.inc(1);
    }

    fn on_file_skipped(&self, index: usize, total: usize, name: &str) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {:>2}/{:<2}  {:<32}  {}",
            yellow("–"),
            index + 1,
            total,
            name,
            dim("missing, skipped"),
        ));
        self.elapsed(index);
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, name: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.chars().count() > 80 {
            let head: String = error.chars().take(79).collect();
            format!("{head}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>2}/{:<2}  {:<32}  {}  {}",
            red("✗"),
            index + 1,
            total,
            name,
            red(&msg),
            self.elapsed(index),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_files: usize, total_pages: usize) {
        self.bar.finish_and_clear();
        let errors = self.errors.load(Ordering::SeqCst);
        let skipped = self.skipped.load(Ordering::SeqCst);

        if errors == 0 && skipped == 0 {
            eprintln!(
                "{} {} file(s) merged into {} page(s)",
                green("✔"),
                bold(&total_files.to_string()),
                bold(&total_pages.to_string())
            );
        } else {
            eprintln!(
                "{} {} file(s) → {} page(s)  ({} error page(s), {} skipped)",
                cyan("⚠"),
                bold(&total_files.to_string()),
                total_pages,
                red(&errors.to_string()),
                skipped,
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Merge with the default (medium) compression
  docs2pdf scan.jpg report.pdf budget.xlsx -o merged.pdf

  # Aim for roughly 500 KB
  docs2pdf --compression custom --target-size-kb 500 *.png -o small.pdf

  # Keep about 40% of the input size
  docs2pdf --compression custom --ratio 0.4 notes.txt page.html -o out.pdf

  # JSON response, as the upload service would return it
  docs2pdf --json letter.hwp memo.docx

SUPPORTED INPUTS:
  Images         jpg jpeg png gif bmp webp tif tiff   re-encoded at the planned quality
  PDF            pdf                                   pages copied verbatim
  Word           docx                                  text extracted, one page
  Excel          xlsx xls                              first 3 sheets × 20 rows, one page
  Text / HTML    txt html htm (and anything else)      encoding recovered, one page
  Hangul (HWP)   hwp hwpx                              best-effort text salvage, one page

COMPRESSION TIERS:
  low     JPEG quality 95
  medium  JPEG quality 80 (default)
  high    JPEG quality 60
  custom  95/85/70/55/40 by output/input ratio (from --target-size-kb or --ratio)

ENVIRONMENT VARIABLES:
  DOCS2PDF_COMPRESSION    Default compression tier
  DOCS2PDF_FONT           TrueType/OpenType font used for text pages
  DOCS2PDF_OUTPUT_DIR     Directory for the merged artefact (default: system temp)
  RUST_LOG                Override log filter (e.g. docs2pdf=debug)
"#;

/// Merge documents of mixed formats into one size-budgeted PDF.
#[derive(Parser, Debug)]
#[command(
    name = "docs2pdf",
    version,
    about = "Merge images, PDFs, Office files, text, HTML and HWP into one PDF",
    long_about = "Merge a batch of documents of mixed formats into a single PDF. PDF pages are \
copied verbatim; every other file becomes one page. The JPEG quality of synthesised pages is \
chosen from a compression tier or an explicit size budget.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input files, merged in the order given (at most 20, 50 MiB each).
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Copy the merged PDF to this path.
    #[arg(short, long, env = "DOCS2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Compression tier: low, medium, high, custom.
    #[arg(long, env = "DOCS2PDF_COMPRESSION", value_enum, default_value = "medium")]
    compression: CompressionArg,

    /// Target output size in KB (custom tier).
    #[arg(long, env = "DOCS2PDF_TARGET_SIZE_KB")]
    target_size_kb: Option<f64>,

    /// Target output/input ratio in (0, 1] (custom tier).
    #[arg(long, env = "DOCS2PDF_RATIO")]
    ratio: Option<f64>,

    /// Font for text pages (TrueType/OpenType).
    #[arg(long, env = "DOCS2PDF_FONT")]
    font: Option<PathBuf>,

    /// Directory the merged artefact is written to.
    #[arg(long, env = "DOCS2PDF_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Maximum lines per text page.
    #[arg(long, env = "DOCS2PDF_MAX_LINES", default_value_t = 40)]
    max_lines: usize,

    /// Maximum characters per text line.
    #[arg(long, env = "DOCS2PDF_MAX_LINE_CHARS", default_value_t = 70)]
    max_line_chars: usize,

    /// Delete the input files after merging.
    #[arg(long, env = "DOCS2PDF_DELETE_SOURCES")]
    delete_sources: bool,

    /// Print the service JSON response instead of a summary.
    #[arg(long, env = "DOCS2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCS2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCS2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCS2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum CompressionArg {
    Low,
    Medium,
    High,
    Custom,
}

impl From<CompressionArg> for CompressionTier {
    fn from(v: CompressionArg) -> Self {
        match v {
            CompressionArg::Low => CompressionTier::Low,
            CompressionArg::Medium => CompressionTier::Medium,
            CompressionArg::High => CompressionTier::High,
            CompressionArg::Custom => CompressionTier::Custom,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Admission ────────────────────────────────────────────────────────
    let files = cli
        .files
        .iter()
        .map(|p| FileDescriptor::from_path(p).with_context(|| format!("Cannot open {}", p.display())))
        .collect::<Result<Vec<_>>>()?;
    validate_batch(&files).context("Batch rejected")?;

    // ── Build config and request ─────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    let mut request = ConversionRequest::new(files, cli.compression.clone().into());
    if let Some(kb) = cli.target_size_kb {
        request = request.with_target_size_kb(kb);
    }
    if let Some(r) = cli.ratio {
        request = request.with_ratio(r);
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let result = match convert(&request, &config).await {
        Ok(result) => result,
        Err(e) if cli.json => {
            let resp = ConversionResponse::failure(&e);
            println!(
                "{}",
                serde_json::to_string_pretty(&resp).context("Failed to serialise response")?
            );
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Conversion failed"),
    };

    let final_path = match cli.output {
        Some(ref dest) => move_output(&result, dest)
            .await
            .with_context(|| format!("Failed to write {}", dest.display()))?,
        None => result.output_path.clone(),
    };

    if cli.json {
        let resp = ConversionResponse::from_result(&result, &config.download_url_prefix);
        println!(
            "{}",
            serde_json::to_string_pretty(&resp).context("Failed to serialise response")?
        );
        return Ok(());
    }

    if !cli.quiet {
        if !show_progress {
            for file in &result.files {
                let line = match &file.status {
                    FileStatus::Native { pages } => format!("{} page(s) copied", pages),
                    FileStatus::Rendered => "rendered".to_string(),
                    FileStatus::ErrorPage { error } => format!("error page: {error}"),
                    FileStatus::Skipped => "missing, skipped".to_string(),
                };
                eprintln!("  {:<32}  {}", file.name, line);
            }
        }
        eprintln!(
            "{}  {} page(s)  {} KB → {} KB  ({}% saved, quality {})  →  {}",
            if result.failed_files().count() == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            result.page_count,
            result.original_size_kb,
            result.compressed_size_kb,
            result.savings_percent,
            result.plan.quality_percent,
            bold(&final_path.display().to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .max_lines(cli.max_lines)
        .max_line_chars(cli.max_line_chars)
        .delete_sources(cli.delete_sources);

    if let Some(ref font) = cli.font {
        builder = builder.font_path(font);
    }
    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_dir(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
