//! PDF assembly: walk the batch in order and merge every file's page(s) into
//! one output document.
//!
//! Native PDF pages are moved across object-for-object (renumbered past the
//! output's current maximum id, re-parented under the output page tree).
//! Everything else becomes one 595×842 pt page holding a centred image.
//! A file that fails anywhere below this loop is replaced by an error banner
//! page; only serialising the finished document can fail the request.

use crate::config::ConversionConfig;
use crate::error::{Docs2PdfError, FileError};
use crate::output::{FileOutcome, FileStatus};
use crate::pipeline::compress::CompressionPlan;
use crate::pipeline::dispatch::{dispatch, ExtractedContent};
use crate::pipeline::encode::{EncodedRaster, RasterData};
use crate::pipeline::input::{read_source, ResolvedSource, SourceKind};
use crate::pipeline::layout::layout;
use crate::pipeline::render::PageRenderer;
use crate::storage::FileDescriptor;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, warn};

/// Synthesised page size in points (A4).
pub const PAGE_WIDTH_PT: f32 = 595.0;
pub const PAGE_HEIGHT_PT: f32 = 842.0;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Ancestor levels searched for inherited attributes.
const MAX_TREE_DEPTH: usize = 32;

/// The merged document before serialisation.
pub struct OutputDocument {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
}

impl Default for OutputDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDocument {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Move every page of `src` into the output, in page order. Returns the
    /// number of pages added.
    pub fn append_native(&mut self, mut src: Document) -> usize {
        src.renumber_objects_with(self.doc.max_id + 1);

        let page_ids: Vec<ObjectId> = src.get_pages().into_values().collect();
        let mut pages: Vec<(ObjectId, Dictionary)> = Vec::with_capacity(page_ids.len());
        for page_id in &page_ids {
            let Ok(dict) = src.get_dictionary(*page_id) else {
                warn!("Page object {:?} is not a dictionary; dropped", page_id);
                continue;
            };
            let mut dict = dict.clone();
            for key in INHERITABLE {
                if !dict.has(key) {
                    if let Some(value) = inherited_attribute(&src, &dict, key) {
                        dict.set(key.to_vec(), value);
                    }
                }
            }
            if !dict.has(b"MediaBox") {
                dict.set("MediaBox", a4_media_box());
            }
            dict.set("Parent", Object::Reference(self.pages_id));
            pages.push((*page_id, dict));
        }

        for (id, object) in std::mem::take(&mut src.objects) {
            match object.type_name().unwrap_or(b"") {
                b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline" => {}
                _ => {
                    self.doc.objects.insert(id, object);
                }
            }
        }

        let added = pages.len();
        for (id, dict) in pages {
            self.doc.objects.insert(id, Object::Dictionary(dict));
            self.kids.push(id);
        }
        self.doc.max_id = self.doc.max_id.max(src.max_id);
        debug!("Copied {} native page(s)", added);
        added
    }

    /// Add one page showing `raster`, scaled to fit and centred.
    pub fn append_image_page(&mut self, raster: &EncodedRaster) {
        let (filter, bytes) = match &raster.data {
            RasterData::Jpeg(b) => (Some("DCTDecode"), b.clone()),
            RasterData::Rgb(b) => (None, b.clone()),
        };

        let mut image_dict = Dictionary::from_iter([
            ("Type", Object::Name(b"XObject".to_vec())),
            ("Subtype", Object::Name(b"Image".to_vec())),
            ("Width", Object::Integer(i64::from(raster.width))),
            ("Height", Object::Integer(i64::from(raster.height))),
            ("ColorSpace", Object::Name(b"DeviceRGB".to_vec())),
            ("BitsPerComponent", Object::Integer(8)),
        ]);
        if let Some(filter) = filter {
            image_dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
        }
        let image_id = self.doc.add_object(Stream::new(image_dict, bytes));

        let (w, h, x, y) = fit_centered(raster.width, raster.height);
        let content = format!("q {w:.2} 0 0 {h:.2} {x:.2} {y:.2} cm /Im0 Do Q");
        let content_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let resources = Dictionary::from_iter([(
            "XObject",
            Object::Dictionary(Dictionary::from_iter([("Im0", Object::Reference(image_id))])),
        )]);
        let page_id = self.doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(self.pages_id)),
            ("MediaBox", a4_media_box()),
            ("Resources", Object::Dictionary(resources)),
            ("Contents", Object::Reference(content_id)),
        ]));
        self.kids.push(page_id);
    }

    /// Build the page tree and catalog, compress streams and serialise.
    pub fn finish(mut self) -> Result<Vec<u8>, Docs2PdfError> {
        let kids: Vec<Object> = self.kids.iter().map(|&id| Object::Reference(id)).collect();
        let pages = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(self.kids.len() as i64)),
        ]);
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(self.pages_id)),
        ]));
        self.doc.trailer.set("Root", Object::Reference(catalog_id));
        self.doc.compress();

        let mut output = Vec::new();
        self.doc
            .save_to(&mut output)
            .map_err(|e| Docs2PdfError::AssemblyFailed {
                detail: format!("failed to serialise merged PDF: {e}"),
            })?;
        Ok(output)
    }
}

fn a4_media_box() -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(PAGE_WIDTH_PT as i64),
        Object::Integer(PAGE_HEIGHT_PT as i64),
    ])
}

/// Scaled size and origin of an image fitted inside the page.
pub fn fit_centered(width: u32, height: u32) -> (f32, f32, f32, f32) {
    let (iw, ih) = (width.max(1) as f32, height.max(1) as f32);
    let scale = (PAGE_WIDTH_PT / iw).min(PAGE_HEIGHT_PT / ih);
    let (w, h) = (iw * scale, ih * scale);
    (w, h, (PAGE_WIDTH_PT - w) / 2.0, (PAGE_HEIGHT_PT - h) / 2.0)
}

/// Walk up `Parent` links looking for `key`.
fn inherited_attribute(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

/// Serialised output plus everything needed for the size report.
#[derive(Debug)]
pub struct Assembly {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub files: Vec<FileOutcome>,
    pub original_bytes: u64,
}

/// Size accounting in KB (1024 bytes).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeReport {
    pub original_size_kb: f64,
    pub compressed_size_kb: f64,
    pub savings_percent: u32,
}

impl SizeReport {
    pub fn new(original_bytes: u64, compressed_bytes: u64) -> Self {
        let savings = if original_bytes == 0 {
            0.0
        } else {
            ((1.0 - compressed_bytes as f64 / original_bytes as f64) * 100.0).round()
        };
        Self {
            original_size_kb: round2(original_bytes as f64 / 1024.0),
            compressed_size_kb: round2(compressed_bytes as f64 / 1024.0),
            savings_percent: savings.max(0.0) as u32,
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

impl Assembly {
    pub fn size_report(&self) -> SizeReport {
        SizeReport::new(self.original_bytes, self.bytes.len() as u64)
    }
}

/// Merge `files` in order into one PDF at the plan's quality.
///
/// Blocking; call from `spawn_blocking` in async contexts.
pub fn assemble(
    files: &[FileDescriptor],
    plan: &CompressionPlan,
    config: &ConversionConfig,
) -> Result<Assembly, Docs2PdfError> {
    let total = files.len();
    let renderer = PageRenderer::new(config);
    let mut out = OutputDocument::new();
    let mut outcomes = Vec::with_capacity(total);
    let cb = config.progress_callback.as_ref();

    info!(
        "Assembling {} file(s) at quality {}",
        total, plan.quality_percent
    );
    if !renderer.has_font() {
        debug!("Text pages will use placeholder glyphs");
    }
    if let Some(cb) = cb {
        cb.on_conversion_start(total);
    }

    for (index, file) in files.iter().enumerate() {
        let name = file.original_name.as_str();
        if let Some(cb) = cb {
            cb.on_file_start(index, total, name);
        }

        let status = match process_file(file, &mut out, &renderer, plan, config) {
            Ok(status) => status,
            Err(e) => {
                warn!("'{}' replaced by error page: {}", name, e);
                let page = renderer.render_error_page(name, &e.to_string(), plan.quality_percent);
                out.append_image_page(&page);
                FileStatus::ErrorPage { error: e }
            }
        };

        if let Some(cb) = cb {
            match &status {
                FileStatus::Skipped => cb.on_file_skipped(index, total, name),
                FileStatus::ErrorPage { error } => cb.on_file_error(index, total, name, &error.to_string()),
                other => cb.on_file_complete(index, total, name, other.pages()),
            }
        }
        outcomes.push(FileOutcome {
            name: name.to_string(),
            status,
        });
    }

    let page_count = out.page_count();
    let bytes = out.finish()?;
    let original_bytes = files.iter().map(|f| f.byte_size).sum();

    info!(
        "Assembled {} page(s) from {} file(s): {} bytes",
        page_count,
        total,
        bytes.len()
    );
    if let Some(cb) = cb {
        cb.on_conversion_complete(total, page_count);
    }

    Ok(Assembly {
        bytes,
        page_count,
        files: outcomes,
        original_bytes,
    })
}

/// Turn one file into page(s) on `out`.
fn process_file(
    file: &FileDescriptor,
    out: &mut OutputDocument,
    renderer: &PageRenderer,
    plan: &CompressionPlan,
    config: &ConversionConfig,
) -> Result<FileStatus, FileError> {
    let bytes = match read_source(&file.storage_path)? {
        ResolvedSource::Missing => {
            warn!(
                "Source for '{}' is missing ({}); skipped",
                file.original_name,
                file.storage_path.display()
            );
            return Ok(FileStatus::Skipped);
        }
        ResolvedSource::Bytes(bytes) => bytes,
    };

    let kind = SourceKind::classify(&file.original_name, &file.storage_path);
    let content = dispatch(kind, bytes, &file.original_name, config)?;
    debug!("'{}' extracted as {}", file.original_name, content.kind_name());
    let status = match content {
        ExtractedContent::NativePdf(doc) => FileStatus::Native {
            pages: out.append_native(doc),
        },
        ExtractedContent::Text(text) => {
            let page = layout(&file.original_name, &text, config.max_lines, config.max_line_chars);
            let raster = renderer.render_text_page(&page, plan.quality_percent);
            out.append_image_page(&raster);
            FileStatus::Rendered
        }
        ExtractedContent::Raster(bytes) => {
            let raster = renderer.reencode(&bytes, plan.quality_percent)?;
            out.append_image_page(&raster);
            FileStatus::Rendered
        }
    };
    info!("'{}' → {} page(s)", file.original_name, status.pages());
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::blank_canvas;

    fn sample_pdf(pages: usize) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for i in 0..pages {
            let content = format!("BT /F1 12 Tf 72 720 Td (page {i}) Tj ET");
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
            let page_id = doc.add_object(Dictionary::from_iter([
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                ("Contents", Object::Reference(content_id)),
            ]));
            kids.push(Object::Reference(page_id));
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter([
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(kids)),
                ("Count", Object::Integer(pages as i64)),
                (
                    "MediaBox",
                    Object::Array(vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(612),
                        Object::Integer(792),
                    ]),
                ),
            ])),
        );
        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc
    }

    #[test]
    fn native_pages_keep_order_and_inherit_media_box() {
        let mut out = OutputDocument::new();
        assert_eq!(out.append_native(sample_pdf(3)), 3);
        let bytes = out.finish().unwrap();

        let merged = Document::load_mem(&bytes).unwrap();
        let pages = merged.get_pages();
        assert_eq!(pages.len(), 3);
        for (i, page_id) in pages.values().enumerate() {
            let page = merged.get_dictionary(*page_id).unwrap();
            let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
            assert_eq!(media_box[2].as_i64().unwrap(), 612);
            let content = merged.get_page_content(*page_id).unwrap();
            let text = String::from_utf8_lossy(&content);
            assert!(text.contains(&format!("(page {i})")), "page {i}: {text}");
        }
    }

    #[test]
    fn mixed_pages_in_order() {
        let mut out = OutputDocument::new();
        out.append_image_page(&blank_canvas());
        out.append_native(sample_pdf(2));
        out.append_image_page(&blank_canvas());
        assert_eq!(out.page_count(), 4);
        let merged = Document::load_mem(&out.finish().unwrap()).unwrap();
        assert_eq!(merged.get_pages().len(), 4);
    }

    #[test]
    fn empty_document_serialises() {
        let bytes = OutputDocument::new().finish().unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
    }

    #[test]
    fn fit_preserves_aspect_and_centres() {
        let (w, h, x, y) = fit_centered(1000, 1000);
        assert!((w - 595.0).abs() < 0.01 && (h - 595.0).abs() < 0.01);
        assert!(x.abs() < 0.01);
        assert!((y - (842.0 - 595.0) / 2.0).abs() < 0.01);

        let (w, h, _, y) = fit_centered(794, 1123);
        assert!((w - 595.0).abs() < 0.01);
        assert!(h <= 842.0 && y >= 0.0);
    }

    #[test]
    fn size_report_math() {
        let r = SizeReport::new(1024 * 1000, 1024 * 250);
        assert_eq!(r.original_size_kb, 1000.0);
        assert_eq!(r.compressed_size_kb, 250.0);
        assert_eq!(r.savings_percent, 75);
    }

    #[test]
    fn growth_reports_zero_savings() {
        assert_eq!(SizeReport::new(100, 5000).savings_percent, 0);
        assert_eq!(SizeReport::new(0, 5000).savings_percent, 0);
    }
}
