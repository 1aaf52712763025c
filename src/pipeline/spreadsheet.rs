//! Spreadsheet flattening: workbook → bar-separated plain text.
//!
//! Only the first few sheets and rows are kept; the result is rendered onto a
//! single page, so anything more would be truncated by layout anyway.
//! Workbooks are opened with three progressively looser strategies because
//! legacy `.xls` files written by Korean Excel frequently carry codepage
//! records that the default reader rejects.

use calamine::{open_workbook_auto_from_rs, Data, Reader, Sheets, Xls, XlsOptions, Xlsx};
use std::io::Cursor;
use tracing::{debug, warn};

/// Codepage forced on the first `.xls` attempt (Korean, Unified Hangul Code).
const LEGACY_CODEPAGE: u16 = 949;

/// Column window used when a sheet has to be streamed cell by cell.
const FALLBACK_MAX_COLS: u32 = 30;

/// Diagnostic emitted when no strategy can open the workbook.
pub const SPREADSHEET_UNREADABLE: &str = "Cannot read this spreadsheet.";

type Workbook = Sheets<Cursor<Vec<u8>>>;
type XlsxBook = Xlsx<Cursor<Vec<u8>>>;

/// Row and sheet limits for flattening.
#[derive(Debug, Clone, Copy)]
pub struct SheetLimits {
    pub max_sheets: usize,
    pub max_rows: usize,
}

/// One sheet, already cut to the row limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetText {
    pub name: String,
    pub rows: Vec<String>,
    pub total_rows: usize,
    /// Extra line printed after the rows (partial reads).
    pub note: Option<String>,
}

impl SheetText {
    /// Keep the first `max_rows` rows, each joined with `" | "`.
    pub fn from_rows(name: impl Into<String>, rows: Vec<Vec<String>>, max_rows: usize) -> Self {
        let total_rows = rows.len();
        let rows = rows
            .into_iter()
            .take(max_rows)
            .map(|cells| cells.join(" | "))
            .collect();
        Self {
            name: name.into(),
            rows,
            total_rows,
            note: None,
        }
    }
}

/// Flatten a workbook's bytes into text. Never fails: unreadable workbooks
/// produce a diagnostic string.
pub fn extract_workbook_text(bytes: &[u8], extension: &str, limits: SheetLimits) -> String {
    let mut workbook = match open_workbook(bytes, extension) {
        Ok(wb) => wb,
        Err(detail) => {
            warn!("Spreadsheet could not be opened: {}", detail);
            return format!("{SPREADSHEET_UNREADABLE} ({detail})");
        }
    };

    let names = workbook.sheet_names();
    let sheets: Vec<SheetText> = names
        .iter()
        .take(limits.max_sheets)
        .map(|name| read_sheet(&mut workbook, name, limits.max_rows))
        .collect();

    format_workbook(&sheets, names.len())
}

/// Try, in order: forced legacy codepage (`.xls` only), the reader matching
/// the extension, then format auto-detection on the raw buffer.
fn open_workbook(bytes: &[u8], extension: &str) -> Result<Workbook, String> {
    let mut last_error = String::from("unsupported spreadsheet format");

    if extension == "xls" {
        let mut options = XlsOptions::default();
        options.force_codepage = Some(LEGACY_CODEPAGE);
        match Xls::new_with_options(Cursor::new(bytes.to_vec()), options) {
            Ok(xls) => return Ok(Sheets::Xls(xls)),
            Err(e) => {
                debug!("XLS with codepage {} failed: {}", LEGACY_CODEPAGE, e);
                last_error = e.to_string();
            }
        }
    }

    let by_extension = match extension {
        "xls" => Some(Xls::new(Cursor::new(bytes.to_vec())).map(Sheets::Xls).map_err(|e| e.to_string())),
        "xlsx" => Some(Xlsx::new(Cursor::new(bytes.to_vec())).map(Sheets::Xlsx).map_err(|e| e.to_string())),
        _ => None,
    };
    match by_extension {
        Some(Ok(wb)) => return Ok(wb),
        Some(Err(e)) => {
            debug!("Default {} reader failed: {}", extension, e);
            last_error = e;
        }
        None => {}
    }

    open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(|e| {
        debug!("Auto-detected reader failed: {}", e);
        format!("{last_error}; {e}")
    })
}

/// Read a sheet through calamine's range parser. When that fails on an
/// `.xlsx` sheet, stream its cells instead and keep whatever arrived before
/// the failure, bounded to `max_rows` rows and [`FALLBACK_MAX_COLS`] columns.
fn read_sheet(workbook: &mut Workbook, name: &str, max_rows: usize) -> SheetText {
    match workbook.worksheet_range(name) {
        Ok(range) => {
            let rows = range
                .rows()
                .map(|row| row.iter().map(format_cell).collect())
                .collect();
            SheetText::from_rows(name, rows, max_rows)
        }
        Err(e) => {
            debug!("Structured read of sheet '{}' failed: {}", name, e);
            match workbook {
                Sheets::Xlsx(xlsx) => stream_window(xlsx, name, max_rows),
                _ => unreadable_sheet(name, &e.to_string()),
            }
        }
    }
}

fn stream_window(xlsx: &mut XlsxBook, name: &str, max_rows: usize) -> SheetText {
    let mut reader = match xlsx.worksheet_cells_reader(name) {
        Ok(reader) => reader,
        Err(e) => return unreadable_sheet(name, &e.to_string()),
    };

    let mut grid: Vec<Vec<String>> = Vec::new();
    let mut first_row: Option<u32> = None;
    let note = loop {
        match reader.next_cell() {
            Ok(Some(cell)) => {
                let (row, col) = cell.get_position();
                let offset = row.saturating_sub(*first_row.get_or_insert(row)) as usize;
                if offset >= max_rows {
                    break Some("... (further rows not read)".to_string());
                }
                if col >= FALLBACK_MAX_COLS {
                    continue;
                }
                if grid.len() <= offset {
                    grid.resize_with(offset + 1, Vec::new);
                }
                let cells = &mut grid[offset];
                let col = col as usize;
                if cells.len() <= col {
                    cells.resize(col + 1, String::new());
                }
                cells[col] = format_cell(&Data::from(cell.get_value().clone()));
            }
            Ok(None) => break None,
            Err(e) => {
                warn!("Sheet '{}' only partially read: {}", name, e);
                break Some(format!("... (sheet read stopped early: {e})"));
            }
        }
    };

    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut grid {
        row.resize(width, String::new());
    }
    let mut sheet = SheetText::from_rows(name, grid, max_rows);
    sheet.note = note;
    sheet
}

fn unreadable_sheet(name: &str, detail: &str) -> SheetText {
    SheetText {
        name: name.to_string(),
        rows: vec![format!("(sheet could not be read: {detail})")],
        total_rows: 1,
        note: None,
    }
}

/// Render sheets as `[Name]` blocks followed by truncation notices.
pub fn format_workbook(sheets: &[SheetText], total_sheets: usize) -> String {
    let mut out = String::new();
    for sheet in sheets {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("[{}]\n", sheet.name));
        for row in &sheet.rows {
            out.push_str(row);
            out.push('\n');
        }
        if sheet.total_rows > sheet.rows.len() {
            out.push_str(&format!(
                "... ({} more rows)\n",
                sheet.total_rows - sheet.rows.len()
            ));
        }
        if let Some(note) = &sheet.note {
            out.push_str(note);
            out.push('\n');
        }
    }
    if total_sheets > sheets.len() {
        out.push_str(&format!(
            "... ({} more sheets)\n",
            total_sheets - sheets.len()
        ));
    }
    if out.is_empty() {
        out.push_str("(empty workbook)");
    }
    out
}

fn format_cell(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => format!("{:?}", dt),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#ERR: {:?}", e),
    }
}
