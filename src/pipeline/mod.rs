//! Pipeline stages for document-to-PDF conversion.
//!
//! Each submodule implements one transformation step and can be tested on
//! its own. Only [`assemble`] knows about the whole batch.
//!
//! ## Data Flow
//!
//! ```text
//!               ┌─ NativePdf ───────────────────────────────────────────┐
//! input ──▶ dispatch ─┼─ Text ──▶ layout ──▶ render ──▶ encode ──┐        ├─▶ assemble
//! (read,    (per      │  (encoding / postprocess / spreadsheet /  │        │   (lopdf)
//!  classify) format)  │   salvage feed the text branch)           ├─ page ─┘
//!               └─ Raster ──────────────────────▶ encode ─────────┘
//!                                   ▲
//!                        compress (one plan per request)
//! ```
//!
//! 1. [`input`]       — classify by extension, read bytes, detect vanished sources
//! 2. [`dispatch`]    — per-format extraction; failures become diagnostic text
//! 3. [`encoding`]    — candidate-chain decoding of bytes with unknown encoding
//! 4. [`postprocess`] — HTML to text, control-character and whitespace cleanup
//! 5. [`spreadsheet`] — workbook flattening with layered open strategies
//! 6. [`salvage`]     — heuristic text mining from legacy HWP binaries
//! 7. [`layout`]      — wrap text into a fixed line/character budget
//! 8. [`render`]      — draw a page description onto a canvas
//! 9. [`encode`]      — JPEG encoding at the planned quality
//! 10. [`compress`]   — requested tier or size budget → quality
//! 11. [`assemble`]   — ordered merge into one PDF with per-file error pages

pub mod assemble;
pub mod compress;
pub mod dispatch;
pub mod encode;
pub mod encoding;
pub mod input;
pub mod layout;
pub mod postprocess;
pub mod render;
pub mod salvage;
pub mod spreadsheet;
