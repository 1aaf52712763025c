//! Heuristic text salvage for legacy HWP word-processor files.
//!
//! There is no parser for the format here. Salvage is brute-force text
//! mining: the buffer is decoded under several candidate encodings and runs
//! of Hangul are collected from each decode, while the raw buffer read as a
//! single-byte string contributes its longest readable ASCII/Hangul runs.
//! Fragments are collected only until the character budget is exceeded.
//! The output is inherently lossy and has no structural ground truth.

use crate::pipeline::postprocess::clean_salvaged;
use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Salvaged text shorter than this is replaced by an informational notice.
const MIN_SALVAGE_CHARS: usize = 10;

/// Mixed-run matches kept from the raw single-byte scan.
const MAX_MIXED_RUNS: usize = 10;

/// Suffix appended when the salvage exceeds the budget.
pub const SALVAGE_TRUNCATED_SUFFIX: &str = " ... (content truncated)";

/// Encodings the whole buffer is decoded under.
static SALVAGE_ENCODINGS: Lazy<[&'static Encoding; 4]> = Lazy::new(|| {
    [
        encoding_rs::UTF_16LE,
        encoding_rs::UTF_8,
        encoding_rs::EUC_KR,
        encoding_rs::UTF_16BE,
    ]
});

static RE_HANGUL_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\u{AC00}-\u{D7A3}]{3,}").unwrap());

static RE_MIXED_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9\u{AC00}-\u{D7A3} .,!?()\-]{4,}").unwrap());

/// Salvage readable text from a legacy binary buffer.
///
/// Returns the salvage truncated to `char_budget` characters, or a fixed
/// notice naming the file when too little text was found. Collection stops
/// as soon as the budget is exceeded, so work past that point is skipped.
pub fn salvage_text(bytes: &[u8], file_name: &str, char_budget: usize) -> String {
    let salvaged = collect_fragments(bytes, char_budget);
    let salvaged_chars = salvaged.chars().count();
    debug!(
        "Salvaged {} characters from {} ({} bytes)",
        salvaged_chars,
        file_name,
        bytes.len()
    );

    if salvaged_chars < MIN_SALVAGE_CHARS {
        return unreadable_notice(file_name, bytes.len());
    }

    if salvaged_chars > char_budget {
        let mut clipped: String = salvaged.chars().take(char_budget).collect();
        clipped.push_str(SALVAGE_TRUNCATED_SUFFIX);
        clipped
    } else {
        salvaged
    }
}

/// Cleaned fragments in discovery order, capped just past a character limit.
struct Fragments {
    parts: Vec<String>,
    chars: usize,
    limit: usize,
}

impl Fragments {
    fn new(limit: usize) -> Self {
        Self {
            parts: Vec::new(),
            chars: 0,
            limit,
        }
    }

    fn is_full(&self) -> bool {
        self.chars > self.limit
    }

    /// Returns false once the limit has been passed.
    fn push(&mut self, fragment: &str) -> bool {
        if self.is_full() {
            return false;
        }
        let fragment = clean_salvaged(fragment);
        if !fragment.is_empty() {
            // One separator per fragment after the first.
            self.chars += fragment.chars().count() + usize::from(!self.parts.is_empty());
            self.parts.push(fragment);
        }
        !self.is_full()
    }

    fn into_text(self) -> String {
        self.parts.join(" ")
    }
}

/// Concatenate fragments found in the buffer, without control characters
/// and with whitespace collapsed, until `char_budget` is exceeded.
fn collect_fragments(bytes: &[u8], char_budget: usize) -> String {
    let mut fragments = Fragments::new(char_budget);

    'decodes: for encoding in SALVAGE_ENCODINGS.iter() {
        let (decoded, _) = encoding.decode_without_bom_handling(bytes);
        for m in RE_HANGUL_RUN.find_iter(&decoded) {
            if !fragments.push(m.as_str()) {
                break 'decodes;
            }
        }
    }

    if !fragments.is_full() {
        let raw = single_byte_string(bytes);
        for m in RE_MIXED_RUN.find_iter(&raw).take(MAX_MIXED_RUNS) {
            if !fragments.push(m.as_str()) {
                break;
            }
        }
    }

    fragments.into_text()
}

/// Read every byte as one code point (ISO-8859-1).
fn single_byte_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Notice rendered instead of a salvage that found nothing useful.
pub fn unreadable_notice(file_name: &str, size_bytes: usize) -> String {
    format!(
        "HWP document: {file_name} ({:.1} KB). \
         No readable text could be recovered from this file. \
         To include its content, open it in Hangul (HWP) and save it as PDF or DOCX, \
         or print it to PDF, then upload the converted file.",
        size_bytes as f64 / 1024.0
    )
}

#[cfg(test)]
mod tests {
    //! Salvage is best-effort: these tests pin current behaviour, not
    //! accuracy against real HWP files.
    use super::*;

    fn utf16le(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    #[test]
    fn recovers_utf16le_hangul_from_binary() {
        let mut bytes = vec![0x00, 0x01, 0x02, 0x03, 0x04, 0x05];
        bytes.extend(utf16le("대한민국헌법 전문입니다"));
        bytes.extend([0x00, 0xFF, 0x10, 0x03]);
        let text = salvage_text(&bytes, "law.hwp", 2000);
        assert!(text.contains("대한민국헌법"), "got: {text}");
        assert!(text.contains("전문입니다"), "got: {text}");
    }

    #[test]
    fn recovers_ascii_runs() {
        let mut bytes = vec![0x01, 0x02, 0x03];
        bytes.extend_from_slice(b"Quarterly report 2024");
        bytes.extend([0x00, 0x9F, 0x04]);
        let text = salvage_text(&bytes, "q.hwp", 2000);
        assert!(text.contains("Quarterly report 2024"), "got: {text}");
    }

    #[test]
    fn short_salvage_yields_notice() {
        let text = salvage_text(&[0x00, 0x01, 0xFF, 0xFE], "empty.hwp", 2000);
        assert!(text.contains("empty.hwp"));
        assert!(text.contains("KB"));
    }

    #[test]
    fn long_salvage_is_truncated() {
        let body = "abcdefghij ".repeat(50);
        let text = salvage_text(body.as_bytes(), "long.hwp", 20);
        assert!(text.ends_with(SALVAGE_TRUNCATED_SUFFIX));
        assert_eq!(
            text.chars().count(),
            20 + SALVAGE_TRUNCATED_SUFFIX.chars().count()
        );
    }

    #[test]
    fn repeated_fragments_are_kept() {
        let bytes = utf16le("제목입니다 본문 제목입니다");
        let text = salvage_text(&bytes, "dup.hwp", 2000);
        assert!(text.matches("제목입니다").count() >= 2, "got: {text}");
    }

    #[test]
    fn large_noisy_buffer_stays_within_budget() {
        // xorshift noise: plenty of accidental Hangul in every decode.
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        let bytes: Vec<u8> = (0..4 * 1024 * 1024)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 24) as u8
            })
            .collect();

        let start = std::time::Instant::now();
        let text = salvage_text(&bytes, "big.hwp", 2000);
        let elapsed = start.elapsed();

        assert!(
            text.chars().count() <= 2000 + SALVAGE_TRUNCATED_SUFFIX.chars().count(),
            "salvage exceeded budget"
        );
        assert!(text.ends_with(SALVAGE_TRUNCATED_SUFFIX));
        assert!(elapsed.as_secs() < 10, "salvage took {elapsed:?}");
    }

    #[test]
    fn output_has_no_control_chars() {
        let mut bytes = b"Hello salvage world".to_vec();
        bytes.extend([0x07, 0x08, 0x1B]);
        bytes.extend_from_slice(b"second fragment here");
        let text = salvage_text(&bytes, "x.hwp", 2000);
        assert!(!text.chars().any(|c| c.is_control()));
    }
}
