//! Encoding recovery: turn bytes of unknown encoding into readable text.
//!
//! Uploaded text files come from Windows machines with Korean locales, old
//! web exports and modern editors alike, so the byte encoding is never known
//! up front. Recovery is an ordered chain of candidate encodings, each
//! decoded strictly and checked by a validator; the first accepted candidate
//! wins. When nothing is accepted the chain falls through to a lossy UTF-8
//! decode, so [`recover`] can never fail.
//!
//! ```text
//! bytes ──▶ chardetng guess ──▶ remap Western→EUC-KR ──▶ [guess, UTF-8, EUC-KR, CP949, ISO-2022-KR]
//!                                                               │ strict decode + validate
//!                                                               ▼
//!                                                  Accepted(text) | NoneAccepted → lossy UTF-8
//! ```

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use tracing::debug;

/// Labels tried after the detector's guess, in order.
const FALLBACK_LABELS: [&str; 4] = ["utf-8", "euc-kr", "cp949", "iso-2022-kr"];

/// First and last Hangul syllable code points.
pub(crate) const HANGUL_START: char = '\u{AC00}';
pub(crate) const HANGUL_END: char = '\u{D7A3}';

/// Result of running the candidate chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// A candidate decoded strictly and passed validation.
    Accepted {
        text: String,
        encoding: &'static str,
    },
    /// No candidate was accepted.
    NoneAccepted,
}

/// Decode `bytes` into the most plausible text. Never fails.
pub fn recover(bytes: &[u8]) -> String {
    match recover_detailed(bytes) {
        Recovery::Accepted { text, encoding } => {
            debug!("Decoded {} bytes as {}", bytes.len(), encoding);
            text
        }
        Recovery::NoneAccepted => {
            debug!(
                "No candidate encoding accepted for {} bytes; using lossy UTF-8",
                bytes.len()
            );
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Run the candidate chain and report which encoding, if any, was accepted.
pub fn recover_detailed(bytes: &[u8]) -> Recovery {
    if bytes.is_empty() {
        return Recovery::Accepted {
            text: String::new(),
            encoding: encoding_rs::UTF_8.name(),
        };
    }

    candidates(bytes)
        .into_iter()
        .find_map(|enc| {
            decode_strict(enc, bytes)
                .filter(|text| is_plausible(text))
                .map(|text| Recovery::Accepted {
                    text,
                    encoding: enc.name(),
                })
        })
        .unwrap_or(Recovery::NoneAccepted)
}

/// Best-guess encoding from the statistical detector, with Western
/// single-byte guesses remapped to EUC-KR.
pub fn detect(bytes: &[u8]) -> &'static Encoding {
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    remap_western(detector.guess(None, true))
}

/// Short Korean texts in EUC-KR are routinely mistaken for Latin-1 family
/// encodings by frequency-based detectors.
fn remap_western(guess: &'static Encoding) -> &'static Encoding {
    if guess == encoding_rs::WINDOWS_1252
        || guess == encoding_rs::ISO_8859_15
        || guess == encoding_rs::WINDOWS_1250
        || guess == encoding_rs::ISO_8859_2
    {
        encoding_rs::EUC_KR
    } else {
        guess
    }
}

/// Ordered, de-duplicated candidate list. A byte-order mark, when present,
/// outranks every guess.
fn candidates(bytes: &[u8]) -> Vec<&'static Encoding> {
    let mut list: Vec<&'static Encoding> = Vec::with_capacity(6);
    if let Some((bom_encoding, _)) = Encoding::for_bom(bytes) {
        list.push(bom_encoding);
    }
    list.push(detect(bytes));
    list.extend(
        FALLBACK_LABELS
            .iter()
            .filter_map(|label| Encoding::for_label(label.as_bytes())),
    );

    let mut seen = Vec::with_capacity(list.len());
    list.retain(|enc| {
        if seen.contains(enc) {
            false
        } else {
            seen.push(*enc);
            true
        }
    });
    list
}

/// Decode without replacement characters; malformed input yields `None`.
fn decode_strict(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    let body = match Encoding::for_bom(bytes) {
        Some((bom_encoding, bom_len)) if bom_encoding == encoding => &bytes[bom_len..],
        _ => bytes,
    };
    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(|text| text.into_owned())
}

/// Accept text containing Hangul or at least one ASCII alphanumeric.
pub(crate) fn is_plausible(text: &str) -> bool {
    text.chars()
        .any(|c| is_hangul(c) || c.is_ascii_alphanumeric())
}

#[inline]
pub(crate) fn is_hangul(c: char) -> bool {
    (HANGUL_START..=HANGUL_END).contains(&c)
}
