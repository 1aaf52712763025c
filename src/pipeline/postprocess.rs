//! Post-processing: deterministic cleanup of decoded text.
//!
//! Decoded text still carries artefacts of its source format: HTML markup
//! and entities, control characters from binary salvage, ragged whitespace.
//! Each rule is a pure `&str → String` pass so the order can be read top to
//! bottom and every rule tested on its own.
//!
//! ## Rule Order
//!
//! Script and style blocks must go before generic tag stripping (their
//! bodies are not markup), and entities are decoded after tags are gone so
//! that an encoded `&lt;b&gt;` survives as literal text.

use once_cell::sync::Lazy;
use regex::Regex;

/// Convert an HTML document into plain text.
///
/// Rules (applied in order):
/// 1. Drop `<script>` and `<style>` blocks with their content
/// 2. Drop HTML comments
/// 3. Strip all remaining tags
/// 4. Decode named and numeric character entities
/// 5. Collapse whitespace
pub fn html_to_text(input: &str) -> String {
    let s = strip_script_and_style(input);
    let s = strip_comments(&s);
    let s = strip_tags(&s);
    let s = decode_entities(&s);
    normalise_whitespace(&s)
}

/// Remove control characters and collapse whitespace.
pub fn clean_salvaged(input: &str) -> String {
    let s = remove_control_chars(input);
    normalise_whitespace(&s)
}

// ── Rule 1: Script and style blocks ─────────────────────────────────────────

static RE_SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap());
static RE_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").unwrap());

fn strip_script_and_style(input: &str) -> String {
    let s = RE_SCRIPT.replace_all(input, " ");
    RE_STYLE.replace_all(&s, " ").into_owned()
}

// ── Rule 2: Comments ─────────────────────────────────────────────────────────

static RE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

fn strip_comments(input: &str) -> String {
    RE_COMMENT.replace_all(input, " ").into_owned()
}

// ── Rule 3: Tags ─────────────────────────────────────────────────────────────

static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

fn strip_tags(input: &str) -> String {
    RE_TAG.replace_all(input, " ").into_owned()
}

// ── Rule 4: Entities ─────────────────────────────────────────────────────────

static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").unwrap());

fn decode_entities(input: &str) -> String {
    RE_ENTITY
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let body = &caps[1];
            decode_entity(body).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_entity(body: &str) -> Option<String> {
    if let Some(num) = body.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    let named = match body {
        "nbsp" | "ensp" | "emsp" => " ",
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "copy" => "©",
        "reg" => "®",
        "trade" => "™",
        "middot" => "·",
        "hellip" => "…",
        "ndash" => "–",
        "mdash" => "—",
        "lsquo" => "‘",
        "rsquo" => "’",
        "ldquo" => "“",
        "rdquo" => "”",
        _ => return None,
    };
    Some(named.to_string())
}

// ── Rule 5: Whitespace ───────────────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn normalise_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input, " ").trim().to_string()
}

// ── Control characters ───────────────────────────────────────────────────────

static RE_CONTROL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F-\x9F\u{FFFD}]").unwrap());

/// Strip C0/C1 control characters (keeping tab and newlines) and U+FFFD.
pub fn remove_control_chars(input: &str) -> String {
    RE_CONTROL.replace_all(input, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_script_and_style() {
        let input = "<p>a</p><script type=\"x\">var x = '<b>';</script><STYLE>p{}</STYLE>b";
        let result = strip_script_and_style(input);
        assert!(!result.contains("var x"));
        assert!(!result.contains("p{}"));
        assert!(result.ends_with('b'));
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(
            normalise_whitespace(&strip_tags("<div class=\"x\">Hi<br/>there</div>")),
            "Hi there"
        );
    }

    #[test]
    fn test_decode_named_entities() {
        assert_eq!(decode_entities("a&nbsp;&amp;&lt;b&gt;"), "a &<b>");
        assert_eq!(decode_entities("&unknown;"), "&unknown;");
    }

    #[test]
    fn test_decode_numeric_entities() {
        assert_eq!(decode_entities("&#65;&#x42;&#xAC00;"), "AB가");
        assert_eq!(decode_entities("&#1114112;"), "&#1114112;");
    }

    #[test]
    fn test_encoded_markup_survives_as_text() {
        let result = html_to_text("<p>&lt;b&gt;bold&lt;/b&gt;</p>");
        assert_eq!(result, "<b>bold</b>");
    }

    #[test]
    fn test_html_to_text_full_pipeline() {
        let input = "<html><head><title>T</title><style>body{color:red}</style></head>\
                     <body><!-- hidden --><h1>Title</h1>\n<p>First&nbsp;para</p>\
                     <script>alert(1)</script><p>Second</p></body></html>";
        assert_eq!(html_to_text(input), "T Title First para Second");
    }

    #[test]
    fn test_remove_control_chars() {
        assert_eq!(remove_control_chars("a\u{0}b\u{7}c\td\ne\u{FFFD}"), "abc\td\ne");
    }

    #[test]
    fn test_clean_salvaged() {
        assert_eq!(clean_salvaged("  x\u{1}\u{2}  y \n\n z "), "x y z");
    }
}
