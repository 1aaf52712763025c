//! Text layout: wrap extracted text into a single fixed-size page.
//!
//! This is a character-budget approximation, not a measured layout. Tokens
//! are packed greedily into lines of at most `max_line_chars` characters;
//! a token longer than the budget is hard-split and its remainder carried to
//! the next line. Content beyond `max_lines` is dropped and the page is
//! flagged as truncated. Nothing ever spills onto a second page.

use serde::{Deserialize, Serialize};

/// Marker drawn under the last line of a truncated page.
pub const TRUNCATION_MARKER: &str = "... (more content truncated)";

/// A laid-out page ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutPage {
    pub title: String,
    /// At most `max_lines` entries, each at most `max_line_chars` characters.
    pub lines: Vec<String>,
    pub truncated: bool,
}

impl LayoutPage {
    /// Lines as drawn, including the truncation marker when set.
    pub fn display_lines(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .map(String::as_str)
            .chain(self.truncated.then_some(TRUNCATION_MARKER))
    }
}

/// Lay out `text` under `title` within the given budgets.
pub fn layout(title: &str, text: &str, max_lines: usize, max_line_chars: usize) -> LayoutPage {
    let max_line_chars = max_line_chars.max(1);
    let mut wrapper = Wrapper::new(max_lines, max_line_chars);

    for token in text.split_whitespace() {
        if !wrapper.push_token(token) {
            break;
        }
    }

    let (lines, truncated) = wrapper.finish();
    LayoutPage {
        title: clip_chars(title, max_line_chars),
        lines,
        truncated,
    }
}

/// Greedy line packer with a line cap.
struct Wrapper {
    max_lines: usize,
    max_chars: usize,
    lines: Vec<String>,
    current: String,
    current_chars: usize,
    truncated: bool,
}

impl Wrapper {
    fn new(max_lines: usize, max_chars: usize) -> Self {
        Self {
            max_lines,
            max_chars,
            lines: Vec::new(),
            current: String::new(),
            current_chars: 0,
            truncated: false,
        }
    }

    /// Returns false once the line cap is hit and more content was offered.
    fn push_token(&mut self, token: &str) -> bool {
        let token_chars = token.chars().count();

        if token_chars > self.max_chars {
            return self.push_long_token(token);
        }

        let needed = if self.current.is_empty() {
            token_chars
        } else {
            self.current_chars + 1 + token_chars
        };

        if needed <= self.max_chars {
            if !self.current.is_empty() {
                self.current.push(' ');
            }
            self.current.push_str(token);
            self.current_chars = needed;
            return true;
        }

        if !self.flush() {
            return false;
        }
        self.current.push_str(token);
        self.current_chars = token_chars;
        true
    }

    /// Hard-split a token that cannot fit on any line.
    fn push_long_token(&mut self, token: &str) -> bool {
        if !self.current.is_empty() && !self.flush() {
            return false;
        }
        let chars: Vec<char> = token.chars().collect();
        let mut chunks = chars.chunks(self.max_chars).peekable();
        while let Some(chunk) = chunks.next() {
            self.current = chunk.iter().collect();
            self.current_chars = chunk.len();
            if chunks.peek().is_some() && !self.flush() {
                return false;
            }
        }
        true
    }

    /// Move the current line into `lines`. Fails, marking truncation, when
    /// the page is already full.
    fn flush(&mut self) -> bool {
        if self.lines.len() >= self.max_lines {
            self.truncated = true;
            self.current.clear();
            self.current_chars = 0;
            return false;
        }
        self.lines.push(std::mem::take(&mut self.current));
        self.current_chars = 0;
        true
    }

    fn finish(mut self) -> (Vec<String>, bool) {
        if !self.truncated && !self.current.is_empty() {
            self.flush();
        }
        (self.lines, self.truncated)
    }
}

/// Keep at most `max` characters of `s`.
pub(crate) fn clip_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_short_line() {
        let page = layout("notes.txt", "Hello world", 40, 70);
        assert_eq!(page.lines, vec!["Hello world"]);
        assert!(!page.truncated);
        assert_eq!(page.display_lines().count(), 1);
    }

    #[test]
    fn whitespace_runs_collapse() {
        let page = layout("t", "a \t\n\n  b\r\nc", 40, 70);
        assert_eq!(page.lines, vec!["a b c"]);
    }

    #[test]
    fn empty_text_has_no_lines() {
        let page = layout("t", "   \n ", 40, 70);
        assert!(page.lines.is_empty());
        assert!(!page.truncated);
    }

    #[test]
    fn wraps_at_budget() {
        let page = layout("t", "aaaa bbbb cccc", 40, 9);
        assert_eq!(page.lines, vec!["aaaa bbbb", "cccc"]);
    }

    #[test]
    fn long_token_is_hard_split_without_loss() {
        let token = "x".repeat(25);
        let page = layout("t", &format!("ab {token} cd"), 40, 10);
        assert_eq!(page.lines, vec!["ab", "xxxxxxxxxx", "xxxxxxxxxx", "xxxxx cd"]);
        let joined: String = page.lines.concat();
        assert_eq!(joined.matches('x').count(), 25);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let page = layout("t", "가나다라 마바사아", 40, 9);
        assert_eq!(page.lines, vec!["가나다라 마바사아"]);
    }

    #[test]
    fn truncates_at_line_cap() {
        let text = (0..100).map(|i| format!("word{i:03}")).collect::<Vec<_>>().join(" ");
        let page = layout("t", &text, 5, 7);
        assert_eq!(page.lines.len(), 5);
        assert!(page.truncated);
        let shown: Vec<&str> = page.display_lines().collect();
        assert_eq!(shown.len(), 6);
        assert_eq!(shown[5], TRUNCATION_MARKER);
    }

    #[test]
    fn exact_fit_is_not_truncated() {
        let page = layout("t", "aaa bbb ccc", 3, 3);
        assert_eq!(page.lines, vec!["aaa", "bbb", "ccc"]);
        assert!(!page.truncated);
    }

    #[test]
    fn long_token_overflowing_cap_truncates() {
        let page = layout("t", &"y".repeat(50), 2, 10);
        assert_eq!(page.lines.len(), 2);
        assert!(page.truncated);
    }

    #[test]
    fn lines_respect_budgets() {
        let text = "lorem ipsum dolor sit amet ".repeat(200);
        let page = layout("t", &text, 40, 70);
        assert!(page.lines.len() <= 40);
        assert!(page.lines.iter().all(|l| l.chars().count() <= 70));
    }

    #[test]
    fn title_is_clipped() {
        let page = layout(&"T".repeat(100), "x", 40, 70);
        assert_eq!(page.title.chars().count(), 70);
    }
}
