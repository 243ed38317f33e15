//! Highlighter - Include-term spans for visible posts
//!
//! Each include term is escaped and matched case-insensitively, so user input
//! is always literal. Spans from different terms are merged so the result
//! never overlaps.
//!
//! Marker rendering is idempotent: any markers left by a previous run are
//! stripped before new ones are inserted, so repeated filtering never nests
//! or duplicates them. Plain post text goes through `render_text`, which
//! escapes it so only the markers are live markup.

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::config::LensConfig;

// ==================== TYPE DEFINITIONS ====================

/// A highlighted byte range of the post text
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl Span {
    /// Offsets in UTF-16 code units, for slicing JS strings
    pub fn utf16_range(&self, source: &str) -> (usize, usize) {
        let start = source[..self.start].encode_utf16().count();
        let len = source[self.start..self.end].encode_utf16().count();
        (start, start + len)
    }
}

/// Markers wrapped around each span when rendering
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MarkerStyle {
    pub open: String,
    pub close: String,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self::from(&LensConfig::default())
    }
}

fn escape_html(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}

// ==================== MAIN IMPLEMENTATION ====================

#[derive(Debug, Clone, Default)]
pub struct Highlighter {
    style: MarkerStyle,
}

impl Highlighter {
    pub fn new(style: MarkerStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &MarkerStyle {
        &self.style
    }

    /// Merged, non-overlapping spans of every term in `text`
    ///
    /// `terms` are the raw include terms (already split and trimmed).
    pub fn spans(&self, text: &str, terms: &[String]) -> Vec<Span> {
        let mut ranges: Vec<(usize, usize)> = Vec::new();

        for term in terms.iter().filter(|t| !t.is_empty()) {
            let re = match RegexBuilder::new(&regex::escape(term)).case_insensitive(true).build() {
                Ok(re) => re,
                Err(e) => {
                    tracing::warn!(term = %term, error = %e, "skipping unhighlightable term");
                    continue;
                }
            };
            ranges.extend(re.find_iter(text).map(|m| (m.start(), m.end())));
        }

        ranges.sort_unstable();
        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
        for (start, end) in ranges {
            match merged.last_mut() {
                Some(last) if start < last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }

        merged
            .into_iter()
            .map(|(start, end)| Span { start, end, text: text[start..end].to_string() })
            .collect()
    }

    /// Remove every marker pair left by a previous `render`
    pub fn strip(&self, marked: &str) -> String {
        let MarkerStyle { open, close } = &self.style;
        if open.is_empty() {
            return marked.to_string();
        }

        let mut out = String::with_capacity(marked.len());
        let mut rest = marked;
        while let Some(at) = rest.find(open.as_str()) {
            let inner_start = at + open.len();
            let Some(close_at) = rest[inner_start..].find(close.as_str()) else {
                break;
            };
            out.push_str(&rest[..at]);
            out.push_str(&rest[inner_start..inner_start + close_at]);
            rest = &rest[inner_start + close_at + close.len()..];
        }
        out.push_str(rest);
        out
    }

    /// Strip old markers from host markup, then wrap every span of `terms`
    ///
    /// `text` is already markup and is not escaped. With no terms this only
    /// clears previous markers.
    pub fn render(&self, text: &str, terms: &[String]) -> String {
        let clean = self.strip(text);
        let spans = self.spans(&clean, terms);
        self.wrap(&clean, &spans, |segment, out| out.push_str(segment))
    }

    /// Wrap every span of `terms` in plain post text, escaping the text
    ///
    /// Only the markers survive as markup, so the result can be assigned as
    /// HTML.
    pub fn render_text(&self, plain: &str, terms: &[String]) -> String {
        let spans = self.spans(plain, terms);
        self.wrap(plain, &spans, escape_html)
    }

    fn wrap(&self, text: &str, spans: &[Span], emit: impl Fn(&str, &mut String)) -> String {
        let extra = spans.len() * (self.style.open.len() + self.style.close.len());
        let mut out = String::with_capacity(text.len() + extra);
        let mut cursor = 0;
        for span in spans {
            emit(&text[cursor..span.start], &mut out);
            out.push_str(&self.style.open);
            emit(&text[span.start..span.end], &mut out);
            out.push_str(&self.style.close);
            cursor = span.end;
        }
        emit(&text[cursor..], &mut out);
        out
    }
}

// ==================== TESTS ====================

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_case_insensitive_spans() {
        let hl = Highlighter::default();
        let spans = hl.spans("Go shop: GO and go", &terms(&["go"]));
        let starts: Vec<_> = spans.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![0, 9, 16]);
        assert_eq!(spans[1].text, "GO");
    }

    #[test]
    fn test_metacharacters_are_literal() {
        let hl = Highlighter::default();
        let spans = hl.spans("Use C++ (or c#) here", &terms(&["c++", "(or"]));
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].text, "C++");
        assert_eq!(spans[1].text, "(or");

        assert!(hl.spans("anything", &terms(&[".*"])).is_empty());
    }

    #[test]
    fn test_overlapping_terms_are_merged() {
        let hl = Highlighter::default();
        let spans = hl.spans("golang shop", &terms(&["go", "golang", "lang s"]));
        assert_eq!(spans, vec![Span { start: 0, end: 8, text: "golang s".into() }]);
    }

    #[test]
    fn test_render_wraps_spans() {
        let hl = Highlighter::new(MarkerStyle { open: "[".into(), close: "]".into() });
        assert_eq!(hl.render("Senior Go dev", &terms(&["go", "senior"])), "[Senior] [Go] dev");
    }

    #[test]
    fn test_render_is_idempotent() {
        let hl = Highlighter::default();
        let t = terms(&["rust", "remote"]);
        let once = hl.render("Remote Rust role, rust everywhere", &t);
        let twice = hl.render(&once, &t);
        assert_eq!(once, twice);
        assert_eq!(once.matches("hnf-highlight").count(), 3);
    }

    #[test]
    fn test_render_with_new_terms_replaces_old_markers() {
        let hl = Highlighter::default();
        let first = hl.render("Remote Rust role", &terms(&["rust"]));
        let second = hl.render(&first, &terms(&["remote"]));
        assert_eq!(second, r#"<span class="hnf-highlight">Remote</span> Rust role"#);
    }

    #[test]
    fn test_empty_terms_clear_markers() {
        let hl = Highlighter::default();
        let marked = hl.render("Remote Rust role", &terms(&["rust"]));
        assert_eq!(hl.render(&marked, &[]), "Remote Rust role");
    }

    #[test]
    fn test_term_matching_marker_text_does_not_nest() {
        let hl = Highlighter::default();
        let t = terms(&["span", "class"]);
        let once = hl.render("span class", &t);
        assert_eq!(hl.render(&once, &t), once);
        assert_eq!(hl.strip(&once), "span class");
    }

    // plain text rendering

    #[test]
    fn test_render_text_escapes_markup() {
        let hl = Highlighter::default();
        assert_eq!(
            hl.render_text("Remote <img src=x onerror=alert(1)> role", &terms(&["remote"])),
            r#"<span class="hnf-highlight">Remote</span> &lt;img src=x onerror=alert(1)&gt; role"#
        );
    }

    #[test]
    fn test_render_text_escapes_matched_text() {
        let hl = Highlighter::new(MarkerStyle { open: "[".into(), close: "]".into() });
        assert_eq!(hl.render_text("R&D <b>", &terms(&["r&d", "<b"])), "[R&amp;D] [&lt;b]&gt;");
        assert_eq!(hl.render_text(r#"say "hi""#, &[]), "say &quot;hi&quot;");
    }

    #[test]
    fn test_utf16_range() {
        let text = "café remote";
        let hl = Highlighter::default();
        let spans = hl.spans(text, &terms(&["remote"]));
        assert_eq!(spans[0].start, 6);
        assert_eq!(spans[0].utf16_range(text), (5, 11));
    }
}
