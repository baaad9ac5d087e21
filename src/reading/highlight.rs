// src/reading/highlight.rs
//! Merging card ranges and rendering the article with highlight spans

use indexmap::IndexSet;

use crate::types::{Card, CardKind};

/// A range to highlight, usually one card.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightRange {
    pub start: usize,
    pub end: usize,
    pub kind: CardKind,
    pub card_id: Option<String>,
    /// Selection whose analysis is still in flight.
    pub pending: bool,
}

impl HighlightRange {
    pub fn from_card(card: &Card) -> Self {
        Self {
            start: card.start_offset,
            end: card.end_offset,
            kind: card.kind,
            card_id: Some(card.id.clone()),
            pending: false,
        }
    }

    pub fn pending(start: usize, end: usize, kind: CardKind) -> Self {
        Self {
            start,
            end,
            kind,
            card_id: None,
            pending: true,
        }
    }
}

/// Union of overlapping or touching ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedSpan {
    pub start: usize,
    pub end: usize,
    pub kinds: IndexSet<CardKind>,
    pub card_ids: IndexSet<String>,
    pub pending: bool,
}

impl MergedSpan {
    fn from_range(range: &HighlightRange) -> Self {
        let mut span = Self {
            start: range.start,
            end: range.end,
            kinds: IndexSet::new(),
            card_ids: IndexSet::new(),
            pending: false,
        };
        span.absorb(range);
        span
    }

    fn absorb(&mut self, range: &HighlightRange) {
        self.end = self.end.max(range.end);
        self.kinds.insert(range.kind);
        if let Some(id) = &range.card_id {
            self.card_ids.insert(id.clone());
        }
        self.pending |= range.pending;
    }

    fn css_class(&self) -> String {
        let mut classes = vec!["highlight".to_string()];
        classes.extend(self.kinds.iter().map(|kind| format!("highlight-{}", kind)));
        if self.pending {
            classes.push("highlight-pending".to_string());
            classes.push("animate-pulse".to_string());
        }
        classes.join(" ")
    }
}

/// Clamp ranges to `content_len`, drop empty ones, sort by start and merge
/// every range whose start is at or before the end of the previous span.
pub fn merge_ranges(ranges: &[HighlightRange], content_len: usize) -> Vec<MergedSpan> {
    let mut sorted: Vec<HighlightRange> = ranges
        .iter()
        .filter_map(|range| {
            let start = range.start.min(content_len);
            let end = range.end.min(content_len);
            (start < end).then(|| HighlightRange {
                start,
                end,
                ..range.clone()
            })
        })
        .collect();
    sorted.sort_by_key(|range| (range.start, range.end));

    let mut merged: Vec<MergedSpan> = Vec::new();
    for range in &sorted {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.absorb(range),
            _ => merged.push(MergedSpan::from_range(range)),
        }
    }
    merged
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Render the article as paragraphs with highlight spans.
///
/// Each non-empty line becomes a `<p>`, each empty line a `<br/>`. Spans that
/// cross a line break are split at the break.
pub fn render_markup(content: &str, ranges: &[HighlightRange]) -> String {
    let chars: Vec<char> = content.chars().collect();
    let spans = merge_ranges(ranges, chars.len());
    let mut html = String::new();

    let mut line_start = 0;
    for line in content.split('\n') {
        let line_len = line.chars().count();
        let line_end = line_start + line_len;

        if line_len == 0 {
            html.push_str("<br/>");
        } else {
            html.push_str("<p>");
            render_line(&mut html, &chars, line_start, line_end, &spans);
            html.push_str("</p>");
        }

        line_start = line_end + 1;
    }

    html
}

fn render_line(html: &mut String, chars: &[char], start: usize, end: usize, spans: &[MergedSpan]) {
    let text = |from: usize, to: usize| escape_html(&chars[from..to].iter().collect::<String>());
    let mut cursor = start;

    for span in spans.iter().filter(|s| s.start < end && s.end > start) {
        let span_start = span.start.max(start);
        let span_end = span.end.min(end);
        if cursor < span_start {
            html.push_str(&text(cursor, span_start));
        }

        let ids: Vec<&str> = span.card_ids.iter().map(String::as_str).collect();
        html.push_str(&format!(
            "<span class=\"{}\" data-card-ids=\"{}\">{}</span>",
            span.css_class(),
            escape_html(&ids.join(",")),
            text(span_start, span_end)
        ));
        cursor = span_end;
    }

    if cursor < end {
        html.push_str(&text(cursor, end));
    }
}
