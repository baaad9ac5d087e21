// src/reading/offsets.rs
//! Mapping a selection in the rendered article back to character offsets

use scraper::Html;

use crate::types::OffsetRange;
use crate::utils::{byte_to_char, char_to_byte};

/// Characters searched on each side of the approximate selection start.
pub const SEARCH_WINDOW: usize = 100;

/// Text nodes of rendered article markup, in document order.
#[derive(Debug, Clone, Default)]
pub struct TextNodeMap {
    /// Character index at which each text node starts in the flattened text.
    starts: Vec<usize>,
    lengths: Vec<usize>,
}

impl TextNodeMap {
    pub fn from_html(html: &str) -> Self {
        let fragment = Html::parse_fragment(html);
        let mut starts = Vec::new();
        let mut lengths = Vec::new();
        let mut position = 0;

        for text in fragment.root_element().text() {
            let len = text.chars().count();
            starts.push(position);
            lengths.push(len);
            position += len;
        }

        Self { starts, lengths }
    }

    pub fn node_count(&self) -> usize {
        self.starts.len()
    }

    /// Flat character index of `(text node, offset inside it)`.
    pub fn flat_index(&self, node_index: usize, offset: usize) -> Option<usize> {
        let start = *self.starts.get(node_index)?;
        let len = *self.lengths.get(node_index)?;
        (offset <= len).then_some(start + offset)
    }
}

/// Resolve a selected string to offsets in `content`.
///
/// Tries, in order: the occurrence nearest `approx_start` within
/// `SEARCH_WINDOW` characters of it, the first exact occurrence, then a whitespace-insensitive
/// match mapped back to original offsets. `None` when nothing matches.
pub fn resolve_selection(
    content: &str,
    selected: &str,
    approx_start: Option<usize>,
) -> Option<OffsetRange> {
    let needle = selected.trim();
    if needle.is_empty() {
        return None;
    }
    let needle_len = needle.chars().count();
    let content_len = content.chars().count();

    if let Some(approx) = approx_start {
        let lo = approx.saturating_sub(SEARCH_WINDOW).min(content_len);
        let hi = (approx + needle_len + SEARCH_WINDOW).min(content_len);
        let lo_byte = char_to_byte(content, lo)?;
        let hi_byte = char_to_byte(content, hi)?;
        let nearest = content[lo_byte..hi_byte]
            .match_indices(needle)
            .map(|(found, _)| byte_to_char(content, lo_byte + found))
            .min_by_key(|start| start.abs_diff(approx));
        if let Some(start) = nearest {
            return Some(OffsetRange {
                start,
                end: start + needle_len,
            });
        }
    }

    if let Some(found) = content.find(needle) {
        let start = byte_to_char(content, found);
        return Some(OffsetRange {
            start,
            end: start + needle_len,
        });
    }

    find_ignoring_whitespace(content, needle)
}

/// Collapse whitespace runs to one space, remembering each kept character's
/// original index.
fn normalize(text: &str) -> (Vec<char>, Vec<usize>) {
    let mut chars = Vec::new();
    let mut origin = Vec::new();
    let mut in_space = false;

    for (index, c) in text.chars().enumerate() {
        if c.is_whitespace() {
            if !in_space {
                chars.push(' ');
                origin.push(index);
            }
            in_space = true;
        } else {
            chars.push(c);
            origin.push(index);
            in_space = false;
        }
    }

    (chars, origin)
}

fn find_ignoring_whitespace(content: &str, needle: &str) -> Option<OffsetRange> {
    let (haystack, origin) = normalize(content);
    let (pattern, _) = normalize(needle);
    if pattern.is_empty() || pattern.len() > haystack.len() {
        return None;
    }

    let start = haystack
        .windows(pattern.len())
        .position(|window| window == pattern.as_slice())?;
    let last = start + pattern.len() - 1;

    Some(OffsetRange {
        start: origin[start],
        end: origin[last] + 1,
    })
}

/// Sentence around a range: from the previous terminator to the next one.
pub fn context_sentence(content: &str, range: &OffsetRange) -> String {
    const TERMINATORS: [char; 7] = ['.', '!', '?', '。', '！', '？', '\n'];

    let chars: Vec<char> = content.chars().collect();
    let start = range.start.min(chars.len());
    let end = range.end.min(chars.len());

    let sentence_start = chars[..start]
        .iter()
        .rposition(|c| TERMINATORS.contains(c))
        .map(|pos| pos + 1)
        .unwrap_or(0);
    let sentence_end = chars[end..]
        .iter()
        .position(|c| TERMINATORS.contains(c))
        .map(|pos| end + pos + 1)
        .unwrap_or(chars.len());

    chars[sentence_start..sentence_end]
        .iter()
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = "Le chat dort. Le chien aboie.\nLe chat mange.";

    #[test]
    fn test_window_prefers_nearby_occurrence() {
        // Second "Le chat" starts at char 30.
        let range = resolve_selection(ARTICLE, "Le chat", Some(31)).unwrap();
        assert_eq!(range, OffsetRange { start: 30, end: 37 });

        let first = resolve_selection(ARTICLE, "Le chat", Some(0)).unwrap();
        assert_eq!(first.start, 0);
    }

    #[test]
    fn test_falls_back_to_global_search() {
        let range = resolve_selection(ARTICLE, "  chien  ", None).unwrap();
        assert_eq!(range.slice(ARTICLE), Some("chien"));
    }

    #[test]
    fn test_whitespace_normalized_match_maps_back() {
        let content = "Première ligne\n\nseconde   ligne ici";
        let range = resolve_selection(content, "ligne seconde ligne", None).unwrap();
        assert_eq!(range.slice(content), Some("ligne\n\nseconde   ligne"));
    }

    #[test]
    fn test_gives_up_when_absent() {
        assert_eq!(resolve_selection(ARTICLE, "oiseau", Some(3)), None);
        assert_eq!(resolve_selection(ARTICLE, "   ", None), None);
    }

    #[test]
    fn test_text_node_walk() {
        let map = TextNodeMap::from_html("<p>Le chat <span>dort</span>.</p><p>Ça va</p>");
        assert_eq!(map.node_count(), 4);
        assert_eq!(map.flat_index(0, 3), Some(3));
        assert_eq!(map.flat_index(1, 2), Some(10));
        assert_eq!(map.flat_index(3, 1), Some(14));
        assert_eq!(map.flat_index(3, 9), None);
        assert_eq!(map.flat_index(7, 0), None);
    }

    #[test]
    fn test_context_sentence() {
        let range = resolve_selection(ARTICLE, "chien", None).unwrap();
        assert_eq!(context_sentence(ARTICLE, &range), "Le chien aboie.");
        let last = resolve_selection(ARTICLE, "mange", None).unwrap();
        assert_eq!(context_sentence(ARTICLE, &last), "Le chat mange.");
    }
}
