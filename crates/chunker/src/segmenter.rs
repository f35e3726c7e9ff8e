//! Page text → ordered plain/atomic spans.
//!
//! Tables and figures arrive pre-rendered between a reserved marker pair,
//! `[[BLOCK:<id>:START]]` … `[[BLOCK:<id>:END]]`. The renderer guarantees the
//! markers never occur inside a payload. Everything outside markers is
//! sentence-split.

use pagechunk_core::Page;
use tracing::warn;

use crate::diagnostics::ChunkDiagnostics;
use crate::span::Span;
use crate::text::SentenceRules;

pub const BLOCK_PREFIX: &str = "[[BLOCK:";
pub const BLOCK_START_SUFFIX: &str = ":START]]";
pub const BLOCK_END_SUFFIX: &str = ":END]]";

/// Wrap a rendered table/figure payload in block markers.
pub fn atomic_block_markup(id: &str, payload: &str) -> String {
    format!("{BLOCK_PREFIX}{id}{BLOCK_START_SUFFIX}{payload}{BLOCK_PREFIX}{id}{BLOCK_END_SUFFIX}")
}

/// Parse a start marker at the head of `s`, returning the block id.
fn parse_start_marker(s: &str) -> Option<&str> {
    let rest = s.strip_prefix(BLOCK_PREFIX)?;
    let close = rest.find("]]")?;
    let id = rest[..close + 2].strip_suffix(BLOCK_START_SUFFIX)?;
    if id.is_empty() || id.contains('[') {
        return None;
    }
    Some(id)
}

pub struct TextSegmenter<'a> {
    rules: &'a SentenceRules,
}

impl<'a> TextSegmenter<'a> {
    pub fn new(rules: &'a SentenceRules) -> Self {
        Self { rules }
    }

    pub fn segment(&self, page: &Page, diagnostics: &mut ChunkDiagnostics) -> Vec<Span> {
        let text = page.text.as_str();
        let mut spans = Vec::new();
        let mut cursor = 0;
        let mut search = 0;

        while let Some(rel) = text[search..].find(BLOCK_PREFIX) {
            let marker_start = search + rel;
            let Some(id) = parse_start_marker(&text[marker_start..]) else {
                // Stray prefix (or an end marker without a start): plain text.
                search = marker_start + BLOCK_PREFIX.len();
                continue;
            };
            let body_start =
                marker_start + BLOCK_PREFIX.len() + id.len() + BLOCK_START_SUFFIX.len();

            self.push_sentences(&mut spans, text, cursor, marker_start);

            let end_marker = format!("{BLOCK_PREFIX}{id}{BLOCK_END_SUFFIX}");
            let block_end = match text[body_start..].find(&end_marker) {
                Some(rel_end) => body_start + rel_end + end_marker.len(),
                None => {
                    warn!(
                        page = page.page_num,
                        block_id = id,
                        "Unterminated block marker, treating rest of page as one block"
                    );
                    diagnostics.unterminated_blocks += 1;
                    text.len()
                }
            };

            spans.push(Span::Atomic {
                id: id.to_string(),
                text: text[marker_start..block_end].to_string(),
                byte_start: marker_start,
                byte_end: block_end,
            });
            cursor = block_end;
            search = block_end;
        }

        self.push_sentences(&mut spans, text, cursor, text.len());
        spans
    }

    fn push_sentences(&self, spans: &mut Vec<Span>, text: &str, start: usize, end: usize) {
        let region = &text[start..end];
        for (s, e) in self.rules.sentence_ranges(region) {
            spans.push(Span::plain(&region[s..e], start + s));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(text: &str) -> (Vec<Span>, ChunkDiagnostics) {
        let rules = SentenceRules::default();
        let mut diagnostics = ChunkDiagnostics::default();
        let spans = TextSegmenter::new(&rules).segment(&Page::new(1, text), &mut diagnostics);
        (spans, diagnostics)
    }

    #[test]
    fn plain_text_becomes_sentence_spans() {
        let (spans, diagnostics) = segment("Hello world. This is a test.");
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0], Span::plain("Hello world.", 0));
        assert_eq!(spans[1], Span::plain("This is a test.", 13));
        assert!(diagnostics.is_clean());
    }

    #[test]
    fn block_markup_becomes_one_atomic_span() {
        let block = atomic_block_markup("t1", "| a | b |\n| 1. | Two. |");
        let text = format!("Intro. {block} Outro.");
        let (spans, _) = segment(&text);
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].text(), "Intro.");
        assert_eq!(spans[1].atomic_id(), Some("t1"));
        assert_eq!(spans[1].text(), block);
        assert_eq!(spans[1].byte_start(), 7);
        assert_eq!(&text[spans[1].byte_start()..spans[1].byte_end()], block);
        assert_eq!(spans[2].text(), "Outro.");
    }

    #[test]
    fn adjacent_blocks_and_ids_with_colons() {
        let a = atomic_block_markup("fig:1", "figure one");
        let b = atomic_block_markup("tbl:2", "table two");
        let (spans, _) = segment(&format!("{a}{b}"));
        let ids: Vec<_> = spans.iter().filter_map(|s| s.atomic_id()).collect();
        assert_eq!(ids, vec!["fig:1", "tbl:2"]);
        assert!(spans.iter().all(Span::is_atomic));
    }

    #[test]
    fn unterminated_block_takes_rest_of_page() {
        let text = "Before. [[BLOCK:x:START]]| row | row |\nMore. Text after.";
        let (spans, diagnostics) = segment(text);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].text(), "Before.");
        assert_eq!(spans[1].atomic_id(), Some("x"));
        assert_eq!(spans[1].byte_end(), text.len());
        assert_eq!(diagnostics.unterminated_blocks, 1);
    }

    #[test]
    fn stray_markers_stay_plain() {
        let text = "See [[BLOCK:oops and [[BLOCK:y:END]] here.";
        let (spans, diagnostics) = segment(text);
        assert_eq!(spans.len(), 1);
        assert!(!spans[0].is_atomic());
        assert_eq!(spans[0].text(), text);
        assert!(diagnostics.is_clean());
    }

    #[test]
    fn empty_and_whitespace_pages_have_no_spans() {
        assert!(segment("").0.is_empty());
        assert!(segment("  \n\t ").0.is_empty());
    }
}
