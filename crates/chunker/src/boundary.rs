//! Adjustments across chunk boundaries, run after per-page building and
//! before overlap: cross-page merging, then partial-sentence shifting.

use pagechunk_core::{BudgetException, ChunkerConfig, TextChunk, TokenCounter};
use tracing::debug;

use crate::diagnostics::ChunkDiagnostics;
use crate::text::{ends_with_terminal, starts_lowercase, starts_with_heading, SentenceRules};

/// Whether `b` directly continues `a`'s text: same page, or the page that
/// `a` was merged into.
pub(crate) fn continues_into(a: &TextChunk, b: &TextChunk) -> bool {
    b.page_num == a.end_page
}

/// Point in a chunk's text where document text resumes after an inserted
/// joining space: byte offset into the text, and its document char position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Join {
    at: usize,
    doc: usize,
}

/// Document char position of byte `i` of `chunk.text`.
fn doc_position(chunk: &TextChunk, joins: &[Join], i: usize) -> usize {
    let (at, doc) = joins
        .iter()
        .rev()
        .find(|j| j.at <= i)
        .map_or((0, chunk.char_span.0), |j| (j.at, j.doc));
    doc + chunk.text[at..i].chars().count()
}

/// First byte in `chunk.text[from..to]` whose document position is at or
/// past `target`, or `to`.
fn byte_at_doc(chunk: &TextChunk, joins: &[Join], from: usize, to: usize, target: usize) -> usize {
    let mut pos = doc_position(chunk, joins, from);
    for (k, _) in chunk.text[from..to].char_indices() {
        let i = from + k;
        if let Some(j) = joins.iter().find(|j| j.at == i) {
            pos = j.doc;
        }
        if pos >= target {
            return i;
        }
        pos += 1;
    }
    to
}

pub struct BoundaryPolicy<'a> {
    config: &'a ChunkerConfig,
    rules: &'a SentenceRules,
    counter: &'a dyn TokenCounter,
}

impl<'a> BoundaryPolicy<'a> {
    pub fn new(
        config: &'a ChunkerConfig,
        rules: &'a SentenceRules,
        counter: &'a dyn TokenCounter,
    ) -> Self {
        Self {
            config,
            rules,
            counter,
        }
    }

    /// Cross-page merge (when enabled), then partial-sentence shifting.
    pub fn apply(&self, chunks: &mut Vec<TextChunk>, diagnostics: &mut ChunkDiagnostics) {
        let mut joins = if self.config.cross_page_merge_active() {
            self.merge_across_pages(chunks, diagnostics)
        } else {
            vec![Vec::new(); chunks.len()]
        };
        self.shift_partial_sentences(chunks, &mut joins, diagnostics);
    }

    /// Fold the head chunk of a page into the tail chunk of the previous page
    /// when the two read as one sentence. The merged chunk keeps the earlier
    /// page's attribution. Returns the joins inserted into each output chunk.
    fn merge_across_pages(
        &self,
        chunks: &mut Vec<TextChunk>,
        diagnostics: &mut ChunkDiagnostics,
    ) -> Vec<Vec<Join>> {
        let mut merged: Vec<TextChunk> = Vec::with_capacity(chunks.len());
        let mut joins: Vec<Vec<Join>> = Vec::with_capacity(chunks.len());
        for chunk in chunks.drain(..) {
            if let (Some(prev), Some(prev_joins)) = (merged.last_mut(), joins.last_mut()) {
                if let Some((text, tokens, join)) = self.merge_candidate(prev, &chunk) {
                    debug!(
                        page = prev.page_num,
                        next_page = chunk.page_num,
                        tokens,
                        "Merged chunk across page boundary"
                    );
                    prev.text = text;
                    prev.token_count = tokens;
                    prev.end_page = chunk.end_page;
                    prev_joins.push(join);
                    if tokens > self.config.max_tokens {
                        prev.exception.get_or_insert(BudgetException::MergeTolerance);
                    }
                    diagnostics.cross_page_merges += 1;
                    continue;
                }
            }
            merged.push(chunk);
            joins.push(Vec::new());
        }
        *chunks = merged;
        joins
    }

    fn merge_candidate(&self, a: &TextChunk, b: &TextChunk) -> Option<(String, u32, Join)> {
        let page_head = b.chunk_index_on_page == 0 && b.page_num != a.end_page;
        if !page_head
            || a.has_atomic()
            || b.has_atomic()
            || ends_with_terminal(&a.text)
            || !starts_lowercase(&b.text)
            || starts_with_heading(&b.text)
        {
            return None;
        }
        let head = a.text.trim_end();
        let tail = b.text.trim_start();
        let text = format!("{head} {tail}");
        let tokens = self.counter.count(&text);
        if tokens > self.config.merge_token_ceiling() {
            return None;
        }
        let lead = &b.text[..b.text.len() - tail.len()];
        let join = Join {
            at: head.len() + 1,
            doc: b.char_span.0 + lead.chars().count(),
        };
        Some((text, tokens, join))
    }

    /// Move a trailing partial sentence from each chunk onto the front of the
    /// chunk that continues it, as far as the later chunk's budget allows.
    fn shift_partial_sentences(
        &self,
        chunks: &mut [TextChunk],
        joins: &mut [Vec<Join>],
        diagnostics: &mut ChunkDiagnostics,
    ) {
        for i in 1..chunks.len() {
            let (head, tail) = chunks.split_at_mut(i);
            let (a, b) = (&mut head[i - 1], &mut tail[0]);
            if !continues_into(a, b) || a.has_atomic() || b.has_atomic() {
                continue;
            }
            let (joins_head, joins_tail) = joins.split_at_mut(i);
            self.shift_fragment(
                (a, &mut joins_head[i - 1]),
                (b, &mut joins_tail[0]),
                diagnostics,
            );
        }
    }

    fn shift_fragment(
        &self,
        (a, a_joins): (&mut TextChunk, &mut Vec<Join>),
        (b, b_joins): (&mut TextChunk, &mut Vec<Join>),
        diagnostics: &mut ChunkDiagnostics,
    ) {
        let Some(boundary) = self.rules.last_sentence_end(&a.text) else {
            return;
        };
        let rest = &a.text[boundary..];
        let frag_start = boundary + (rest.len() - rest.trim_start().len());
        let frag_end = a.text.trim_end().len();
        if frag_start >= frag_end {
            return;
        }

        // A split piece starts inside its predecessor; whatever `b` already
        // opens with stays where it is.
        let b_start = b.char_span.0;
        let fresh_end = byte_at_doc(a, a_joins, frag_start, frag_end, b_start);
        if fresh_end == frag_start {
            self.truncate_at(a, a_joins, frag_start);
            diagnostics.fragments_shifted += 1;
            return;
        }
        let sep = if doc_position(a, a_joins, fresh_end) >= b_start {
            ""
        } else {
            " "
        };
        let fragment = &a.text[frag_start..fresh_end];

        // Whole fragment first, then shorter word-aligned suffixes.
        let mut offsets = vec![0];
        let mut prev_ws = false;
        for (i, c) in fragment.char_indices() {
            if prev_ws && !c.is_whitespace() {
                offsets.push(i);
            }
            prev_ws = c.is_whitespace();
        }

        for off in offsets {
            let moved = &fragment[off..];
            let candidate = format!("{moved}{sep}{}", b.text);
            let tokens = self.counter.count(&candidate);
            if tokens > self.config.max_tokens {
                continue;
            }
            let cut = frag_start + off;
            let resume = moved.len() + sep.len();
            let mut shifted: Vec<Join> = a_joins
                .iter()
                .filter(|j| j.at > cut && j.at < fresh_end)
                .map(|j| Join {
                    at: j.at - cut,
                    doc: j.doc,
                })
                .collect();
            shifted.push(Join {
                at: resume,
                doc: b_start,
            });
            shifted.extend(b_joins.iter().map(|j| Join {
                at: j.at + resume,
                doc: j.doc,
            }));

            b.char_span.0 = doc_position(a, a_joins, cut);
            b.text = candidate;
            b.token_count = tokens;
            *b_joins = shifted;
            self.truncate_at(a, a_joins, cut);
            diagnostics.fragments_shifted += 1;
            return;
        }

        debug!(
            page = a.page_num,
            chunk = a.chunk_index_on_page,
            fragment_len = fragment.len(),
            "Trailing fragment does not fit the next chunk, leaving boundary mid-sentence"
        );
        diagnostics.coherence_compromises += 1;
    }

    /// Cut `chunk` back to `text[..cut]` (trailing whitespace dropped) and
    /// refresh its token count and merge flag.
    fn truncate_at(&self, chunk: &mut TextChunk, joins: &mut Vec<Join>, cut: usize) {
        let kept = chunk.text[..cut].trim_end().len();
        chunk.text.truncate(kept);
        joins.retain(|j| j.at < kept);
        chunk.token_count = self.counter.count(&chunk.text);
        if chunk.exception == Some(BudgetException::MergeTolerance)
            && chunk.token_count <= self.config.max_tokens
        {
            chunk.exception = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagechunk_core::WhitespaceTokenCounter;

    fn chunk(page: u32, index: u32, text: &str, start: usize) -> TextChunk {
        TextChunk {
            page_num: page,
            end_page: page,
            chunk_index_on_page: index,
            text: text.to_string(),
            char_span: (start, start + text.chars().count()),
            token_count: WhitespaceTokenCounter.count(text),
            page_header: None,
            atomic_ids: vec![],
            exception: None,
            overlap_len: 0,
        }
    }

    fn run(config: &ChunkerConfig, chunks: &mut Vec<TextChunk>) -> ChunkDiagnostics {
        let rules = SentenceRules::from_config(config);
        let mut diagnostics = ChunkDiagnostics::default();
        BoundaryPolicy::new(config, &rules, &WhitespaceTokenCounter)
            .apply(chunks, &mut diagnostics);
        diagnostics
    }

    fn merging() -> ChunkerConfig {
        ChunkerConfig::default().with_cross_page_overlap(true)
    }

    #[test]
    fn merges_unfinished_sentence_into_next_page() {
        let mut chunks = vec![
            chunk(1, 0, "Setup is simple. The analysis requires careful", 0),
            chunk(2, 0, "consideration of the data.", 47),
            chunk(2, 1, "Next part.", 74),
        ];
        let diagnostics = run(&merging(), &mut chunks);
        assert_eq!(diagnostics.cross_page_merges, 1);
        assert_eq!(chunks.len(), 2);
        assert_eq!(
            chunks[0].text,
            "Setup is simple. The analysis requires careful consideration of the data."
        );
        assert_eq!(chunks[0].page_num, 1);
        assert_eq!(chunks[0].end_page, 2);
        assert_eq!(chunks[1].text, "Next part.");
    }

    #[test]
    fn merge_is_gated_by_config() {
        let mut chunks = vec![
            chunk(1, 0, "requires careful", 0),
            chunk(2, 0, "consideration here.", 16),
        ];
        let diagnostics = run(&ChunkerConfig::default(), &mut chunks);
        assert_eq!(diagnostics.cross_page_merges, 0);
        assert_eq!(chunks.len(), 2);

        let gated = merging().with_overlap_percent(0);
        let diagnostics = run(&gated, &mut chunks);
        assert_eq!(diagnostics.cross_page_merges, 0);
    }

    #[test]
    fn merge_blocked_by_heading_punctuation_case_and_atomic() {
        let cases = [
            ("ends without stop", "## results follow"),
            ("ends with stop.", "continues lowercase"),
            ("ends without stop", "Capitalised start"),
            ("ends without stop", "1. first item"),
        ];
        for (tail, head) in cases {
            let mut chunks = vec![chunk(1, 0, tail, 0), chunk(2, 0, head, 30)];
            run(&merging(), &mut chunks);
            assert_eq!(chunks.len(), 2, "{tail:?} + {head:?} should not merge");
        }

        let mut with_block = chunk(
            2,
            0,
            "lowercase table [[BLOCK:t:START]]x[[BLOCK:t:END]]",
            30,
        );
        with_block.atomic_ids = vec!["t".into()];
        let mut chunks = vec![chunk(1, 0, "ends without stop", 0), with_block];
        run(&merging(), &mut chunks);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn merge_respects_token_tolerance() {
        let config = merging().with_max_tokens(5);
        // 4 + 2 = 6 tokens: over max_tokens, within 5 * 1.2.
        let mut chunks = vec![chunk(1, 0, "a b c d", 0), chunk(2, 0, "e f", 7)];
        run(&config, &mut chunks);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].exception, Some(BudgetException::MergeTolerance));

        // 4 + 4 = 8 tokens: beyond the tolerance.
        let mut chunks = vec![chunk(1, 0, "a b c d", 0), chunk(2, 0, "e f g h", 7)];
        run(&config, &mut chunks);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn shifts_trailing_fragment_to_next_chunk() {
        let mut chunks = vec![
            chunk(1, 0, "First sentence here. Second starts", 0),
            chunk(1, 1, "and ends here.", 36),
        ];
        let diagnostics = run(&ChunkerConfig::default(), &mut chunks);
        assert_eq!(diagnostics.fragments_shifted, 1);
        assert_eq!(chunks[0].text, "First sentence here.");
        assert_eq!(chunks[1].text, "Second starts and ends here.");
        assert_eq!(chunks[1].char_span.0, 21);
        assert_eq!(chunks[0].token_count, 3);
        assert_eq!(chunks[1].token_count, 5);
    }

    #[test]
    fn shifts_only_what_fits() {
        let config = ChunkerConfig::default().with_max_tokens(5);
        let mut chunks = vec![
            chunk(1, 0, "Done. one two three", 0),
            chunk(1, 1, "four five six", 20),
        ];
        let diagnostics = run(&config, &mut chunks);
        assert_eq!(diagnostics.fragments_shifted, 1);
        assert_eq!(chunks[0].text, "Done. one");
        assert_eq!(chunks[1].text, "two three four five six");
        assert_eq!(chunks[1].char_span.0, 10);
    }

    #[test]
    fn no_room_is_a_coherence_compromise() {
        let config = ChunkerConfig::default().with_max_tokens(3);
        let mut chunks = vec![
            chunk(1, 0, "Done. dangling", 0),
            chunk(1, 1, "one two three", 15),
        ];
        let diagnostics = run(&config, &mut chunks);
        assert_eq!(diagnostics.coherence_compromises, 1);
        assert_eq!(chunks[0].text, "Done. dangling");
        assert_eq!(chunks[1].text, "one two three");
    }

    #[test]
    fn shifting_skips_other_pages_and_clean_endings() {
        let mut chunks = vec![
            chunk(1, 0, "Closed. open tail", 0),
            chunk(2, 0, "Next page text.", 17),
            chunk(2, 1, "Ends cleanly.", 33),
            chunk(2, 2, "More.", 47),
        ];
        let diagnostics = run(&ChunkerConfig::default(), &mut chunks);
        assert_eq!(diagnostics.fragments_shifted, 0);
        assert_eq!(chunks[0].text, "Closed. open tail");
        assert_eq!(chunks[2].text, "Ends cleanly.");
    }

    // Document: "Done. alpha beta gamma delta"

    #[test]
    fn shift_skips_text_the_next_chunk_already_starts_with() {
        let mut chunks = vec![
            chunk(1, 0, "Done. alpha beta gamma", 0),
            chunk(1, 1, "beta gamma delta", 12),
        ];
        let diagnostics = run(&ChunkerConfig::default(), &mut chunks);
        assert_eq!(diagnostics.fragments_shifted, 1);
        assert_eq!(chunks[0].text, "Done.");
        assert_eq!(chunks[1].text, "alpha beta gamma delta");
        assert_eq!(chunks[1].char_span.0, 6);
    }

    #[test]
    fn fragment_inside_next_chunk_only_trims_earlier_chunk() {
        let mut chunks = vec![
            chunk(1, 0, "Done. alpha beta", 0),
            chunk(1, 1, "ne. alpha beta gamma", 2),
        ];
        let diagnostics = run(&ChunkerConfig::default(), &mut chunks);
        assert_eq!(diagnostics.fragments_shifted, 1);
        assert_eq!(chunks[0].text, "Done.");
        assert_eq!(chunks[1].text, "ne. alpha beta gamma");
        assert_eq!(chunks[1].char_span.0, 2);
    }

    #[test]
    fn hard_cut_fragment_rejoins_without_space() {
        let mut chunks = vec![
            chunk(1, 0, "Done. alpha bet", 0),
            chunk(1, 1, "a gamma", 15),
        ];
        run(&ChunkerConfig::default(), &mut chunks);
        assert_eq!(chunks[0].text, "Done.");
        assert_eq!(chunks[1].text, "alpha beta gamma");
        assert_eq!(chunks[1].char_span.0, 6);
    }

    #[test]
    fn fragment_after_page_join_maps_to_its_page() {
        // Page 1 is 41 chars; page 2 starts at 41.
        let mut chunks = vec![
            chunk(1, 0, "Intro here. The analysis requires careful", 0),
            chunk(2, 0, "consideration of the data. Then a fragment", 41),
            chunk(2, 1, "continues here.", 84),
        ];
        let diagnostics = run(&merging(), &mut chunks);
        assert_eq!(diagnostics.cross_page_merges, 1);
        assert_eq!(diagnostics.fragments_shifted, 1);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.ends_with("of the data."));
        assert_eq!(chunks[1].text, "Then a fragment continues here.");
        assert_eq!(chunks[1].char_span.0, 68);
    }
}
