use pagechunk_core::{ChunkerConfig, TextChunk, TokenCounter};
use tracing::debug;

use crate::boundary::continues_into;
use crate::diagnostics::ChunkDiagnostics;
use crate::text::byte_at_char;

/// Appends a short lookahead from each chunk's successor onto its end.
///
/// The copied prefix is recorded in [`TextChunk::overlap_len`] so the
/// canonical text of every chunk stays a slice of the document. Successors
/// are read, never modified.
pub struct OverlapInjector<'a> {
    config: &'a ChunkerConfig,
    counter: &'a dyn TokenCounter,
}

impl<'a> OverlapInjector<'a> {
    pub fn new(config: &'a ChunkerConfig, counter: &'a dyn TokenCounter) -> Self {
        Self { config, counter }
    }

    pub fn inject(&self, chunks: &mut [TextChunk], diagnostics: &mut ChunkDiagnostics) {
        let target = self.config.overlap_target_chars();
        if target == 0 {
            return;
        }
        for i in 1..chunks.len() {
            let (head, tail) = chunks.split_at_mut(i);
            let (a, b) = (&mut head[i - 1], &tail[0]);
            if !continues_into(a, b) || a.has_atomic() || b.has_atomic() {
                continue;
            }
            let prefix = overlap_prefix(b.canonical_text(), target);
            self.append_fitting(a, prefix, diagnostics);
        }
    }

    /// Append the longest word-aligned head of `prefix` that keeps `chunk`
    /// under the overlap token ceiling.
    fn append_fitting(
        &self,
        chunk: &mut TextChunk,
        prefix: &str,
        diagnostics: &mut ChunkDiagnostics,
    ) {
        let ceiling = self.config.overlap_token_ceiling();
        let mut prefix = prefix.trim();
        while !prefix.is_empty() {
            let candidate = format!("{} {}", chunk.text, prefix);
            let tokens = self.counter.count(&candidate);
            if tokens <= ceiling {
                chunk.overlap_len = candidate.len() - chunk.text.len();
                chunk.text = candidate;
                chunk.token_count = tokens;
                diagnostics.overlaps_applied += 1;
                return;
            }
            prefix = match prefix.rfind(char::is_whitespace) {
                Some(ws) => prefix[..ws].trim_end(),
                None => "",
            };
        }

        debug!(
            page = chunk.page_num,
            chunk = chunk.chunk_index_on_page,
            tokens = chunk.token_count,
            ceiling,
            "Skipping overlap, no prefix fits the token ceiling"
        );
        diagnostics.overlaps_skipped += 1;
    }
}

/// Head of `text` about `target` chars long, extended to the next whitespace
/// (at most half again as long) so words are not cut.
fn overlap_prefix(text: &str, target: usize) -> &str {
    let text = text.trim_start();
    let limit = target + target / 2;
    for (k, (i, c)) in text.char_indices().enumerate().skip(target) {
        if k > limit {
            break;
        }
        if c.is_whitespace() {
            return text[..i].trim_end();
        }
    }
    if text.chars().count() <= limit {
        return text;
    }
    &text[..byte_at_char(text, target)]
}
