//! Greedy per-page packing of spans into chunks.

use pagechunk_core::{BudgetException, ChunkerConfig, Page, TextChunk, TokenCounter};
use tracing::{debug, warn};

use crate::diagnostics::ChunkDiagnostics;
use crate::span::MeasuredSpan;

/// Accumulated state for the chunk under construction. The draft always
/// covers one contiguous range of the page text.
#[derive(Debug, Default)]
struct ChunkDraft {
    parts: usize,
    start: usize,
    end: usize,
    tokens: u32,
    chars: usize,
    atomic_ids: Vec<String>,
    exception: Option<BudgetException>,
    soft_warned: bool,
}

impl ChunkDraft {
    fn is_empty(&self) -> bool {
        self.parts == 0
    }
}

pub struct ChunkBuilder<'a> {
    page: &'a Page,
    config: &'a ChunkerConfig,
    counter: &'a dyn TokenCounter,
    draft: ChunkDraft,
    next_index: u32,
}

impl<'a> ChunkBuilder<'a> {
    pub fn new(page: &'a Page, config: &'a ChunkerConfig, counter: &'a dyn TokenCounter) -> Self {
        Self {
            page,
            config,
            counter,
            draft: ChunkDraft::default(),
            next_index: 0,
        }
    }

    /// Pack `spans` (already split to budget) into this page's chunks.
    pub fn build(
        mut self,
        spans: Vec<MeasuredSpan>,
        diagnostics: &mut ChunkDiagnostics,
    ) -> Vec<TextChunk> {
        let mut chunks = Vec::new();
        for span in &spans {
            if span.span.is_atomic() {
                if self.fits(span) {
                    self.add(span, diagnostics);
                } else {
                    self.force_append_atomic(span, &mut chunks, diagnostics);
                }
            } else if self.can_add_plain(span) {
                self.add(span, diagnostics);
            } else {
                self.flush_into(&mut chunks);
                self.add(span, diagnostics);
            }
        }
        self.flush_into(&mut chunks);
        chunks
    }

    fn fits(&self, span: &MeasuredSpan) -> bool {
        self.draft.tokens.saturating_add(span.tokens) <= self.config.max_tokens
    }

    /// The token budget is authoritative; the character ceiling is advisory.
    pub fn can_add_plain(&self, span: &MeasuredSpan) -> bool {
        !span.span.is_atomic() && self.fits(span)
    }

    /// Append `span` to the draft. Plain spans must have passed
    /// [`can_add_plain`](Self::can_add_plain).
    pub fn add(&mut self, span: &MeasuredSpan, diagnostics: &mut ChunkDiagnostics) {
        let d = &mut self.draft;
        if d.is_empty() {
            d.start = span.span.byte_start();
            d.end = span.span.byte_end();
        } else {
            // Split pieces may overlap their predecessor; keep the page text once.
            d.end = d.end.max(span.span.byte_end());
        }
        d.parts += 1;
        d.tokens = d.tokens.saturating_add(span.tokens);
        d.chars = self.page.text[d.start..d.end].chars().count();
        if let Some(id) = span.span.atomic_id() {
            d.atomic_ids.push(id.to_string());
        }
        if span.over_budget {
            d.exception = Some(BudgetException::BudgetExceeded);
        }

        if d.chars > self.config.soft_char_ceiling() && !d.soft_warned {
            d.soft_warned = true;
            diagnostics.soft_char_overflows += 1;
            debug!(
                page = self.page.page_num,
                chars = d.chars,
                max_chars = self.config.max_chars,
                "Chunk draft past soft character ceiling"
            );
        }
    }

    /// Emit an atomic span that does not fit as its own chunk, whatever its size.
    pub fn force_append_atomic(
        &mut self,
        span: &MeasuredSpan,
        chunks: &mut Vec<TextChunk>,
        diagnostics: &mut ChunkDiagnostics,
    ) {
        self.flush_into(chunks);
        self.add(span, diagnostics);
        if span.tokens > self.config.max_tokens {
            warn!(
                page = self.page.page_num,
                block_id = span.span.atomic_id().unwrap_or_default(),
                tokens = span.tokens,
                max_tokens = self.config.max_tokens,
                "Atomic block exceeds token budget, emitting as its own chunk"
            );
            diagnostics.oversized_atomic += 1;
            self.draft.exception = Some(BudgetException::OversizedAtomic);
        }
        self.flush_into(chunks);
    }

    /// Finalize the draft as the next chunk of this page and reset.
    pub fn flush_into(&mut self, chunks: &mut Vec<TextChunk>) {
        if self.draft.is_empty() {
            return;
        }
        let draft = std::mem::take(&mut self.draft);
        let text = self.page.text[draft.start..draft.end].to_string();
        let doc_start = self.page.offset + self.page.text[..draft.start].chars().count();

        chunks.push(TextChunk {
            page_num: self.page.page_num,
            end_page: self.page.page_num,
            chunk_index_on_page: self.next_index,
            token_count: self.counter.count(&text),
            char_span: (doc_start, doc_start + draft.chars),
            text,
            page_header: self.page.header.clone(),
            atomic_ids: draft.atomic_ids,
            exception: draft.exception,
            overlap_len: 0,
        });
        self.next_index += 1;
    }
}
