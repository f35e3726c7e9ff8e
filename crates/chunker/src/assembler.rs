//! Pipeline driver: pages in, ordered chunks out.

use pagechunk_core::{
    ChunkError, ChunkerConfig, Page, TextChunk, TokenCounter, WhitespaceTokenCounter,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::boundary::BoundaryPolicy;
use crate::builder::ChunkBuilder;
use crate::diagnostics::ChunkDiagnostics;
use crate::overlap::OverlapInjector;
use crate::segmenter::TextSegmenter;
use crate::span::MeasuredSpan;
use crate::splitter::RecursiveSplitter;
use crate::text::SentenceRules;

/// Chunks of one run together with the advisory counts it produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkOutput {
    pub chunks: Vec<TextChunk>,
    pub diagnostics: ChunkDiagnostics,
}

/// Runs segmentation, splitting and building per page, then the
/// cross-boundary passes over the whole document.
///
/// Page-local stages are independent and may run on the rayon pool
/// ([`ChunkerConfig::parallel_pages`]); merging, shifting and overlap always
/// run sequentially in page order. Output is identical either way.
pub struct ChunkAssembler<C: TokenCounter> {
    config: ChunkerConfig,
    rules: SentenceRules,
    counter: C,
}

impl<C: TokenCounter> ChunkAssembler<C> {
    pub fn new(config: ChunkerConfig, counter: C) -> Result<Self, ChunkError> {
        config.validate()?;
        let rules = SentenceRules::from_config(&config);
        Ok(Self {
            config,
            rules,
            counter,
        })
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    pub fn assemble(&self, pages: &[Page]) -> Vec<TextChunk> {
        self.assemble_with_diagnostics(pages).chunks
    }

    pub fn assemble_with_diagnostics(&self, pages: &[Page]) -> ChunkOutput {
        let mut ordered: Vec<&Page> = pages.iter().collect();
        ordered.sort_by_key(|page| page.page_num);

        let per_page: Vec<(Vec<TextChunk>, ChunkDiagnostics)> = if self.config.parallel_pages {
            ordered.par_iter().map(|page| self.chunk_page(page)).collect()
        } else {
            ordered.iter().map(|page| self.chunk_page(page)).collect()
        };

        let mut chunks = Vec::new();
        let mut diagnostics = ChunkDiagnostics::default();
        for (page_chunks, page_diagnostics) in per_page {
            chunks.extend(page_chunks);
            diagnostics.absorb(&page_diagnostics);
        }

        BoundaryPolicy::new(&self.config, &self.rules, &self.counter)
            .apply(&mut chunks, &mut diagnostics);
        OverlapInjector::new(&self.config, &self.counter).inject(&mut chunks, &mut diagnostics);
        finalize(&mut chunks);

        info!(
            pages = pages.len(),
            chunks = chunks.len(),
            budget_exceptions = diagnostics.budget_exceptions(),
            cross_page_merges = diagnostics.cross_page_merges,
            overlaps = diagnostics.overlaps_applied,
            "Chunked document"
        );

        ChunkOutput {
            chunks,
            diagnostics,
        }
    }

    /// Page-local stages: segment, split oversized plain spans, build.
    fn chunk_page(&self, page: &Page) -> (Vec<TextChunk>, ChunkDiagnostics) {
        let mut diagnostics = ChunkDiagnostics::default();
        let splitter = RecursiveSplitter::new(&self.config, &self.rules, &self.counter);

        let mut measured = Vec::new();
        for span in TextSegmenter::new(&self.rules).segment(page, &mut diagnostics) {
            let tokens = self.counter.count(span.text());
            if !span.is_atomic() && tokens > self.config.max_tokens {
                measured.extend(splitter.split(span, &mut diagnostics));
            } else {
                measured.push(MeasuredSpan::new(span, tokens));
            }
        }

        let chunks =
            ChunkBuilder::new(page, &self.config, &self.counter).build(measured, &mut diagnostics);
        (chunks, diagnostics)
    }
}

/// Renumber chunks per page and recompute spans from the canonical text,
/// which boundary shifting may have changed.
fn finalize(chunks: &mut [TextChunk]) {
    let mut page = None;
    let mut index = 0;
    for chunk in chunks.iter_mut() {
        if page != Some(chunk.page_num) {
            page = Some(chunk.page_num);
            index = 0;
        }
        chunk.chunk_index_on_page = index;
        index += 1;

        let len = chunk.canonical_text().chars().count();
        chunk.char_span.1 = chunk.char_span.0 + len;
    }
}

/// Chunk `pages` with whitespace token counting.
pub fn chunk_document(
    pages: &[Page],
    config: &ChunkerConfig,
) -> Result<Vec<TextChunk>, ChunkError> {
    let assembler = ChunkAssembler::new(config.clone(), WhitespaceTokenCounter)?;
    Ok(assembler.assemble(pages))
}

#[cfg(test)]
mod tests;
