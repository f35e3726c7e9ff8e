//! Layout-aware, token-bounded chunking of paginated documents.
//!
//! Pages are segmented into sentences and atomic table/figure blocks,
//! oversized sentences are split recursively, and spans are packed greedily
//! into chunks under a hard token budget. A sequential boundary pass then
//! optionally merges sentences broken across pages, shifts trailing partial
//! sentences forward, and appends a short lookahead overlap.
//!
//! ```no_run
//! use pagechunk_chunker::{chunk_document, paginate, ChunkerConfig};
//!
//! let pages = paginate(["First page text.", "Second page text."]);
//! let chunks = chunk_document(&pages, &ChunkerConfig::default())?;
//! # Ok::<(), pagechunk_chunker::ChunkError>(())
//! ```

mod assembler;
mod boundary;
mod builder;
mod diagnostics;
mod overlap;
mod segmenter;
mod span;
mod splitter;
mod text;

pub use assembler::{chunk_document, ChunkAssembler, ChunkOutput};
pub use boundary::BoundaryPolicy;
pub use builder::ChunkBuilder;
pub use diagnostics::ChunkDiagnostics;
pub use overlap::OverlapInjector;
pub use segmenter::{atomic_block_markup, TextSegmenter};
pub use span::{MeasuredSpan, Span};
pub use splitter::RecursiveSplitter;
pub use text::SentenceRules;

pub use pagechunk_core::{
    paginate, BudgetException, ChunkError, ChunkerConfig, Page, TextChunk, TokenCounter,
    WhitespaceTokenCounter,
};
#[cfg(feature = "hf-tokenizers")]
pub use pagechunk_core::HfTokenCounter;
