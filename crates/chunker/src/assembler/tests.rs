//! Tests for the chunking pipeline driver.

use super::*;
use pagechunk_core::{paginate, BudgetException};

fn assembler(config: ChunkerConfig) -> ChunkAssembler<WhitespaceTokenCounter> {
    ChunkAssembler::new(config, WhitespaceTokenCounter).unwrap()
}

fn report(n: usize) -> Vec<Page> {
    paginate((1..=n).map(|p| {
        (0..12)
            .map(|s| format!("Page {p} sentence {s} covers topic {} in detail.", p * 31 + s))
            .collect::<Vec<_>>()
            .join(" ")
    }))
}

#[test]
fn single_short_page_is_one_chunk() {
    let pages = paginate(["Hello world. This is a test."]);
    let chunks = assembler(ChunkerConfig::default()).assemble(&pages);
    assert_eq!(chunks.len(), 1);
    let c = &chunks[0];
    assert_eq!(c.text, "Hello world. This is a test.");
    assert_eq!(c.page_num, 1);
    assert_eq!(c.chunk_index_on_page, 0);
    assert_eq!(c.char_span, (0, 28));
    assert_eq!(c.token_count, 6);
    assert_eq!(c.exception, None);
}

#[test]
fn empty_input_yields_no_chunks() {
    let output = assembler(ChunkerConfig::default()).assemble_with_diagnostics(&[]);
    assert!(output.chunks.is_empty());
    assert_eq!(output.diagnostics, ChunkDiagnostics::default());

    let pages = paginate(["", "   "]);
    assert!(assembler(ChunkerConfig::default()).assemble(&pages).is_empty());
}

#[test]
fn pages_are_processed_in_page_order() {
    let pages = vec![
        Page::new(2, "Second page text.").with_offset(16),
        Page::new(1, "First page text.").with_offset(0),
    ];
    let chunks = assembler(ChunkerConfig::default().with_overlap_percent(0)).assemble(&pages);
    let order: Vec<u32> = chunks.iter().map(|c| c.page_num).collect();
    assert_eq!(order, vec![1, 2]);
    assert_eq!(chunks[1].char_span, (16, 33));
}

#[test]
fn merge_reindexes_following_chunks() {
    let config = ChunkerConfig::default()
        .with_max_tokens(5)
        .with_cross_page_overlap(true);
    let pages = paginate(["Tail ends", "continues here now. Another full sentence."]);
    let output = assembler(config).assemble_with_diagnostics(&pages);
    let chunks = &output.chunks;

    assert_eq!(output.diagnostics.cross_page_merges, 1);
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].canonical_text(), "Tail ends continues here now.");
    assert_eq!((chunks[0].page_num, chunks[0].end_page), (1, 2));
    assert_eq!(chunks[0].char_span, (0, 29));
    assert_eq!(chunks[1].canonical_text(), "Another full sentence.");
    assert_eq!(chunks[1].page_num, 2);
    assert_eq!(chunks[1].chunk_index_on_page, 0);
    // The merged chunk is allowed one word of lookahead before the ceiling.
    assert_eq!(chunks[0].overlap_text(), " Another");
}

#[test]
fn oversized_atomic_block_is_flagged_not_split() {
    let payload = (0..40).map(|i| format!("| r{i} |")).collect::<Vec<_>>().join("\n");
    let block = crate::segmenter::atomic_block_markup("tbl", &payload);
    let pages = paginate([format!("Intro. {block} Outro.")]);
    let config = ChunkerConfig::default().with_max_tokens(20);
    let output = assembler(config).assemble_with_diagnostics(&pages);

    let flagged: Vec<&TextChunk> = output.chunks.iter().filter(|c| c.is_flagged()).collect();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].text, block);
    assert_eq!(flagged[0].exception, Some(BudgetException::OversizedAtomic));
    assert_eq!(output.diagnostics.oversized_atomic, 1);
}

#[test]
fn parallel_pages_match_sequential() {
    let pages = report(8);
    let config = ChunkerConfig::default().with_max_tokens(40).with_max_chars(200);
    let sequential = assembler(config.clone()).assemble_with_diagnostics(&pages);
    let parallel = assembler(config.with_parallel_pages(true)).assemble_with_diagnostics(&pages);
    assert!(sequential.chunks.len() > 8);
    assert_eq!(sequential.chunks, parallel.chunks);
    assert_eq!(sequential.diagnostics, parallel.diagnostics);
}

#[test]
fn repeated_runs_are_identical() {
    let pages = report(3);
    let a = assembler(ChunkerConfig::default().with_max_tokens(30));
    assert_eq!(a.assemble(&pages), a.assemble(&pages));
}

#[test]
fn indices_are_sequential_per_page() {
    let pages = report(4);
    let chunks = assembler(ChunkerConfig::default().with_max_tokens(25)).assemble(&pages);
    for page in 1..=4 {
        let indices: Vec<u32> = chunks
            .iter()
            .filter(|c| c.page_num == page)
            .map(|c| c.chunk_index_on_page)
            .collect();
        let expected: Vec<u32> = (0..indices.len() as u32).collect();
        assert_eq!(indices, expected);
    }
}

#[test]
fn closure_counter_is_accepted() {
    let by_chars = |text: &str| text.chars().count().div_ceil(4) as u32;
    let a = ChunkAssembler::new(ChunkerConfig::default().with_max_tokens(10), by_chars).unwrap();
    let chunks = a.assemble(&paginate(["Alpha beta. Gamma delta. Epsilon zeta. Eta theta."]));
    assert!(chunks.len() > 1);
    assert!(chunks
        .iter()
        .all(|c| by_chars(c.canonical_text()) <= 10 || c.is_flagged()));
}

#[test]
fn invalid_config_is_rejected() {
    let err = ChunkAssembler::new(
        ChunkerConfig::default().with_max_tokens(0),
        WhitespaceTokenCounter,
    );
    assert!(matches!(err, Err(ChunkError::InvalidConfig { .. })));
    assert!(chunk_document(&[], &ChunkerConfig::default().with_max_chars(0)).is_err());
}

#[test]
fn chunk_document_uses_whitespace_counting() {
    let chunks = chunk_document(&paginate(["One two three."]), &ChunkerConfig::default()).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].token_count, 3);
}
