//! Bisects oversized plain spans until every piece fits the token budget.
//!
//! Cuts prefer a sentence end near the midpoint, then whitespace, then the
//! midpoint itself. Cuts that are not at a sentence end copy a few
//! characters from the end of the left piece onto the start of the right
//! piece so neither side loses its local context. Implemented with an
//! explicit work stack; every step strictly shrinks the piece, so it always
//! terminates.

use pagechunk_core::{ChunkerConfig, TokenCounter};
use tracing::{debug, warn};

use crate::diagnostics::ChunkDiagnostics;
use crate::span::{MeasuredSpan, Span};
use crate::text::{byte_at_char, SentenceRules};

/// Work-stack depth ceiling. Bisection of any realistic page bottoms out
/// long before this.
const MAX_SPLIT_DEPTH: u32 = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CutKind {
    Sentence,
    Word,
    Hard,
}

/// A cut inside a piece, as byte offsets relative to the piece start.
#[derive(Debug, Clone, Copy)]
struct Cut {
    left_end: usize,
    right_start: usize,
    kind: CutKind,
}

pub struct RecursiveSplitter<'a> {
    config: &'a ChunkerConfig,
    rules: &'a SentenceRules,
    counter: &'a dyn TokenCounter,
}

impl<'a> RecursiveSplitter<'a> {
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

    /// Split `span` into ordered pieces that each fit `max_tokens`.
    ///
    /// Atomic spans come back unchanged as a single piece. Plain leaves that
    /// cannot be cut any further are returned as-is with `over_budget` set.
    pub fn split(&self, span: Span, diagnostics: &mut ChunkDiagnostics) -> Vec<MeasuredSpan> {
        let (text, base) = match span {
            Span::Plain {
                text, byte_start, ..
            } => (text, byte_start),
            atomic @ Span::Atomic { .. } => {
                let tokens = self.counter.count(atomic.text());
                return vec![MeasuredSpan::new(atomic, tokens)];
            }
        };

        let mut pieces = Vec::new();
        // (start, end, depth) relative to `text`; popped left-first.
        let mut stack = vec![(0usize, text.len(), 0u32)];

        while let Some((a, b, depth)) = stack.pop() {
            let piece = &text[a..b];
            let tokens = self.counter.count(piece);
            if tokens <= self.config.max_tokens {
                pieces.push(MeasuredSpan::new(Span::plain(piece, base + a), tokens));
                continue;
            }

            let cut = if depth < MAX_SPLIT_DEPTH {
                self.find_cut(piece)
            } else {
                None
            };
            match cut {
                Some(cut) => {
                    stack.push((a + cut.right_start, b, depth + 1));
                    stack.push((a, a + cut.left_end, depth + 1));
                }
                None => {
                    if tokens > self.config.absolute_max_tokens {
                        warn!(
                            tokens,
                            absolute_max = self.config.absolute_max_tokens,
                            offset = base + a,
                            "Unsplittable span exceeds absolute token ceiling, emitting as-is"
                        );
                    } else {
                        debug!(
                            tokens,
                            max_tokens = self.config.max_tokens,
                            offset = base + a,
                            "Unsplittable span exceeds token budget, emitting as-is"
                        );
                    }
                    diagnostics.budget_exceeded += 1;
                    let mut leaf = MeasuredSpan::new(Span::plain(piece, base + a), tokens);
                    leaf.over_budget = true;
                    pieces.push(leaf);
                }
            }
        }

        pieces
    }

    /// Pick a cut near the midpoint of `piece`, or `None` if it cannot be
    /// split into two strictly smaller, non-empty halves.
    fn find_cut(&self, piece: &str) -> Option<Cut> {
        let chars: Vec<(usize, char)> = piece.char_indices().collect();
        let n = chars.len();
        if n < 2 {
            return None;
        }
        let mid = n / 2;
        let window = (n * self.config.split_window_percent as usize / 100).max(1);
        let lo = mid.saturating_sub(window).max(1);
        let hi = (mid + window).min(n - 1);

        let cut = self
            .sentence_cut(piece, &chars, mid, lo, hi)
            .or_else(|| word_cut(&chars, mid, lo, hi))
            .unwrap_or(Cut {
                left_end: chars[mid].0,
                right_start: chars[mid].0,
                kind: CutKind::Hard,
            });

        let cut = self.with_local_overlap(piece, cut);
        let left_ok = cut.left_end > 0 && cut.left_end < piece.len();
        let right_ok = cut.right_start > 0 && cut.right_start < piece.len();
        (left_ok && right_ok).then_some(cut)
    }

    /// Nearest sentence end to `mid` within `[lo, hi]` (char indices).
    fn sentence_cut(
        &self,
        piece: &str,
        chars: &[(usize, char)],
        mid: usize,
        lo: usize,
        hi: usize,
    ) -> Option<Cut> {
        nearest(mid, lo, hi, |k| {
            let (pos, _) = chars[k];
            let end = self.rules.sentence_end_at(piece, pos)?;
            let left_end = end;
            let right_start = end + (piece[end..].len() - piece[end..].trim_start().len());
            (right_start < piece.len()).then_some(Cut {
                left_end,
                right_start,
                kind: CutKind::Sentence,
            })
        })
    }

    /// Move the right piece's start back by up to `local_split_overlap_chars`,
    /// never more than half the left piece, so halves always shrink.
    fn with_local_overlap(&self, piece: &str, cut: Cut) -> Cut {
        if cut.kind == CutKind::Sentence || self.config.local_split_overlap_chars == 0 {
            return cut;
        }
        let left = &piece[..cut.left_end];
        let left_chars = left.chars().count();
        let overlap = self.config.local_split_overlap_chars.min(left_chars / 2);
        if overlap == 0 {
            return cut;
        }
        Cut {
            right_start: byte_at_char(left, left_chars - overlap),
            ..cut
        }
    }
}

/// Whitespace nearest to `mid` within `[lo, hi]`: the left piece ends before
/// it (trailing whitespace trimmed), the right piece starts after the run.
fn word_cut(chars: &[(usize, char)], mid: usize, lo: usize, hi: usize) -> Option<Cut> {
    nearest(mid, lo, hi, |k| {
        if !chars[k].1.is_whitespace() {
            return None;
        }
        let mut left = k;
        while left > 0 && chars[left - 1].1.is_whitespace() {
            left -= 1;
        }
        let mut right = k;
        while right < chars.len() && chars[right].1.is_whitespace() {
            right += 1;
        }
        if left == 0 || right == chars.len() {
            return None;
        }
        Some(Cut {
            left_end: chars[left].0,
            right_start: chars[right].0,
            kind: CutKind::Word,
        })
    })
}

/// Try `mid, mid-1, mid+1, mid-2, …` within `[lo, hi]`, returning the
/// first hit.
fn nearest<T>(
    mid: usize,
    lo: usize,
    hi: usize,
    mut check: impl FnMut(usize) -> Option<T>,
) -> Option<T> {
    let reach = (mid - lo).max(hi.saturating_sub(mid));
    for d in 0..=reach {
        if d <= mid - lo {
            if let Some(hit) = check(mid - d) {
                return Some(hit);
            }
        }
        if d > 0 && mid + d <= hi {
            if let Some(hit) = check(mid + d) {
                return Some(hit);
            }
        }
    }
    None
}
