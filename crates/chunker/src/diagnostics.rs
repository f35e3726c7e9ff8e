use serde::{Deserialize, Serialize};

/// Advisory counts collected during one chunking run. None of these are
/// errors; they record where the algorithm fell back to best effort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDiagnostics {
    /// Tables/figures emitted alone above `max_tokens`.
    pub oversized_atomic: usize,
    /// Plain leaves the splitter could not bring under `max_tokens`.
    pub budget_exceeded: usize,
    /// Block start markers with no matching end marker.
    pub unterminated_blocks: usize,
    /// Drafts that grew past the soft character ceiling.
    pub soft_char_overflows: usize,
    /// Trailing fragments that could not be shifted to the next chunk.
    pub coherence_compromises: usize,
    pub cross_page_merges: usize,
    pub fragments_shifted: usize,
    pub overlaps_applied: usize,
    /// Overlaps dropped because even one word would break the token ceiling.
    pub overlaps_skipped: usize,
}

impl ChunkDiagnostics {
    pub fn absorb(&mut self, other: &ChunkDiagnostics) {
        self.oversized_atomic += other.oversized_atomic;
        self.budget_exceeded += other.budget_exceeded;
        self.unterminated_blocks += other.unterminated_blocks;
        self.soft_char_overflows += other.soft_char_overflows;
        self.coherence_compromises += other.coherence_compromises;
        self.cross_page_merges += other.cross_page_merges;
        self.fragments_shifted += other.fragments_shifted;
        self.overlaps_applied += other.overlaps_applied;
        self.overlaps_skipped += other.overlaps_skipped;
    }

    /// Number of chunks allowed above the hard budget for data reasons.
    pub fn budget_exceptions(&self) -> usize {
        self.oversized_atomic + self.budget_exceeded
    }

    pub fn is_clean(&self) -> bool {
        self.budget_exceptions() == 0
            && self.unterminated_blocks == 0
            && self.coherence_compromises == 0
    }
}
