use std::env;

use serde::{Deserialize, Serialize};

use crate::error::ChunkError;

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key).map(|v| v.to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

/// Abbreviations whose trailing period never ends a sentence.
pub const DEFAULT_ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "e.g", "i.e", "cf", "al",
    "fig", "figs", "eq", "no", "vol", "pp", "approx", "inc", "ltd", "co", "corp", "dept", "sec",
    "ch", "ref",
];

// ── Chunker config ────────────────────────────────────────────

/// Parameters for one chunking run. Passed explicitly to every component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Hard token ceiling per chunk.
    pub max_tokens: u32,
    /// Soft character ceiling per chunk.
    pub max_chars: usize,
    /// Overlap size as a percentage of `max_chars`. 0 disables overlap and cross-page merge.
    pub overlap_percent: u32,
    /// Gates cross-page merging independently of intra-page overlap.
    pub cross_page_overlap_enabled: bool,
    /// Leaves above this after maximal splitting are reported at warn level.
    pub absolute_max_tokens: u32,
    /// Characters duplicated across a mid-sentence split.
    pub local_split_overlap_chars: usize,
    /// Half-width of the split-point search window, as a percentage of span length.
    pub split_window_percent: u32,
    /// How far past `max_chars` a draft may grow before a soft warning.
    pub soft_char_tolerance_percent: u32,
    /// Token headroom over `max_tokens` allowed for a cross-page merge.
    pub merge_tolerance_percent: u32,
    /// Token headroom over `max_tokens` allowed once overlap is appended.
    pub overlap_token_tolerance_percent: u32,
    /// Lowercase words (without their final period) that never end a sentence.
    pub abbreviations: Vec<String>,
    /// Segment and build pages on the rayon pool before the sequential boundary pass.
    pub parallel_pages: bool,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            max_chars: 1000,
            overlap_percent: 10,
            cross_page_overlap_enabled: false,
            absolute_max_tokens: 8000,
            local_split_overlap_chars: 50,
            split_window_percent: 20,
            soft_char_tolerance_percent: 20,
            merge_tolerance_percent: 20,
            overlap_token_tolerance_percent: 20,
            abbreviations: DEFAULT_ABBREVIATIONS.iter().map(|s| s.to_string()).collect(),
            parallel_pages: false,
        }
    }
}

fn with_headroom(base: u32, percent: u32) -> u32 {
    let scaled = base as u64 * (100 + percent as u64) / 100;
    scaled.min(u32::MAX as u64) as u32
}

impl ChunkerConfig {
    /// Defaults overridden by environment variables.
    pub fn from_env() -> Self {
        Self::from_env_profiled("")
    }

    /// Like [`from_env`](Self::from_env), but every key is first looked up as
    /// `{PROFILE}_{KEY}`.
    pub fn from_env_profiled(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        let d = Self::default();
        Self {
            max_tokens: profiled_env_u32(p, "CHUNK_MAX_TOKENS", d.max_tokens),
            max_chars: profiled_env_usize(p, "CHUNK_MAX_CHARS", d.max_chars),
            overlap_percent: profiled_env_u32(p, "CHUNK_OVERLAP_PERCENT", d.overlap_percent),
            cross_page_overlap_enabled: profiled_env_bool(
                p,
                "CHUNK_CROSS_PAGE_OVERLAP",
                d.cross_page_overlap_enabled,
            ),
            absolute_max_tokens: profiled_env_u32(
                p,
                "CHUNK_ABSOLUTE_MAX_TOKENS",
                d.absolute_max_tokens,
            ),
            local_split_overlap_chars: profiled_env_usize(
                p,
                "CHUNK_LOCAL_SPLIT_OVERLAP",
                d.local_split_overlap_chars,
            ),
            parallel_pages: profiled_env_bool(p, "CHUNK_PARALLEL_PAGES", d.parallel_pages),
            ..d
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn with_overlap_percent(mut self, percent: u32) -> Self {
        self.overlap_percent = percent;
        self
    }

    pub fn with_cross_page_overlap(mut self, enabled: bool) -> Self {
        self.cross_page_overlap_enabled = enabled;
        self
    }

    pub fn with_absolute_max_tokens(mut self, tokens: u32) -> Self {
        self.absolute_max_tokens = tokens;
        self
    }

    pub fn with_local_split_overlap(mut self, chars: usize) -> Self {
        self.local_split_overlap_chars = chars;
        self
    }

    pub fn with_abbreviations<I, S>(mut self, abbreviations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.abbreviations = abbreviations.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parallel_pages(mut self, parallel: bool) -> Self {
        self.parallel_pages = parallel;
        self
    }

    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.max_tokens == 0 {
            return Err(ChunkError::invalid_config("max_tokens must be greater than 0"));
        }
        if self.max_chars == 0 {
            return Err(ChunkError::invalid_config("max_chars must be greater than 0"));
        }
        if self.absolute_max_tokens < self.max_tokens {
            return Err(ChunkError::invalid_config(format!(
                "absolute_max_tokens ({}) must be at least max_tokens ({})",
                self.absolute_max_tokens, self.max_tokens
            )));
        }
        if self.overlap_percent > 100 {
            return Err(ChunkError::invalid_config(format!(
                "overlap_percent must be at most 100, got {}",
                self.overlap_percent
            )));
        }
        if !(1..=50).contains(&self.split_window_percent) {
            return Err(ChunkError::invalid_config(format!(
                "split_window_percent must be within 1..=50, got {}",
                self.split_window_percent
            )));
        }
        Ok(())
    }

    /// Character count past which a draft logs a soft-ceiling warning.
    pub fn soft_char_ceiling(&self) -> usize {
        self.max_chars * (100 + self.soft_char_tolerance_percent as usize) / 100
    }

    /// Largest token count a cross-page merge may produce.
    pub fn merge_token_ceiling(&self) -> u32 {
        with_headroom(self.max_tokens, self.merge_tolerance_percent)
    }

    /// Largest token count a chunk may reach once overlap is appended.
    pub fn overlap_token_ceiling(&self) -> u32 {
        with_headroom(self.max_tokens, self.overlap_token_tolerance_percent)
    }

    /// Target overlap length in characters; 0 when overlap is disabled.
    pub fn overlap_target_chars(&self) -> usize {
        self.overlap_percent as usize * self.max_chars / 100
    }

    /// Cross-page merge runs only when overlap is on and the gate is open.
    pub fn cross_page_merge_active(&self) -> bool {
        self.overlap_percent > 0 && self.cross_page_overlap_enabled
    }

    pub fn log_summary(&self) {
        tracing::info!("Chunker config:");
        tracing::info!(
            "  budget:   max_tokens={}, max_chars={}, absolute_max_tokens={}",
            self.max_tokens,
            self.max_chars,
            self.absolute_max_tokens
        );
        tracing::info!(
            "  overlap:  percent={}, cross_page={}, local_split_chars={}",
            self.overlap_percent,
            self.cross_page_overlap_enabled,
            self.local_split_overlap_chars
        );
        tracing::info!(
            "  pages:    parallel={}, abbreviations={}",
            self.parallel_pages,
            self.abbreviations.len()
        );
    }

    /// Compact view for embedding in run reports.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "max_tokens": self.max_tokens,
            "max_chars": self.max_chars,
            "overlap_percent": self.overlap_percent,
            "cross_page_overlap_enabled": self.cross_page_overlap_enabled,
            "absolute_max_tokens": self.absolute_max_tokens,
            "local_split_overlap_chars": self.local_split_overlap_chars,
            "parallel_pages": self.parallel_pages,
        })
    }
}
