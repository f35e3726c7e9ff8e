//! Boundary-scanning helpers shared by the chunking stages.
//!
//! All positions are byte offsets into the scanned `&str` and always land on
//! char boundaries.

use std::collections::HashSet;

use pagechunk_core::ChunkerConfig;

pub(crate) fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Closing quotes and brackets that may trail sentence punctuation.
fn is_closer(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}')
}

/// Sentence-boundary heuristic: `.`, `!` or `?` (optionally followed by
/// closing quotes) then whitespace, unless the period closes a known
/// abbreviation.
#[derive(Debug, Clone)]
pub struct SentenceRules {
    abbreviations: HashSet<String>,
}

impl SentenceRules {
    pub fn new<I, S>(abbreviations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let abbreviations = abbreviations
            .into_iter()
            .map(|a| a.as_ref().trim().trim_end_matches('.').to_lowercase())
            .filter(|a| !a.is_empty())
            .collect();
        Self { abbreviations }
    }

    pub fn from_config(config: &ChunkerConfig) -> Self {
        Self::new(&config.abbreviations)
    }

    /// Whether `before` (the text up to a period) ends with an abbreviation.
    pub fn is_abbreviation(&self, before: &str) -> bool {
        let word = before
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or("")
            .trim_start_matches(|c: char| !c.is_alphanumeric());
        !word.is_empty() && self.abbreviations.contains(&word.to_lowercase())
    }

    /// If the char at `pos` is sentence punctuation that ends a sentence,
    /// returns the byte offset just past it (and any closers). Requires
    /// whitespace or end of text afterwards.
    pub fn sentence_end_at(&self, text: &str, pos: usize) -> Option<usize> {
        let c = text[pos..].chars().next()?;
        if !is_terminal(c) {
            return None;
        }
        if c == '.' && self.is_abbreviation(&text[..pos]) {
            return None;
        }
        let mut end = pos + c.len_utf8();
        for next in text[end..].chars() {
            if is_closer(next) {
                end += next.len_utf8();
            } else {
                break;
            }
        }
        match text[end..].chars().next() {
            None => Some(end),
            Some(next) if next.is_whitespace() => Some(end),
            Some(_) => None,
        }
    }

    /// Byte ranges of the sentences in `text`, trimmed of surrounding
    /// whitespace. A sentence ends at punctuation followed by whitespace and
    /// an uppercase letter; a trailing unterminated fragment is its own range.
    pub fn sentence_ranges(&self, text: &str) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        let mut start = 0;

        for (i, c) in text.char_indices() {
            if i < start || !is_terminal(c) {
                continue;
            }
            let Some(end) = self.sentence_end_at(text, i) else {
                continue;
            };
            let rest = &text[end..];
            let next_word = rest.trim_start();
            match next_word.chars().next() {
                Some(first) if first.is_uppercase() => {
                    push_trimmed(&mut ranges, text, start, end);
                    start = end;
                }
                // Trailing whitespace or a lowercase continuation: not a split here.
                _ => {}
            }
        }

        push_trimmed(&mut ranges, text, start, text.len());
        ranges
    }

    /// Byte offset just past the last sentence end in `text`.
    pub fn last_sentence_end(&self, text: &str) -> Option<usize> {
        text.char_indices()
            .rev()
            .filter(|(_, c)| is_terminal(*c))
            .find_map(|(i, _)| self.sentence_end_at(text, i))
    }
}

impl Default for SentenceRules {
    fn default() -> Self {
        Self::from_config(&ChunkerConfig::default())
    }
}

fn push_trimmed(ranges: &mut Vec<(usize, usize)>, text: &str, start: usize, end: usize) {
    let slice = &text[start..end];
    let trimmed_start = slice.trim_start();
    let lead = slice.len() - trimmed_start.len();
    let trimmed = trimmed_start.trim_end();
    if !trimmed.is_empty() {
        let s = start + lead;
        ranges.push((s, s + trimmed.len()));
    }
}

/// True if `text` (ignoring trailing whitespace and closers) ends with
/// sentence punctuation.
pub(crate) fn ends_with_terminal(text: &str) -> bool {
    text.trim_end()
        .trim_end_matches(is_closer)
        .chars()
        .next_back()
        .is_some_and(is_terminal)
}

/// True if `text` opens with a heading marker: `#` or a numbered-list item
/// such as `1.` / `2)`.
pub(crate) fn starts_with_heading(text: &str) -> bool {
    let t = text.trim_start();
    if t.starts_with('#') {
        return true;
    }
    let digits = t.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return false;
    }
    let mut rest = t[digits..].chars();
    matches!(rest.next(), Some('.') | Some(')')) && rest.next().map_or(true, char::is_whitespace)
}

pub(crate) fn starts_lowercase(text: &str) -> bool {
    text.trim_start()
        .chars()
        .next()
        .is_some_and(char::is_lowercase)
}

/// Byte offset of the `n`th char of `text` (or `text.len()` past the end).
pub(crate) fn byte_at_char(text: &str, n: usize) -> usize {
    text.char_indices()
        .nth(n)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}
