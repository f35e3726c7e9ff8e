use serde::{Deserialize, Serialize};

/// One page of extracted document text.
///
/// Tables and figures have already been substituted with delimited block
/// markup by the extraction step. `offset` is the document-level character
/// offset where this page's text begins (the cumulative length of all prior
/// pages, counted in `char`s).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page_num: u32,
    pub text: String,
    pub offset: usize,
    pub header: Option<String>,
}

impl Page {
    pub fn new(page_num: u32, text: impl Into<String>) -> Self {
        Self {
            page_num,
            text: text.into(),
            offset: 0,
            header: None,
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    /// Character length of the page text.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Build a page sequence from raw page texts: 1-based page numbers and
/// cumulative character offsets.
pub fn paginate<I, S>(texts: I) -> Vec<Page>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut offset = 0usize;
    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let page = Page::new(i as u32 + 1, text).with_offset(offset);
            offset += page.char_len();
            page
        })
        .collect()
}

/// Why a chunk is allowed to sit above the hard token budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetException {
    /// A table or figure larger than `max_tokens`, emitted whole.
    OversizedAtomic,
    /// A plain-text leaf the splitter could not bring under budget.
    BudgetExceeded,
    /// A cross-page merge that landed between `max_tokens` and the merge tolerance.
    MergeTolerance,
}

/// A finished, retrieval-ready chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Page the chunk is attributed to (the earlier page for merged chunks).
    pub page_num: u32,
    /// Last page contributing canonical text; equals `page_num` unless merged.
    pub end_page: u32,
    /// 0-based, sequential per page.
    pub chunk_index_on_page: u32,
    /// Canonical text followed by any appended overlap.
    pub text: String,
    /// Document-level character range of the canonical (pre-overlap) text.
    pub char_span: (usize, usize),
    /// Token count of `text`, overlap included.
    pub token_count: u32,
    pub page_header: Option<String>,
    pub atomic_ids: Vec<String>,
    pub exception: Option<BudgetException>,
    /// Bytes of overlap appended to the end of `text`.
    pub overlap_len: usize,
}

impl TextChunk {
    /// The chunk text without any overlap borrowed from its successor.
    pub fn canonical_text(&self) -> &str {
        &self.text[..self.text.len() - self.overlap_len]
    }

    /// The overlap borrowed from the next chunk, if any.
    pub fn overlap_text(&self) -> &str {
        &self.text[self.text.len() - self.overlap_len..]
    }

    pub fn has_atomic(&self) -> bool {
        !self.atomic_ids.is_empty()
    }

    pub fn is_flagged(&self) -> bool {
        self.exception.is_some()
    }

    pub fn spans_pages(&self) -> bool {
        self.end_page != self.page_num
    }
}
