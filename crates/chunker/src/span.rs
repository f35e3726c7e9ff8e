//! Page-local spans produced by segmentation and consumed by the builder.

/// An ordered piece of one page's text. `text` is always
/// `page.text[byte_start..byte_end]`; chunk spans convert to chars on flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Plain {
        text: String,
        byte_start: usize,
        byte_end: usize,
    },
    /// Exactly one table or figure, markers included. Never split.
    Atomic {
        id: String,
        text: String,
        byte_start: usize,
        byte_end: usize,
    },
}

impl Span {
    pub fn plain(text: impl Into<String>, byte_start: usize) -> Self {
        let text = text.into();
        let byte_end = byte_start + text.len();
        Span::Plain {
            text,
            byte_start,
            byte_end,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Span::Plain { text, .. } | Span::Atomic { text, .. } => text,
        }
    }

    pub fn byte_start(&self) -> usize {
        match self {
            Span::Plain { byte_start, .. } | Span::Atomic { byte_start, .. } => *byte_start,
        }
    }

    pub fn byte_end(&self) -> usize {
        match self {
            Span::Plain { byte_end, .. } | Span::Atomic { byte_end, .. } => *byte_end,
        }
    }

    /// Page-relative char offsets of this span within `page_text`.
    pub fn char_range(&self, page_text: &str) -> (usize, usize) {
        let start = page_text[..self.byte_start()].chars().count();
        (start, start + self.text().chars().count())
    }

    pub fn atomic_id(&self) -> Option<&str> {
        match self {
            Span::Atomic { id, .. } => Some(id),
            Span::Plain { .. } => None,
        }
    }

    pub fn is_atomic(&self) -> bool {
        matches!(self, Span::Atomic { .. })
    }
}

/// A span with its token count, ready for the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasuredSpan {
    pub span: Span,
    pub tokens: u32,
    /// Set when the splitter gave up on a leaf that is still above `max_tokens`.
    pub over_budget: bool,
}

impl MeasuredSpan {
    pub fn new(span: Span, tokens: u32) -> Self {
        Self {
            span,
            tokens,
            over_budget: false,
        }
    }
}
