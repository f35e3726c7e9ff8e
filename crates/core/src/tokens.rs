//! Token counting seam. The engine never tokenizes on its own; it asks an
//! injected counter, which must be deterministic and side-effect free.

/// Counts tokens in a piece of text.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> u32;
}

impl<F> TokenCounter for F
where
    F: Fn(&str) -> u32 + Send + Sync,
{
    fn count(&self, text: &str) -> u32 {
        self(text)
    }
}

/// Approximate token count via whitespace splitting.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenCounter;

impl TokenCounter for WhitespaceTokenCounter {
    fn count(&self, text: &str) -> u32 {
        text.split_whitespace().count() as u32
    }
}

/// Token counts from a HuggingFace tokenizer. Use the same tokenizer that the
/// embedding model uses so chunk budgets match what the model will see.
#[cfg(feature = "hf-tokenizers")]
pub struct HfTokenCounter {
    tokenizer: tokenizers::Tokenizer,
}

#[cfg(feature = "hf-tokenizers")]
impl HfTokenCounter {
    pub fn new(tokenizer: tokenizers::Tokenizer) -> Self {
        Self { tokenizer }
    }

    /// Load a `tokenizer.json` from disk.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::ChunkError> {
        let tokenizer = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| crate::ChunkError::Tokenizer(e.to_string()))?;
        Ok(Self { tokenizer })
    }
}

#[cfg(feature = "hf-tokenizers")]
impl TokenCounter for HfTokenCounter {
    fn count(&self, text: &str) -> u32 {
        self.tokenizer
            .encode(text, false)
            .map(|encoding| encoding.len() as u32)
            .unwrap_or(0)
    }
}
