use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("Invalid chunker configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChunkError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        ChunkError::InvalidConfig {
            reason: reason.into(),
        }
    }
}
