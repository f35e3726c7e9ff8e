pub mod config;
pub mod document;
pub mod error;
pub mod tokens;

pub use config::ChunkerConfig;
pub use document::*;
pub use error::*;
pub use tokens::*;
