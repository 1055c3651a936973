//! Frozen token → vector embeddings produced by the item embedding trainer,
//! with the codecs used to hand them from training over to serving.

pub mod codec;
pub mod map;
pub mod search;

pub use codec::{EmbeddingFormat, load, save};
pub use map::EmbeddingMap;
pub use search::Neighbor;

use thiserror::Error;

/// Errors raised while building, writing or reading embedding maps.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Wrapper around IO failures when accessing the embedding stream.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Raised when the binary record stream cannot be encoded or decoded.
    #[error("bincode error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    /// Raised when a vector does not match the map dimensionality.
    #[error("embedding dimension mismatch for `{word}`: expected {expected}, found {found}")]
    DimensionMismatch {
        word: String,
        expected: usize,
        found: usize,
    },
    /// Raised when the binary header carries an unknown magic or version.
    #[error("unsupported embedding stream (magic {magic:?}, version {version})")]
    UnsupportedStream { magic: [u8; 4], version: u32 },
    /// Raised when a text line cannot be parsed.
    #[error("malformed text embedding at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    /// Raised when a token cannot be represented in the text format.
    #[error("word `{0}` contains whitespace and cannot be written as text")]
    InvalidWord(String),
}
