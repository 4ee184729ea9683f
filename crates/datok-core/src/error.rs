//! Error taxonomy for Foma parsing, construction, binary loading, and
//! transduction.

use std::io;

/// Errors that can occur anywhere in the Foma-to-Tokenizer-to-transduction
/// pipeline.
#[derive(Debug, thiserror::Error)]
pub enum DatokError {
    /// The Foma export is malformed, non-deterministic, not epsilon-free, or
    /// uses an unsupported in/out symbol pairing. Construction yields no
    /// `Automaton`.
    #[error("foma parse error: {0}")]
    Parse(String),

    /// A binary tokenizer file has a bad magic, unsupported version, is
    /// truncated, or is missing its section marker.
    #[error("tokenizer file format error: {0}")]
    Format(String),

    /// I/O failure while reading the input stream during transduction, or
    /// an invalid UTF-8 byte sequence in the input.
    #[error("input error: {0}")]
    Input(String),

    /// The double-array builder would need to represent a symbol count or
    /// state count beyond what the packed layout can hold.
    #[error("construction overflow: {0}")]
    ConstructionOverflow(String),

    /// Wrapped I/O failure (file reads/writes, gzip framing).
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, DatokError>;
