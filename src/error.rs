//! Error taxonomy for the block engine.
//!
//! Four kinds of failure flow through the pipeline:
//!
//! 1. **Skip** — a forward transform (or a whole block) declined to compress.
//!    Not user-visible: the caller sets the stage's skip bit and passes the
//!    bytes through unchanged.
//! 2. **Corruption** — checksum mismatch or an invalid field in a decoded
//!    header/payload. Fatal to the affected block and to the reader.
//! 3. **Capacity** — an output buffer was too small or a size limit was
//!    exceeded. Fatal to the affected block.
//! 4. **Io** — the underlying byte stream failed; propagated unchanged.
//!
//! `InvalidParam` covers construction-time misuse (bad block size, unknown
//! codec name) and maps to its own CLI exit code.

use std::fmt;
use std::io;

/// Errors produced by transforms, entropy coders and the block engine.
#[derive(Debug)]
pub enum Error {
    /// The transform chose not to process this block. The reason is a short
    /// static tag used only for verbose diagnostics.
    Skip(&'static str),
    /// The compressed stream is damaged or was not produced by this format.
    Corruption(String),
    /// An output buffer or size limit was exceeded.
    Capacity(String),
    /// Underlying stream failure.
    Io(io::Error),
    /// Invalid construction parameter (block size, codec name, job count...).
    InvalidParam(String),
}

impl Error {
    /// True for the non-fatal skip signal.
    #[inline]
    pub fn is_skip(&self) -> bool {
        matches!(self, Error::Skip(_))
    }

    /// Shorthand for a corruption error with a formatted message.
    pub fn corruption(msg: impl Into<String>) -> Error {
        Error::Corruption(msg.into())
    }

    /// Shorthand for a capacity error with a formatted message.
    pub fn capacity(msg: impl Into<String>) -> Error {
        Error::Capacity(msg.into())
    }

    /// Shorthand for an invalid-parameter error with a formatted message.
    pub fn invalid_param(msg: impl Into<String>) -> Error {
        Error::InvalidParam(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Skip(tag) => write!(f, "transform skipped: {tag}"),
            Error::Corruption(msg) => write!(f, "corrupted stream: {msg}"),
            Error::Capacity(msg) => write!(f, "capacity exceeded: {msg}"),
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::InvalidParam(msg) => write!(f, "invalid parameter: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_is_the_only_soft_kind() {
        assert!(Error::Skip("because").is_skip());
        assert!(!Error::corruption("x").is_skip());
        assert!(!Error::from(io::Error::other("y")).is_skip());
    }

    #[test]
    fn display_names_the_kind() {
        assert!(Error::corruption("bad magic").to_string().contains("corrupted"));
        assert!(Error::invalid_param("jobs").to_string().contains("invalid parameter"));
    }
}
