// Kanzi block-oriented lossless data compression.

pub mod bitstream;
pub mod block;
pub mod cli;
pub mod entropy;
pub mod error;
pub mod global;
pub mod io;
pub mod pool;
pub mod transform;
pub mod types;
pub mod util;
pub mod xxhash;

/// Current bitstream format revision. Streams written by older revisions
/// (down to 3) are still readable.
pub const BITSTREAM_VERSION: u32 = 6;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level re-exports for the most common entry points.
// ─────────────────────────────────────────────────────────────────────────────

/// Crate-wide error type (skip / corruption / capacity / io / invalid-param).
pub use error::{Error, Result};

/// Per-block context and block classification.
pub use types::{Context, DataType};

/// Compressing [`std::io::Write`] adapter.
pub use block::writer::{CompressedOutputStream, WriterConfig};

/// Decompressing [`std::io::Read`] adapter.
pub use block::reader::{CompressedInputStream, StreamInfo};

/// Checksum width selection for the stream header.
pub use block::ChecksumMode;

/// Transform chain helpers (names, ids, 48-bit packing).
pub use transform::{chain_name, parse_chain, transform_name};

/// Entropy codec helpers.
pub use entropy::{entropy_id, entropy_name};

// ─────────────────────────────────────────────────────────────────────────────
// One-shot convenience API
// ─────────────────────────────────────────────────────────────────────────────

/// Compress `data` into a fresh vector with the given configuration.
pub fn compress(data: &[u8], cfg: WriterConfig) -> Result<Vec<u8>> {
    use std::io::Write;
    let mut out = Vec::new();
    let mut w = CompressedOutputStream::new(&mut out, cfg)?;
    w.write_all(data).map_err(Error::Io)?;
    w.close()?;
    drop(w);
    Ok(out)
}

/// Decompress a whole in-memory stream.
pub fn decompress(data: &[u8], jobs: usize) -> Result<Vec<u8>> {
    use std::io::Read;
    let mut r = CompressedInputStream::new(data, jobs)?;
    let mut out = Vec::new();
    r.read_to_end(&mut out).map_err(|e| match e.kind() {
        std::io::ErrorKind::Other => Error::corruption(e.to_string()),
        _ => Error::Io(e),
    })?;
    Ok(out)
}
