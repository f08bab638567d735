//! MSB-first bit packing over in-memory byte buffers.
//!
//! Every block is encoded into (and decoded from) its own buffer, so the
//! writer grows a `Vec<u8>` and the reader borrows a slice. Bits are written
//! high bit first, matching the big-endian bit order of the file format.
//!
//! Reading past the end of the buffer is a [`Error::Corruption`], never a
//! panic: decoders cannot trust any length field before it has been checked
//! against the remaining input.

use crate::error::{Error, Result};

pub mod writer;
pub mod reader;

pub use reader::BitReader;
pub use writer::BitWriter;

/// Upper bound for a single `write_bits` / `read_bits` call.
pub const MAX_BIT_COUNT: u32 = 64;

#[inline]
pub(crate) fn overflow() -> Error {
    Error::corruption("unexpected end of bitstream")
}
