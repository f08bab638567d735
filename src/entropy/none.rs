//! Passthrough codec: bytes go to the bitstream unmodified.

use crate::bitstream::{BitReader, BitWriter};
use crate::error::Result;

use super::{EntropyDecoder, EntropyEncoder};

#[derive(Debug)]
pub struct RawEncoder;

impl RawEncoder {
    pub fn new() -> RawEncoder {
        RawEncoder
    }
}

impl Default for RawEncoder {
    fn default() -> Self {
        RawEncoder::new()
    }
}

impl EntropyEncoder for RawEncoder {
    fn encode(&mut self, block: &[u8], bw: &mut BitWriter) -> Result<u64> {
        bw.write_bytes(block);
        Ok(block.len() as u64 * 8)
    }

    fn dispose(&mut self, _bw: &mut BitWriter) {}
}

#[derive(Debug)]
pub struct RawDecoder;

impl RawDecoder {
    pub fn new() -> RawDecoder {
        RawDecoder
    }
}

impl Default for RawDecoder {
    fn default() -> Self {
        RawDecoder::new()
    }
}

impl EntropyDecoder for RawDecoder {
    fn decode(&mut self, block: &mut [u8], br: &mut BitReader) -> Result<usize> {
        br.read_bytes(block)?;
        Ok(block.len())
    }
}
