//! Stage-2 entropy coding.
//!
//! Every coder exposes the same external contract: `encode` turns a byte
//! block into bits on a [`BitWriter`] and returns the bit count, `decode`
//! reproduces exactly the bytes that were encoded. Coders keep whatever
//! internal state and ordering they like; the block engine only relies on
//! `decode(encode(x)) = x`.
//!
//! Implemented codecs: NONE (passthrough), HUFFMAN (canonical,
//! length-limited), ANS0 (static order-0 range-ANS), RANGE (static
//! frequency range coder), FPAQ (adaptive binary arithmetic). The remaining
//! ids are recognized by name for header compatibility but rejected by the
//! factory.

use crate::bitstream::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::types::Context;

pub mod ans;
pub mod fpaq;
pub mod huffman;
pub mod none;
pub mod range;

pub use ans::{AnsDecoder, AnsEncoder};
pub use fpaq::{FpaqDecoder, FpaqEncoder};
pub use huffman::{HuffmanDecoder, HuffmanEncoder};
pub use none::{RawDecoder, RawEncoder};
pub use range::{RangeDecoder, RangeEncoder};

// ── Entropy codec ids (5-bit field in the file header) ───────────────────────
pub const NONE_TYPE: u8 = 0;
pub const HUFFMAN_TYPE: u8 = 1;
pub const ANS0_TYPE: u8 = 2;
pub const ANS1_TYPE: u8 = 3;
pub const RANGE_TYPE: u8 = 4;
pub const FPAQ_TYPE: u8 = 5;
pub const CM_TYPE: u8 = 6;
pub const TPAQ_TYPE: u8 = 7;
pub const TPAQX_TYPE: u8 = 8;

/// Codec id → canonical name.
pub fn entropy_name(id: u8) -> &'static str {
    match id {
        NONE_TYPE => "NONE",
        HUFFMAN_TYPE => "HUFFMAN",
        ANS0_TYPE => "ANS0",
        ANS1_TYPE => "ANS1",
        RANGE_TYPE => "RANGE",
        FPAQ_TYPE => "FPAQ",
        CM_TYPE => "CM",
        TPAQ_TYPE => "TPAQ",
        TPAQX_TYPE => "TPAQX",
        _ => "UNKNOWN",
    }
}

/// Canonical name → codec id (case-insensitive).
pub fn entropy_id(name: &str) -> Result<u8> {
    match name.to_uppercase().as_str() {
        "NONE" => Ok(NONE_TYPE),
        "HUFFMAN" => Ok(HUFFMAN_TYPE),
        "ANS0" => Ok(ANS0_TYPE),
        "ANS1" => Ok(ANS1_TYPE),
        "RANGE" => Ok(RANGE_TYPE),
        "FPAQ" => Ok(FPAQ_TYPE),
        "CM" => Ok(CM_TYPE),
        "TPAQ" => Ok(TPAQ_TYPE),
        "TPAQX" => Ok(TPAQX_TYPE),
        _ => Err(Error::invalid_param(format!(
            "unknown entropy codec '{name}'"
        ))),
    }
}

/// External contract of a stage-2 encoder.
pub trait EntropyEncoder {
    /// Encode `block` onto `bw`; returns the number of bits emitted.
    fn encode(&mut self, block: &[u8], bw: &mut BitWriter) -> Result<u64>;
    /// Flush any buffered coder state.
    fn dispose(&mut self, bw: &mut BitWriter);
}

/// External contract of a stage-2 decoder.
pub trait EntropyDecoder {
    /// Fill `block` with exactly `block.len()` decoded bytes from `br`.
    fn decode(&mut self, block: &mut [u8], br: &mut BitReader) -> Result<usize>;
}

/// Tagged encoder variant returned by the factory.
#[derive(Debug)]
pub enum Encoder {
    Raw(RawEncoder),
    Huffman(HuffmanEncoder),
    Ans(AnsEncoder),
    Range(RangeEncoder),
    Fpaq(FpaqEncoder),
}

/// Tagged decoder variant returned by the factory.
#[derive(Debug)]
pub enum Decoder {
    Raw(RawDecoder),
    Huffman(HuffmanDecoder),
    Ans(AnsDecoder),
    Range(RangeDecoder),
    Fpaq(FpaqDecoder),
}

/// Build the encoder for a header codec id.
pub fn new_encoder(id: u8, _ctx: &Context) -> Result<Encoder> {
    match id {
        NONE_TYPE => Ok(Encoder::Raw(RawEncoder::new())),
        HUFFMAN_TYPE => Ok(Encoder::Huffman(HuffmanEncoder::new())),
        ANS0_TYPE => Ok(Encoder::Ans(AnsEncoder::new())),
        RANGE_TYPE => Ok(Encoder::Range(RangeEncoder::new())),
        FPAQ_TYPE => Ok(Encoder::Fpaq(FpaqEncoder::new())),
        _ => Err(Error::invalid_param(format!(
            "entropy codec '{}' is not supported",
            entropy_name(id)
        ))),
    }
}

/// Build the decoder for a header codec id.
pub fn new_decoder(id: u8, _ctx: &Context) -> Result<Decoder> {
    match id {
        NONE_TYPE => Ok(Decoder::Raw(RawDecoder::new())),
        HUFFMAN_TYPE => Ok(Decoder::Huffman(HuffmanDecoder::new())),
        ANS0_TYPE => Ok(Decoder::Ans(AnsDecoder::new())),
        RANGE_TYPE => Ok(Decoder::Range(RangeDecoder::new())),
        FPAQ_TYPE => Ok(Decoder::Fpaq(FpaqDecoder::new())),
        _ => Err(Error::invalid_param(format!(
            "entropy codec '{}' is not supported",
            entropy_name(id)
        ))),
    }
}

impl EntropyEncoder for Encoder {
    fn encode(&mut self, block: &[u8], bw: &mut BitWriter) -> Result<u64> {
        match self {
            Encoder::Raw(e) => e.encode(block, bw),
            Encoder::Huffman(e) => e.encode(block, bw),
            Encoder::Ans(e) => e.encode(block, bw),
            Encoder::Range(e) => e.encode(block, bw),
            Encoder::Fpaq(e) => e.encode(block, bw),
        }
    }

    fn dispose(&mut self, bw: &mut BitWriter) {
        match self {
            Encoder::Raw(e) => e.dispose(bw),
            Encoder::Huffman(e) => e.dispose(bw),
            Encoder::Ans(e) => e.dispose(bw),
            Encoder::Range(e) => e.dispose(bw),
            Encoder::Fpaq(e) => e.dispose(bw),
        }
    }
}

impl EntropyDecoder for Decoder {
    fn decode(&mut self, block: &mut [u8], br: &mut BitReader) -> Result<usize> {
        match self {
            Decoder::Raw(d) => d.decode(block, br),
            Decoder::Huffman(d) => d.decode(block, br),
            Decoder::Ans(d) => d.decode(block, br),
            Decoder::Range(d) => d.decode(block, br),
            Decoder::Fpaq(d) => d.decode(block, br),
        }
    }
}

// ── Shared frequency-table helpers ───────────────────────────────────────────

/// Scale a raw histogram so present symbols keep a non-zero share and the
/// total equals `1 << log_total`. The largest frequency absorbs rounding.
pub(crate) fn normalize_freqs(
    freqs: &[u32; 256],
    total: usize,
    log_total: u32,
) -> [u16; 256] {
    let target = 1u32 << log_total;
    let mut norm = [0u16; 256];
    if total == 0 {
        return norm;
    }
    let mut sum = 0u32;
    let mut max_idx = 0usize;
    let mut max_freq = 0u32;
    for (i, &f) in freqs.iter().enumerate() {
        if f == 0 {
            continue;
        }
        let mut scaled = ((u64::from(f) * u64::from(target)) / total as u64) as u32;
        if scaled == 0 {
            scaled = 1;
        }
        norm[i] = scaled.min(u32::from(u16::MAX)) as u16;
        sum += scaled;
        if f > max_freq {
            max_freq = f;
            max_idx = i;
        }
    }
    // Settle the rounding error so the total is exactly `target`. Deficits go
    // to the most frequent symbol; surpluses are taken back from the largest
    // entries without ever dropping a present symbol to zero.
    if sum < target {
        norm[max_idx] = (u32::from(norm[max_idx]) + (target - sum))
            .min(u32::from(u16::MAX)) as u16;
    } else {
        let mut excess = sum - target;
        while excess > 0 {
            let (idx, &val) = norm
                .iter()
                .enumerate()
                .max_by_key(|&(_, &v)| v)
                .unwrap();
            debug_assert!(val > 1, "cannot normalize: more symbols than slots");
            let take = excess.min(u32::from(val) - 1);
            norm[idx] = (u32::from(val) - take) as u16;
            excess -= take;
        }
    }
    norm
}
