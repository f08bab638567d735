//! Order-0 range ANS (rANS) with static per-block frequencies.
//!
//! Frequencies are normalized to a 4096 total and serialized as a sparse
//! (symbol, frequency) table. The encoder walks the block backwards with
//! byte-wise renormalization; the decoder replays forward using a 4096-entry
//! slot-to-symbol table. The final encoder state (32 bits) is written before
//! the renormalization bytes so the decoder can start immediately.

use crate::bitstream::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::global::compute_histogram;

use super::{normalize_freqs, EntropyDecoder, EntropyEncoder};

/// log2 of the normalized frequency total.
const LOG_TOTAL: u32 = 12;
const TOTAL: u32 = 1 << LOG_TOTAL;
/// Lower bound of the coder state interval.
const LOW: u64 = 1 << 23;

#[derive(Debug)]
pub struct AnsEncoder;

impl AnsEncoder {
    pub fn new() -> AnsEncoder {
        AnsEncoder
    }
}

impl Default for AnsEncoder {
    fn default() -> Self {
        AnsEncoder::new()
    }
}

impl EntropyEncoder for AnsEncoder {
    fn encode(&mut self, block: &[u8], bw: &mut BitWriter) -> Result<u64> {
        let start = bw.written();
        if block.is_empty() {
            return Ok(0);
        }
        let mut freqs = [0u32; 256];
        compute_histogram(block, &mut freqs);
        let norm = normalize_freqs(&freqs, block.len(), LOG_TOTAL);

        let mut cum = [0u32; 257];
        for s in 0..256 {
            cum[s + 1] = cum[s] + u32::from(norm[s]);
        }

        // Sparse frequency table.
        let present: Vec<usize> = (0..256).filter(|&s| norm[s] > 0).collect();
        bw.write_bits(present.len() as u64, 9);
        for &s in &present {
            bw.write_bits(s as u64, 8);
            bw.write_bits(u64::from(norm[s]), LOG_TOTAL);
        }

        // Backward pass; renormalization bytes come out reversed.
        let mut state = LOW;
        let mut spill: Vec<u8> = Vec::with_capacity(block.len() / 2 + 16);
        for &b in block.iter().rev() {
            let s = b as usize;
            let f = u64::from(norm[s]);
            let threshold = f << 19; // (LOW >> LOG_TOTAL) << 8 bits of headroom
            while state >= threshold {
                spill.push(state as u8);
                state >>= 8;
            }
            state = ((state / f) << LOG_TOTAL) + (state % f) + u64::from(cum[s]);
        }

        bw.write_bits(state, 32);
        for &b in spill.iter().rev() {
            bw.write_bits(u64::from(b), 8);
        }
        Ok(bw.written() - start)
    }

    fn dispose(&mut self, _bw: &mut BitWriter) {}
}

#[derive(Debug)]
pub struct AnsDecoder;

impl AnsDecoder {
    pub fn new() -> AnsDecoder {
        AnsDecoder
    }
}

impl Default for AnsDecoder {
    fn default() -> Self {
        AnsDecoder::new()
    }
}

impl EntropyDecoder for AnsDecoder {
    fn decode(&mut self, block: &mut [u8], br: &mut BitReader) -> Result<usize> {
        if block.is_empty() {
            return Ok(0);
        }
        let count = br.read_bits(9)? as usize;
        if count == 0 || count > 256 {
            return Err(Error::corruption("invalid ANS alphabet size"));
        }
        let mut norm = [0u16; 256];
        let mut sum = 0u32;
        for _ in 0..count {
            let s = br.read_bits(8)? as usize;
            let f = br.read_bits(LOG_TOTAL)? as u32;
            if f == 0 || norm[s] != 0 {
                return Err(Error::corruption("invalid ANS frequency table"));
            }
            norm[s] = f as u16;
            sum += f;
        }
        if sum != TOTAL {
            return Err(Error::corruption("ANS frequencies do not sum to total"));
        }

        let mut cum = [0u32; 257];
        for s in 0..256 {
            cum[s + 1] = cum[s] + u32::from(norm[s]);
        }
        let mut slot_to_symbol = vec![0u8; TOTAL as usize];
        for s in 0..256 {
            for slot in cum[s]..cum[s + 1] {
                slot_to_symbol[slot as usize] = s as u8;
            }
        }

        let mut state = br.read_bits(32)?;
        for out in block.iter_mut() {
            let slot = (state & u64::from(TOTAL - 1)) as u32;
            let s = slot_to_symbol[slot as usize] as usize;
            *out = s as u8;
            let f = u64::from(norm[s]);
            state = f * (state >> LOG_TOTAL) + u64::from(slot) - u64::from(cum[s]);
            while state < LOW {
                state = (state << 8) | br.read_bits(8)?;
            }
        }
        if state != LOW {
            return Err(Error::corruption("ANS stream did not terminate cleanly"));
        }
        Ok(block.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8]) {
        let mut bw = BitWriter::new();
        AnsEncoder::new().encode(data, &mut bw).unwrap();
        let buf = bw.close();
        let mut out = vec![0u8; data.len()];
        let mut br = BitReader::new(&buf);
        AnsDecoder::new().decode(&mut out, &mut br).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn roundtrip_text() {
        roundtrip(b"abracadabra abracadabra abracadabra");
    }

    #[test]
    fn roundtrip_single_symbol() {
        roundtrip(&[42u8; 5000]);
    }

    #[test]
    fn roundtrip_dense_alphabet() {
        let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        roundtrip(&data);
    }

    #[test]
    fn roundtrip_one_byte() {
        roundtrip(&[0u8]);
    }
}
