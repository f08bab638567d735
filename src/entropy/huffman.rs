//! Canonical Huffman coding, length-limited to 24 bits.
//!
//! The encoder writes 256 five-bit code lengths (0 = absent symbol) followed
//! by the code bits. Codes are canonical: sorted by (length, symbol value),
//! assigned incrementally, so the decoder rebuilds the exact table from the
//! lengths alone and decodes with per-length first-code ranges.
//!
//! Length limiting uses frequency halving: when the optimal tree exceeds the
//! limit, all frequencies are rescaled (`f/2 + 1`) and the tree is rebuilt.
//! This converges quickly and keeps the table construction allocation-free
//! beyond two small scratch arrays.

use crate::bitstream::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::global::compute_histogram;

use super::{EntropyDecoder, EntropyEncoder};

/// Longest admissible code.
pub const MAX_CODE_LEN: u32 = 24;

// ── Code length construction ─────────────────────────────────────────────────

/// Huffman code lengths for the present symbols, indexed by symbol value.
fn compute_lengths(freqs: &[u32; 256]) -> [u8; 256] {
    let mut lengths = [0u8; 256];
    let present: Vec<usize> = (0..256).filter(|&s| freqs[s] > 0).collect();
    match present.len() {
        0 => return lengths,
        1 => {
            lengths[present[0]] = 1;
            return lengths;
        }
        _ => {}
    }

    let mut work: Vec<u32> = present.iter().map(|&s| freqs[s]).collect();
    loop {
        let lens = tree_depths(&work);
        let max = lens.iter().copied().max().unwrap_or(0);
        if u32::from(max) <= MAX_CODE_LEN {
            for (i, &s) in present.iter().enumerate() {
                lengths[s] = lens[i];
            }
            return lengths;
        }
        // Flatten the distribution and retry.
        for f in work.iter_mut() {
            *f = (*f >> 1) + 1;
        }
    }
}

/// Depth of each leaf in the optimal Huffman tree for `freqs` (≥ 2 leaves).
fn tree_depths(freqs: &[u32]) -> Vec<u8> {
    let n = freqs.len();
    // Nodes: leaves first, then internal nodes; parent links resolve depths.
    let mut weight: Vec<u64> = freqs.iter().map(|&f| u64::from(f)).collect();
    let mut parent = vec![usize::MAX; 2 * n - 1];
    let mut heap: std::collections::BinaryHeap<std::cmp::Reverse<(u64, usize)>> = (0..n)
        .map(|i| std::cmp::Reverse((weight[i], i)))
        .collect();
    let mut next = n;
    while heap.len() > 1 {
        let std::cmp::Reverse((w1, n1)) = heap.pop().unwrap();
        let std::cmp::Reverse((w2, n2)) = heap.pop().unwrap();
        parent[n1] = next;
        parent[n2] = next;
        weight.push(w1 + w2);
        heap.push(std::cmp::Reverse((w1 + w2, next)));
        next += 1;
    }
    let mut lens = vec![0u8; n];
    for i in 0..n {
        let mut depth = 0u8;
        let mut node = i;
        while parent[node] != usize::MAX {
            node = parent[node];
            depth += 1;
        }
        lens[i] = depth;
    }
    lens
}

/// Canonical code assignment: symbols sorted by (length, value) receive
/// consecutive codes, lengths increasing left to right.
fn canonical_codes(lengths: &[u8; 256]) -> [u32; 256] {
    let mut codes = [0u32; 256];
    let mut count = [0u32; MAX_CODE_LEN as usize + 1];
    for &l in lengths.iter() {
        count[l as usize] += 1;
    }
    count[0] = 0;
    let mut next = [0u32; MAX_CODE_LEN as usize + 1];
    let mut code = 0u32;
    for len in 1..=MAX_CODE_LEN as usize {
        code = (code + count[len - 1]) << 1;
        next[len] = code;
    }
    for s in 0..256 {
        let len = lengths[s] as usize;
        if len > 0 {
            codes[s] = next[len];
            next[len] += 1;
        }
    }
    codes
}

// ── Encoder ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct HuffmanEncoder;

impl HuffmanEncoder {
    pub fn new() -> HuffmanEncoder {
        HuffmanEncoder
    }
}

impl Default for HuffmanEncoder {
    fn default() -> Self {
        HuffmanEncoder::new()
    }
}

impl EntropyEncoder for HuffmanEncoder {
    fn encode(&mut self, block: &[u8], bw: &mut BitWriter) -> Result<u64> {
        let start = bw.written();
        if block.is_empty() {
            return Ok(0);
        }
        let mut freqs = [0u32; 256];
        compute_histogram(block, &mut freqs);
        let lengths = compute_lengths(&freqs);
        let codes = canonical_codes(&lengths);

        for &l in lengths.iter() {
            bw.write_bits(u64::from(l), 5);
        }
        for &b in block {
            let s = b as usize;
            bw.write_bits(u64::from(codes[s]), u32::from(lengths[s]));
        }
        Ok(bw.written() - start)
    }

    fn dispose(&mut self, _bw: &mut BitWriter) {}
}

// ── Decoder ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct HuffmanDecoder;

impl HuffmanDecoder {
    pub fn new() -> HuffmanDecoder {
        HuffmanDecoder
    }
}

impl Default for HuffmanDecoder {
    fn default() -> Self {
        HuffmanDecoder::new()
    }
}

impl EntropyDecoder for HuffmanDecoder {
    fn decode(&mut self, block: &mut [u8], br: &mut BitReader) -> Result<usize> {
        if block.is_empty() {
            return Ok(0);
        }
        let mut lengths = [0u8; 256];
        for l in lengths.iter_mut() {
            let v = br.read_bits(5)? as u32;
            if v > MAX_CODE_LEN {
                return Err(Error::corruption("invalid Huffman code length"));
            }
            *l = v as u8;
        }
        if lengths.iter().all(|&l| l == 0) {
            return Err(Error::corruption("empty Huffman table for non-empty block"));
        }

        // Per-length canonical ranges: first code, count, and the symbols
        // sorted by (length, value).
        let mut count = [0u32; MAX_CODE_LEN as usize + 1];
        for &l in lengths.iter() {
            count[l as usize] += 1;
        }
        count[0] = 0;
        let mut first = [0u32; MAX_CODE_LEN as usize + 1];
        let mut offset = [0u32; MAX_CODE_LEN as usize + 1];
        let mut code = 0u32;
        let mut total = 0u32;
        for len in 1..=MAX_CODE_LEN as usize {
            code = (code + count[len - 1]) << 1;
            first[len] = code;
            offset[len] = total;
            total += count[len];
        }
        let mut symbols = vec![0u8; total as usize];
        let mut fill = offset;
        for s in 0..256 {
            let len = lengths[s] as usize;
            if len > 0 {
                symbols[fill[len] as usize] = s as u8;
                fill[len] += 1;
            }
        }

        for out in block.iter_mut() {
            let mut code = 0u32;
            let mut len = 0usize;
            loop {
                code = (code << 1) | u32::from(br.read_bit()?);
                len += 1;
                if len > MAX_CODE_LEN as usize {
                    return Err(Error::corruption("Huffman code too long"));
                }
                let rel = code.wrapping_sub(first[len]);
                if count[len] != 0 && rel < count[len] {
                    *out = symbols[(offset[len] + rel) as usize];
                    break;
                }
            }
        }
        Ok(block.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8]) {
        let mut bw = BitWriter::new();
        HuffmanEncoder::new().encode(data, &mut bw).unwrap();
        let buf = bw.close();
        let mut out = vec![0u8; data.len()];
        let mut br = BitReader::new(&buf);
        HuffmanDecoder::new().decode(&mut out, &mut br).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn roundtrip_text() {
        roundtrip(b"the quick brown fox jumps over the lazy dog");
    }

    #[test]
    fn roundtrip_single_symbol() {
        roundtrip(&[7u8; 1000]);
    }

    #[test]
    fn roundtrip_all_bytes() {
        let data: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        roundtrip(&data);
    }

    #[test]
    fn skewed_distribution_stays_within_limit() {
        // Fibonacci-like frequencies force deep optimal trees; the halving
        // pass must cap every code at MAX_CODE_LEN.
        let mut data = Vec::new();
        let mut f = 1usize;
        let mut g = 1usize;
        for s in 0..40u8 {
            data.extend(std::iter::repeat(s).take(f));
            let h = f + g;
            g = f;
            f = h.min(1 << 20);
        }
        roundtrip(&data);
    }
}
