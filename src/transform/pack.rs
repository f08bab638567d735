//! Alias packing: maps frequent two-byte pairs onto unused byte values, with
//! dense fallbacks for tiny alphabets.
//!
//! Modes (first header byte):
//! - 0: pair aliasing. Requires at least 16 unused byte values; the most
//!   frequent pairs get one-byte aliases. Header: alias count, then
//!   `(alias, b1, b2)` triplets.
//! - 1: nibble packing for alphabets of at most 16 symbols (two per byte).
//! - 2: crumb packing for alphabets of at most 4 symbols (four per byte).
//! - 3: single-symbol block, header only.
//!
//! Modes 1–3 carry the original length as a varint so padding in the last
//! packed byte is unambiguous.

use crate::error::{Error, Result};
use crate::types::Context;

use super::ByteTransform;

const MODE_PAIRS: u8 = 0;
const MODE_NIBBLE: u8 = 1;
const MODE_CRUMB: u8 = 2;
const MODE_SINGLE: u8 = 3;

const MIN_BLOCK_LEN: usize = 64;
/// Pair aliasing needs this many unused byte values to be worth a header.
const MIN_UNUSED: usize = 16;
/// A pair must occur this often to earn an alias slot.
const MIN_PAIR_COUNT: u32 = 8;

fn write_varint(dst: &mut [u8], mut j: usize, mut v: usize) -> Option<usize> {
    loop {
        if j >= dst.len() {
            return None;
        }
        if v >= 0x80 {
            dst[j] = (v & 0x7F) as u8 | 0x80;
            v >>= 7;
            j += 1;
        } else {
            dst[j] = v as u8;
            return Some(j + 1);
        }
    }
}

fn read_varint(src: &[u8], mut i: usize) -> Result<(usize, usize)> {
    let mut v = 0usize;
    let mut shift = 0u32;
    loop {
        let b = *src
            .get(i)
            .ok_or_else(|| Error::corruption("truncated varint"))?;
        i += 1;
        if shift > 35 {
            return Err(Error::corruption("varint overflow"));
        }
        v |= ((b & 0x7F) as usize) << shift;
        if b & 0x80 == 0 {
            return Ok((v, i));
        }
        shift += 7;
    }
}

pub struct Pack;

impl Pack {
    pub fn new() -> Pack {
        Pack
    }
}

impl Default for Pack {
    fn default() -> Self {
        Pack::new()
    }
}

impl ByteTransform for Pack {
    fn forward(&mut self, _ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let n = src.len();
        if n < MIN_BLOCK_LEN {
            return Err(Error::Skip("block too small"));
        }
        let mut freqs = [0u32; 256];
        crate::global::compute_histogram(src, &mut freqs);
        let present: Vec<u8> = (0..=255u8).filter(|&s| freqs[s as usize] > 0).collect();

        match present.len() {
            1 => {
                // Header only: symbol + length.
                dst[0] = MODE_SINGLE;
                dst[1] = present[0];
                let j = write_varint(dst, 2, n)
                    .ok_or(Error::Skip("header expanded output"))?;
                Ok((n, j))
            }
            2..=4 => pack_dense(src, dst, &present, MODE_CRUMB, 4, 2),
            5..=16 => pack_dense(src, dst, &present, MODE_NIBBLE, 2, 4),
            _ => pack_pairs(src, dst, &freqs),
        }
    }

    fn inverse(&mut self, _ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let mode = *src
            .first()
            .ok_or_else(|| Error::corruption("empty alias block"))?;
        match mode {
            MODE_SINGLE => {
                if src.len() < 2 {
                    return Err(Error::corruption("truncated alias header"));
                }
                let sym = src[1];
                let (n, i) = read_varint(src, 2)?;
                if n > dst.len() {
                    return Err(Error::corruption("decoded size exceeds block size"));
                }
                dst[..n].fill(sym);
                Ok((i, n))
            }
            MODE_CRUMB => unpack_dense(src, dst, 4, 2),
            MODE_NIBBLE => unpack_dense(src, dst, 2, 4),
            MODE_PAIRS => unpack_pairs(src, dst),
            _ => Err(Error::corruption("invalid alias mode")),
        }
    }

    fn max_encoded_len(&self, src_len: usize) -> usize {
        src_len + 256 * 3 + 16
    }
}

/// Pack `per_byte` symbols into each output byte at `bits` bits each.
fn pack_dense(
    src: &[u8],
    dst: &mut [u8],
    present: &[u8],
    mode: u8,
    per_byte: usize,
    bits: u32,
) -> Result<(usize, usize)> {
    let n = src.len();
    let mut code = [0u8; 256];
    dst[0] = mode;
    dst[1] = present.len() as u8;
    let mut j = 2;
    for (c, &s) in present.iter().enumerate() {
        code[s as usize] = c as u8;
        dst[j] = s;
        j += 1;
    }
    j = write_varint(dst, j, n).ok_or(Error::Skip("header expanded output"))?;

    let packed = n.div_ceil(per_byte);
    if j + packed > dst.len() {
        return Err(Error::Skip("packed output too large"));
    }
    for (k, chunk) in src.chunks(per_byte).enumerate() {
        let mut b = 0u8;
        for (idx, &s) in chunk.iter().enumerate() {
            b |= code[s as usize] << (bits * (per_byte - 1 - idx) as u32);
        }
        dst[j + k] = b;
    }
    Ok((n, j + packed))
}

fn unpack_dense(src: &[u8], dst: &mut [u8], per_byte: usize, bits: u32) -> Result<(usize, usize)> {
    if src.len() < 2 {
        return Err(Error::corruption("truncated alias header"));
    }
    let count = src[1] as usize;
    let max_count = 1usize << bits;
    if count == 0 || count > max_count || 2 + count > src.len() {
        return Err(Error::corruption("invalid alias symbol table"));
    }
    let symbols = &src[2..2 + count];
    let (n, mut i) = read_varint(src, 2 + count)?;
    if n > dst.len() {
        return Err(Error::corruption("decoded size exceeds block size"));
    }
    if src.len() - i != n.div_ceil(per_byte) {
        return Err(Error::corruption("packed payload size mismatch"));
    }
    let mask = (max_count - 1) as u8;
    for j in 0..n {
        let b = src[i + j / per_byte];
        let shift = bits * (per_byte - 1 - (j % per_byte)) as u32;
        let c = ((b >> shift) & mask) as usize;
        if c >= count {
            return Err(Error::corruption("alias code out of range"));
        }
        dst[j] = symbols[c];
    }
    i += n.div_ceil(per_byte);
    Ok((i, n))
}

fn pack_pairs(src: &[u8], dst: &mut [u8], freqs: &[u32; 256]) -> Result<(usize, usize)> {
    let n = src.len();
    let unused: Vec<u8> = (0..=255u8).filter(|&s| freqs[s as usize] == 0).collect();
    if unused.len() < MIN_UNUSED {
        return Err(Error::Skip("not enough unused byte values"));
    }

    // Histogram of adjacent pairs (overlapping; good enough to rank).
    let mut pair_freqs = vec![0u32; 65536];
    for w in src.windows(2) {
        pair_freqs[((w[0] as usize) << 8) | w[1] as usize] += 1;
    }
    let mut ranked: Vec<(u32, u16)> = pair_freqs
        .iter()
        .enumerate()
        .filter(|&(_, &f)| f >= MIN_PAIR_COUNT)
        .map(|(p, &f)| (f, p as u16))
        .collect();
    ranked.sort_unstable_by(|a, b| b.cmp(a));
    let alias_count = ranked.len().min(unused.len());
    if alias_count == 0 {
        return Err(Error::Skip("no frequent pairs"));
    }

    let mut alias_of = vec![u16::MAX; 65536];
    dst[0] = MODE_PAIRS;
    dst[1] = alias_count as u8;
    let mut j = 2;
    for (k, &(_, pair)) in ranked[..alias_count].iter().enumerate() {
        let a = unused[k];
        alias_of[pair as usize] = u16::from(a);
        dst[j] = a;
        dst[j + 1] = (pair >> 8) as u8;
        dst[j + 2] = (pair & 0xFF) as u8;
        j += 3;
    }

    let mut i = 0usize;
    while i < n {
        if j >= dst.len() {
            return Err(Error::Skip("alias output expanded"));
        }
        if i + 1 < n {
            let pair = ((src[i] as usize) << 8) | src[i + 1] as usize;
            let a = alias_of[pair];
            if a != u16::MAX {
                dst[j] = a as u8;
                i += 2;
                j += 1;
                continue;
            }
        }
        dst[j] = src[i];
        i += 1;
        j += 1;
    }
    if j >= n {
        return Err(Error::Skip("aliasing gained nothing"));
    }
    Ok((n, j))
}

fn unpack_pairs(src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
    if src.len() < 2 {
        return Err(Error::corruption("truncated alias header"));
    }
    let count = src[1] as usize;
    if count == 0 || 2 + 3 * count > src.len() {
        return Err(Error::corruption("invalid alias table"));
    }
    let mut pair_of = [u16::MAX; 256];
    let mut i = 2;
    for _ in 0..count {
        let a = src[i] as usize;
        if pair_of[a] != u16::MAX {
            return Err(Error::corruption("duplicate alias"));
        }
        pair_of[a] = ((src[i + 1] as u16) << 8) | src[i + 2] as u16;
        i += 3;
    }
    let mut j = 0usize;
    while i < src.len() {
        let b = src[i] as usize;
        i += 1;
        let p = pair_of[b];
        if p != u16::MAX {
            if j + 2 > dst.len() {
                return Err(Error::corruption("output exceeds block size"));
            }
            dst[j] = (p >> 8) as u8;
            dst[j + 1] = (p & 0xFF) as u8;
            j += 2;
        } else {
            if j >= dst.len() {
                return Err(Error::corruption("output exceeds block size"));
            }
            dst[j] = b as u8;
            j += 1;
        }
    }
    Ok((i, j))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8]) -> Vec<u8> {
        let pack = Pack::new();
        let mut ctx = Context::default();
        let mut enc = vec![0u8; pack.max_encoded_len(data.len())];
        let (_, written) = Pack::new().forward(&mut ctx, data, &mut enc).unwrap();
        enc.truncate(written);
        let mut out = vec![0u8; data.len()];
        let (_, n) = Pack::new().inverse(&mut ctx, &enc, &mut out).unwrap();
        assert_eq!(n, data.len());
        assert_eq!(out, data);
        enc
    }

    #[test]
    fn single_symbol_is_header_only() {
        let enc = roundtrip(&[b'A'; 10_000]);
        assert!(enc.len() <= 5);
    }

    #[test]
    fn four_symbol_alphabet_packs_to_quarter() {
        let data: Vec<u8> = (0..8000u32).map(|i| b"ACGT"[(i % 4) as usize]).collect();
        let enc = roundtrip(&data);
        assert!(enc.len() < data.len() / 3);
    }

    #[test]
    fn sixteen_symbol_alphabet_packs_to_half() {
        let data: Vec<u8> = (0..9001u32).map(|i| b"0123456789abcdef"[(i % 13) as usize]).collect();
        let enc = roundtrip(&data);
        assert!(enc.len() < data.len() * 2 / 3);
    }

    #[test]
    fn ascii_text_uses_pair_aliases() {
        let data: Vec<u8> = b"the quick brown fox jumps over the lazy dog. "
            .iter()
            .cycle()
            .take(4000)
            .copied()
            .collect();
        let enc = roundtrip(&data);
        assert_eq!(enc[0], MODE_PAIRS);
        assert!(enc.len() < data.len());
    }

    #[test]
    fn full_alphabet_is_skipped() {
        let data: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let pack = Pack::new();
        let mut ctx = Context::default();
        let mut enc = vec![0u8; pack.max_encoded_len(data.len())];
        let err = Pack::new().forward(&mut ctx, &data, &mut enc).unwrap_err();
        assert!(err.is_skip());
    }
}
