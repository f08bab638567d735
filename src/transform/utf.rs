//! UTF-8 alias codec.
//!
//! Every codepoint in the block is packed into a 22-bit symbol whose top
//! bits encode the sequence length (1 byte = `000`, 2 = `001`, 3 = `010`,
//! 4 = `1` + 21 codepoint bits). Symbols are ranked by frequency: the 128
//! most frequent get a one-byte alias `0xxxxxxx`, the rest a two-byte alias
//! `1xxxxxxx xxxxxxxx` carrying a 15-bit table index.
//!
//! Block layout: flags byte (`start << 2 | adjust`), 16-bit table length,
//! table entries (3 bytes each), `start` verbatim head bytes (BOM), the
//! alias stream, then `adjust` verbatim tail bytes (a sequence cut by the
//! block boundary).

use crate::error::{Error, Result};
use crate::types::{Context, DataType};

use super::ByteTransform;

const MAX_TABLE_LEN: usize = 32768;
const MIN_BLOCK_LEN: usize = 1024;
const BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Decoded sequence: packed 22-bit symbol plus its byte length.
#[inline]
fn pack_symbol(cp: u32, len: usize) -> u32 {
    match len {
        1 => cp,                    // 000 + 7 bits
        2 => (0b001 << 19) | cp,    // 11 bits
        3 => (0b010 << 19) | cp,    // 16 bits
        _ => (1 << 21) | cp,        // 1 + 21 bits
    }
}

#[inline]
fn symbol_len(sym: u32) -> usize {
    if sym & (1 << 21) != 0 {
        4
    } else {
        match sym >> 19 {
            0 => 1,
            1 => 2,
            _ => 3,
        }
    }
}

#[inline]
fn symbol_codepoint(sym: u32) -> u32 {
    if sym & (1 << 21) != 0 {
        sym & 0x1F_FFFF
    } else {
        sym & 0x7_FFFF
    }
}

/// Strict decode of one UTF-8 sequence. Rejects overlongs, surrogates and
/// codepoints past 0x10FFFF.
fn decode_sequence(src: &[u8], i: usize) -> Option<(u32, usize)> {
    let b0 = *src.get(i)?;
    if b0 < 0x80 {
        return Some((u32::from(b0), 1));
    }
    let (len, init, min) = match b0 {
        0xC2..=0xDF => (2, u32::from(b0 & 0x1F), 0x80),
        0xE0..=0xEF => (3, u32::from(b0 & 0x0F), 0x800),
        0xF0..=0xF4 => (4, u32::from(b0 & 0x07), 0x10000),
        _ => return None,
    };
    let mut cp = init;
    for k in 1..len {
        let b = *src.get(i + k)?;
        if b & 0xC0 != 0x80 {
            return None;
        }
        cp = (cp << 6) | u32::from(b & 0x3F);
    }
    if cp < min || cp > 0x10FFFF || (0xD800..=0xDFFF).contains(&cp) {
        return None;
    }
    Some((cp, len))
}

/// Re-emit the UTF-8 bytes for a (codepoint, length) pair. Returns `None`
/// when the pair is inconsistent (decoder-side corruption check).
fn encode_sequence(cp: u32, len: usize, out: &mut [u8]) -> Option<usize> {
    let mut tmp = [0u8; 4];
    let c = char::from_u32(cp)?;
    let s = c.encode_utf8(&mut tmp);
    if s.len() != len || out.len() < len {
        return None;
    }
    out[..len].copy_from_slice(&s.as_bytes()[..len]);
    Some(len)
}

pub struct UtfCodec;

impl UtfCodec {
    pub fn new() -> UtfCodec {
        UtfCodec
    }
}

impl Default for UtfCodec {
    fn default() -> Self {
        UtfCodec::new()
    }
}

impl ByteTransform for UtfCodec {
    fn forward(&mut self, ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let n = src.len();
        if n < MIN_BLOCK_LEN {
            return Err(Error::Skip("block too small"));
        }
        if !matches!(ctx.data_type, DataType::Undefined | DataType::Utf8 | DataType::Text) {
            return Err(Error::Skip("data type not utf-8"));
        }

        let start = if src.starts_with(&BOM) { 3 } else { 0 };
        // A block boundary can cut a codepoint anywhere: locate the last
        // sequence start and preserve a trailing incomplete sequence verbatim.
        let mut p = n;
        for _ in 0..4 {
            if p == start {
                break;
            }
            p -= 1;
            if src[p] < 0x80 || src[p] >= 0xC0 {
                break;
            }
        }
        let adjust = match decode_sequence(src, p) {
            Some((_, len)) if p + len == n => 0,
            _ => n - p,
        };
        if adjust > 3 {
            return Err(Error::Skip("invalid trailing sequence"));
        }

        // First pass: collect symbols, refuse on any invalid sequence.
        let body = &src[start..n - adjust];
        let mut symbols: Vec<u32> = Vec::with_capacity(body.len() / 2);
        let mut i = 0usize;
        while i < body.len() {
            let (cp, len) = decode_sequence(body, i)
                .ok_or(Error::Skip("invalid utf-8 sequence"))?;
            symbols.push(pack_symbol(cp, len));
            i += len;
        }

        // Frequency-ranked table.
        let mut freq_map = std::collections::HashMap::with_capacity(1024);
        for &s in &symbols {
            *freq_map.entry(s).or_insert(0u32) += 1;
        }
        if freq_map.len() > MAX_TABLE_LEN {
            return Err(Error::Skip("utf-8 alphabet too large"));
        }
        let mut ranked: Vec<(u32, u32)> = freq_map.iter().map(|(&s, &f)| (f, s)).collect();
        ranked.sort_unstable_by(|a, b| b.cmp(a));
        let mut index_of = std::collections::HashMap::with_capacity(ranked.len());
        for (idx, &(_, s)) in ranked.iter().enumerate() {
            index_of.insert(s, idx);
        }

        // Estimated output must clear the 10% margin before the second pass.
        let one_byte: u64 = ranked.iter().take(128).map(|&(f, _)| u64::from(f)).sum();
        let total = symbols.len() as u64;
        let estimate =
            6 + 3 * ranked.len() as u64 + one_byte + 2 * (total - one_byte) + (start + adjust) as u64;
        if estimate >= (n - n / 10) as u64 {
            return Err(Error::Skip("alias table overhead too high"));
        }

        dst[0] = ((start as u8) << 2) | adjust as u8;
        dst[1] = (ranked.len() >> 8) as u8;
        dst[2] = (ranked.len() & 0xFF) as u8;
        let mut j = 3;
        for &(_, s) in &ranked {
            dst[j] = (s >> 16) as u8;
            dst[j + 1] = (s >> 8) as u8;
            dst[j + 2] = s as u8;
            j += 3;
        }
        dst[j..j + start].copy_from_slice(&src[..start]);
        j += start;

        for &s in &symbols {
            let idx = index_of[&s];
            if idx < 128 {
                if j >= dst.len() {
                    return Err(Error::Skip("alias output expanded"));
                }
                dst[j] = idx as u8;
                j += 1;
            } else {
                if j + 2 > dst.len() {
                    return Err(Error::Skip("alias output expanded"));
                }
                dst[j] = 0x80 | (idx >> 8) as u8;
                dst[j + 1] = (idx & 0xFF) as u8;
                j += 2;
            }
        }
        dst[j..j + adjust].copy_from_slice(&src[n - adjust..]);
        j += adjust;
        ctx.data_type = DataType::Utf8;
        Ok((n, j))
    }

    fn inverse(&mut self, _ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        if src.len() < 3 {
            return Err(Error::corruption("truncated utf-8 alias header"));
        }
        let start = (src[0] >> 2) as usize;
        let adjust = (src[0] & 3) as usize;
        if src[0] >> 4 != 0 {
            return Err(Error::corruption("invalid utf-8 alias flags"));
        }
        let table_len = ((src[1] as usize) << 8) | src[2] as usize;
        if table_len == 0 || table_len > MAX_TABLE_LEN {
            return Err(Error::corruption("invalid utf-8 alias table length"));
        }
        let mut i = 3 + 3 * table_len;
        if i + start + adjust > src.len() {
            return Err(Error::corruption("truncated utf-8 alias table"));
        }
        let table: Vec<u32> = (0..table_len)
            .map(|k| {
                let o = 3 + 3 * k;
                (u32::from(src[o]) << 16) | (u32::from(src[o + 1]) << 8) | u32::from(src[o + 2])
            })
            .collect();

        let mut j = 0usize;
        if start > 0 {
            if start > dst.len() {
                return Err(Error::corruption("output exceeds block size"));
            }
            dst[..start].copy_from_slice(&src[i..i + start]);
            i += start;
            j = start;
        }

        let alias_end = src.len() - adjust;
        while i < alias_end {
            let b = src[i];
            let idx = if b < 0x80 {
                i += 1;
                b as usize
            } else {
                if i + 2 > alias_end {
                    return Err(Error::corruption("truncated two-byte alias"));
                }
                let idx = (((b & 0x7F) as usize) << 8) | src[i + 1] as usize;
                i += 2;
                idx
            };
            if idx >= table_len {
                return Err(Error::corruption("alias index out of range"));
            }
            let sym = table[idx];
            let len = symbol_len(sym);
            let cp = symbol_codepoint(sym);
            if j + len > dst.len() {
                return Err(Error::corruption("output exceeds block size"));
            }
            encode_sequence(cp, len, &mut dst[j..])
                .ok_or_else(|| Error::corruption("invalid symbol in alias table"))?;
            j += len;
        }
        if adjust > 0 {
            if j + adjust > dst.len() {
                return Err(Error::corruption("output exceeds block size"));
            }
            dst[j..j + adjust].copy_from_slice(&src[alias_end..]);
            j += adjust;
        }
        Ok((src.len(), j))
    }

    fn max_encoded_len(&self, src_len: usize) -> usize {
        src_len + 3 * MAX_TABLE_LEN + 16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8]) -> Vec<u8> {
        let codec = UtfCodec::new();
        let mut ctx = Context::default();
        let mut enc = vec![0u8; codec.max_encoded_len(data.len())];
        let (_, written) = UtfCodec::new().forward(&mut ctx, data, &mut enc).unwrap();
        enc.truncate(written);
        let mut out = vec![0u8; data.len()];
        let (_, n) = UtfCodec::new().inverse(&mut ctx, &enc, &mut out).unwrap();
        assert_eq!(n, data.len());
        assert_eq!(out, data);
        enc
    }

    fn stress_text() -> Vec<u8> {
        let source = "Grüße aus München — καλημέρα κόσμε — 你好世界 🚀 naïve façade ";
        source.bytes().cycle().take(20_000).collect()
    }

    #[test]
    fn multibyte_text_roundtrips_smaller() {
        let data = stress_text();
        let enc = roundtrip(&data);
        assert!(enc.len() < data.len());
    }

    #[test]
    fn bom_is_preserved() {
        let mut data = vec![0xEF, 0xBB, 0xBF];
        data.extend_from_slice(&stress_text());
        roundtrip(&data);
    }

    #[test]
    fn split_trailing_sequence_is_preserved() {
        let mut data = stress_text();
        // End mid-sequence: push a lead byte with one continuation missing.
        data.push(0xE4);
        data.push(0xBD);
        roundtrip(&data);
    }

    #[test]
    fn invalid_utf8_is_skipped() {
        let mut data = stress_text();
        data[500] = 0xC0; // overlong lead byte is never valid
        let codec = UtfCodec::new();
        let mut ctx = Context::default();
        let mut enc = vec![0u8; codec.max_encoded_len(data.len())];
        let err = UtfCodec::new().forward(&mut ctx, &data, &mut enc).unwrap_err();
        assert!(err.is_skip());
    }

    #[test]
    fn corrupt_alias_index_is_rejected() {
        let data = stress_text();
        let codec = UtfCodec::new();
        let mut ctx = Context::default();
        let mut enc = vec![0u8; codec.max_encoded_len(data.len())];
        let (_, written) = UtfCodec::new().forward(&mut ctx, &data, &mut enc).unwrap();
        enc.truncate(written);
        // Point a two-byte alias beyond the table.
        let tail = enc.len() - 4;
        enc[tail] = 0xFF;
        enc[tail + 1] = 0xFF;
        let mut out = vec![0u8; data.len()];
        assert!(UtfCodec::new().inverse(&mut ctx, &enc, &mut out).is_err());
    }
}
