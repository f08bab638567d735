//! LZ77 family: the tri-buffer LZ codec (plain and extra flavors) and the
//! predictive LZP codec.
//!
//! The tri-buffer codec separates its output into four regions (literals,
//! tokens, distance bytes, length varints) whose boundaries are written as
//! three big-endian offsets in the first 12 bytes, followed by a mode byte.
//! Grouping same-kind bytes keeps each region self-similar, which the
//! entropy stage rewards.
//!
//! Token layout `LLLFFFMM`:
//! - `LLL`: literal length, 7 = read a varint remainder.
//! - `FFF`: `000` reuse the most recent distance, `001` the second most
//!   recent, `01x` 1-byte distance, `10x` 2-byte, `11x` 3-byte. For the
//!   explicit forms the low `x` bit joins `MM` to form a 3-bit length field.
//! - `MM`: match length remainder (field maximum = read a varint).
//!
//! Length varints: one byte below 254; `254` = two big-endian bytes + 254;
//! `255` = three bytes + 255.
//!
//! LZP predicts the next occurrence of a 32-bit context; a match is an
//! `0xFC` escape plus a length varint, a literal `0xFC` is `0xFC 0xFF`.

use crate::error::{Error, Result};
use crate::types::{Context, DataType};

use super::ByteTransform;

// ── Shared pieces ────────────────────────────────────────────────────────────

const HASH_SEED: u64 = 0x9E37_79B9_7F4A_7C15;
const MAX_DISTANCE: usize = (1 << 24) - 1;

/// Little-endian 8-byte window hash.
#[inline]
fn hash8(src: &[u8], i: usize, shift: u32) -> usize {
    let w = u64::from_le_bytes(src[i..i + 8].try_into().unwrap());
    (w.wrapping_mul(HASH_SEED) >> shift) as usize
}

/// Length of the common prefix of `src[a..]` and `src[b..]` (a < b), capped
/// so the match never runs past `limit`. Compares 4 bytes at a time and
/// finishes with the XOR trailing-zero trick.
pub(crate) fn match_length(src: &[u8], a: usize, b: usize, limit: usize) -> usize {
    let mut len = 0usize;
    let max = limit - b;
    while len + 4 <= max {
        let x = u32::from_le_bytes(src[a + len..a + len + 4].try_into().unwrap())
            ^ u32::from_le_bytes(src[b + len..b + len + 4].try_into().unwrap());
        if x != 0 {
            return len + (x.trailing_zeros() >> 3) as usize;
        }
        len += 4;
    }
    while len < max && src[a + len] == src[b + len] {
        len += 1;
    }
    len
}

/// Length varint: `< 254` one byte; `254` + 2 BE bytes; `255` + 3 BE bytes.
pub fn emit_len(out: &mut Vec<u8>, v: usize) {
    if v < 254 {
        out.push(v as u8);
    } else if v < 254 + 65536 {
        let r = v - 254;
        out.push(254);
        out.push((r >> 8) as u8);
        out.push(r as u8);
    } else {
        let r = v - 255;
        out.push(255);
        out.push((r >> 16) as u8);
        out.push((r >> 8) as u8);
        out.push(r as u8);
    }
}

pub fn read_len(src: &[u8], i: &mut usize) -> Result<usize> {
    let err = || Error::corruption("truncated length varint");
    let b = *src.get(*i).ok_or_else(err)?;
    *i += 1;
    match b {
        254 => {
            if *i + 2 > src.len() {
                return Err(err());
            }
            let v = ((src[*i] as usize) << 8) | src[*i + 1] as usize;
            *i += 2;
            Ok(254 + v)
        }
        255 => {
            if *i + 3 > src.len() {
                return Err(err());
            }
            let v = ((src[*i] as usize) << 16) | ((src[*i + 1] as usize) << 8)
                | src[*i + 2] as usize;
            *i += 3;
            Ok(255 + v)
        }
        _ => Ok(b as usize),
    }
}

// ── Tri-buffer LZ codec ──────────────────────────────────────────────────────

const MIN_BLOCK_LEN: usize = 64;
/// Longest encodable match; longer runs are split.
const MAX_MATCH: usize = 65535 + 254 + 4;

const FLAVOR_REP0: u8 = 0;
const FLAVOR_REP1: u8 = 1;

const MODE_LAST_LITERAL_ONLY: u8 = 1;

fn min_match_code(m: usize) -> u8 {
    match m {
        6 => 1,
        9 => 2,
        _ => 0,
    }
}

fn min_match_from_code(c: u8) -> Result<usize> {
    match c {
        0 => Ok(4),
        1 => Ok(6),
        2 => Ok(9),
        _ => Err(Error::corruption("invalid min-match code")),
    }
}

pub struct LzCodec {
    /// Extra mode: one more lazy-match probe and a longer minimum match.
    extra: bool,
}

impl LzCodec {
    pub fn new(extra: bool) -> LzCodec {
        LzCodec { extra }
    }

    fn min_match(&self, data_type: DataType) -> usize {
        if data_type == DataType::Dna {
            6
        } else if self.extra {
            9
        } else {
            4
        }
    }
}

struct SeqWriter {
    tokens: Vec<u8>,
    lits: Vec<u8>,
    minfo: Vec<u8>,
    mlens: Vec<u8>,
}

impl SeqWriter {
    fn emit(
        &mut self,
        literals: &[u8],
        flavor: u8,
        dist: usize,
        mlen_excess: usize, // match length minus min_match
    ) {
        let lit_len = literals.len();
        // Varint order in the shared buffer: literal remainder first, then
        // the match remainder; the decoder consumes them the same way.
        let lll = if lit_len >= 7 {
            emit_len(&mut self.mlens, lit_len - 7);
            7u8
        } else {
            lit_len as u8
        };
        self.lits.extend_from_slice(literals);

        let (fff, mfield_bits) = match flavor {
            FLAVOR_REP0 => (0b000u8, 2u32),
            FLAVOR_REP1 => (0b001u8, 2u32),
            _ => {
                // Explicit distance: 1, 2 or 3 bytes; low flavor bit joins MM.
                let (code, nbytes) = if dist < 256 {
                    (0b010u8, 1usize)
                } else if dist < 65536 {
                    (0b100u8, 2usize)
                } else {
                    (0b110u8, 3usize)
                };
                for k in (0..nbytes).rev() {
                    self.minfo.push((dist >> (8 * k)) as u8);
                }
                (code, 3u32)
            }
        };
        let cap = (1usize << mfield_bits) - 1;
        let field = if mlen_excess >= cap {
            emit_len(&mut self.mlens, mlen_excess - cap);
            cap
        } else {
            mlen_excess
        };
        let token = if mfield_bits == 2 {
            (lll << 5) | (fff << 2) | field as u8
        } else {
            (lll << 5) | ((fff | (field >> 2) as u8) << 2) | (field & 3) as u8
        };
        self.tokens.push(token);
    }
}

impl ByteTransform for LzCodec {
    fn forward(&mut self, ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let n = src.len();
        if n < MIN_BLOCK_LEN {
            return Err(Error::Skip("block too small"));
        }
        if ctx.data_type == DataType::SmallAlphabet {
            return Err(Error::Skip("small-alphabet block"));
        }
        let min_match = self.min_match(ctx.data_type);

        let hash_log = (crate::global::log2(n as u64) + 3).clamp(13, 21);
        let shift = 64 - hash_log;
        let mut table = vec![0u32; 1usize << hash_log];

        let mut w = SeqWriter {
            tokens: Vec::with_capacity(n / 8),
            lits: Vec::with_capacity(n / 2),
            minfo: Vec::with_capacity(n / 8),
            mlens: Vec::with_capacity(n / 16),
        };
        let mut rep0 = 1usize;
        let mut rep1 = 2usize;
        let mut anchor = 0usize;
        let mut i = 0usize;
        // Leave room for the final 8-byte window read.
        let end = n.saturating_sub(8 + 1);

        while i < end {
            // Best candidate across the probe positions (lazy matching).
            let probes: &[usize] = if self.extra { &[0, 1, 2] } else { &[0, 1] };
            let mut best: Option<(usize, usize, usize, u8)> = None; // (pos, len, dist, flavor)
            for &d in probes {
                let p = i + d;
                if p >= end {
                    break;
                }
                // Repeat distances first: they cost no distance bytes.
                for (rep, flavor) in [(rep0, FLAVOR_REP0), (rep1, FLAVOR_REP1)] {
                    if p >= rep {
                        let len = match_length(src, p - rep, p, n);
                        if len >= min_match
                            && best.map_or(true, |(_, bl, _, _)| len > bl)
                        {
                            best = Some((p, len.min(MAX_MATCH), rep, flavor));
                        }
                    }
                }
                let h = hash8(src, p, shift);
                let cand = table[h] as usize;
                table[h] = p as u32 + 1;
                if cand > 0 {
                    let c = cand - 1;
                    let dist = p - c;
                    if dist >= 1 && dist <= MAX_DISTANCE {
                        // Cheap 4-byte prefix gate before the full extension.
                        if src[c..c + 4] == src[p..p + 4] {
                            let len = match_length(src, c, p, n);
                            if len >= min_match
                                && best.map_or(true, |(_, bl, _, _)| len > bl + 1)
                            {
                                best = Some((p, len.min(MAX_MATCH), dist, 0xFF));
                            }
                        }
                    }
                }
            }

            let Some((mut pos, mut len, dist, flavor)) = best else {
                i += 1;
                continue;
            };
            // Extend backwards over pending literals.
            while pos > anchor && pos > dist && src[pos - 1] == src[pos - dist - 1] && len < MAX_MATCH
            {
                pos -= 1;
                len += 1;
            }

            let flavor = if flavor != 0xFF {
                flavor
            } else if dist == rep0 {
                FLAVOR_REP0
            } else if dist == rep1 {
                FLAVOR_REP1
            } else {
                0xFF
            };
            w.emit(&src[anchor..pos], flavor, dist, len - min_match);
            match flavor {
                FLAVOR_REP0 => {}
                FLAVOR_REP1 => std::mem::swap(&mut rep0, &mut rep1),
                _ => {
                    rep1 = rep0;
                    rep0 = dist;
                }
            }

            // Seed the table across the matched region.
            let fill_end = (pos + len).min(end);
            let step = if len < 128 { 1 } else { 4 };
            let mut f = pos.max(i) + 1;
            while f < fill_end {
                table[hash8(src, f, shift)] = f as u32 + 1;
                f += step;
            }
            i = pos + len;
            anchor = i;
        }

        let mut mode = min_match_code(min_match) << 2;
        if anchor < n {
            w.emit(&src[anchor..n], FLAVOR_REP0, rep0, 0);
            mode |= MODE_LAST_LITERAL_ONLY;
        }
        if w.tokens.is_empty() {
            return Err(Error::Skip("no matches found"));
        }

        let t0 = 13 + w.lits.len();
        let m0 = t0 + w.tokens.len();
        let l0 = m0 + w.minfo.len();
        let total = l0 + w.mlens.len();
        if total >= n || total > dst.len() {
            return Err(Error::Skip("lz output expanded"));
        }
        dst[0..4].copy_from_slice(&(t0 as u32).to_be_bytes());
        dst[4..8].copy_from_slice(&(m0 as u32).to_be_bytes());
        dst[8..12].copy_from_slice(&(l0 as u32).to_be_bytes());
        dst[12] = mode;
        dst[13..t0].copy_from_slice(&w.lits);
        dst[t0..m0].copy_from_slice(&w.tokens);
        dst[m0..l0].copy_from_slice(&w.minfo);
        dst[l0..total].copy_from_slice(&w.mlens);
        Ok((n, total))
    }

    fn inverse(&mut self, _ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        if src.len() < 13 {
            return Err(Error::corruption("truncated lz header"));
        }
        let t0 = u32::from_be_bytes(src[0..4].try_into().unwrap()) as usize;
        let m0 = u32::from_be_bytes(src[4..8].try_into().unwrap()) as usize;
        let l0 = u32::from_be_bytes(src[8..12].try_into().unwrap()) as usize;
        if t0 < 13 || t0 > m0 || m0 > l0 || l0 > src.len() {
            return Err(Error::corruption("invalid lz buffer offsets"));
        }
        let mode = src[12];
        let last_literal_only = mode & MODE_LAST_LITERAL_ONLY != 0;
        let min_match = min_match_from_code((mode >> 2) & 3)?;

        let lits = &src[13..t0];
        let tokens = &src[t0..m0];
        let minfo = &src[m0..l0];
        let mlens = &src[l0..];

        let mut li = 0usize; // literal cursor
        let mut di = 0usize; // distance cursor
        let mut vi = 0usize; // varint cursor
        let mut j = 0usize;
        let mut rep0 = 1usize;
        let mut rep1 = 2usize;

        for (t, &token) in tokens.iter().enumerate() {
            let lll = token >> 5;
            let lit_len = if lll == 7 {
                7 + read_len(mlens, &mut vi)?
            } else {
                lll as usize
            };
            if li + lit_len > lits.len() || j + lit_len > dst.len() {
                return Err(Error::corruption("lz literal overrun"));
            }
            dst[j..j + lit_len].copy_from_slice(&lits[li..li + lit_len]);
            li += lit_len;
            j += lit_len;

            if last_literal_only && t == tokens.len() - 1 {
                break;
            }

            let fff = (token >> 2) & 7;
            let (dist, mfield) = match fff {
                0b000 => {
                    let f = (token & 3) as usize;
                    (rep0, if f == 3 { 3 + read_len(mlens, &mut vi)? } else { f })
                }
                0b001 => {
                    std::mem::swap(&mut rep0, &mut rep1);
                    let f = (token & 3) as usize;
                    (rep0, if f == 3 { 3 + read_len(mlens, &mut vi)? } else { f })
                }
                _ => {
                    let nbytes = (fff >> 1) as usize; // 01x→1, 10x→2, 11x→3
                    if di + nbytes > minfo.len() {
                        return Err(Error::corruption("lz distance overrun"));
                    }
                    let mut dist = 0usize;
                    for _ in 0..nbytes {
                        dist = (dist << 8) | minfo[di] as usize;
                        di += 1;
                    }
                    rep1 = rep0;
                    rep0 = dist;
                    let f = (((fff & 1) << 2) | (token & 3)) as usize;
                    (dist, if f == 7 { 7 + read_len(mlens, &mut vi)? } else { f })
                }
            };
            let mlen = mfield + min_match;
            if dist == 0 || dist > j {
                return Err(Error::corruption("lz distance out of range"));
            }
            if j + mlen > dst.len() {
                return Err(Error::corruption("lz match overrun"));
            }
            if dist >= mlen {
                dst.copy_within(j - dist..j - dist + mlen, j);
            } else {
                for k in 0..mlen {
                    dst[j + k] = dst[j - dist + k];
                }
            }
            j += mlen;
        }
        if li != lits.len() {
            return Err(Error::corruption("unconsumed lz literals"));
        }
        Ok((src.len(), j))
    }

    fn max_encoded_len(&self, src_len: usize) -> usize {
        src_len + src_len / 64 + 16
    }
}

// ── LZP ──────────────────────────────────────────────────────────────────────

const LZP_ESCAPE: u8 = 0xFC;
const LZP_HASH_LOG: u32 = 16;
const LZP_MIN_BLOCK: usize = 1024;
/// Longest match per escape; longer repeats emit several escapes.
const LZP_MAX_LEN_EXCESS: usize = 253 + 65535;

fn lzp_min_match(bs_version: u32) -> usize {
    if bs_version < 4 {
        96
    } else {
        64
    }
}

#[inline]
fn lzp_hash(ctx_word: u32) -> usize {
    ((ctx_word.wrapping_mul(0x9E37_79B9)) >> (32 - LZP_HASH_LOG)) as usize
}

pub struct LzpCodec;

impl LzpCodec {
    pub fn new() -> LzpCodec {
        LzpCodec
    }
}

impl Default for LzpCodec {
    fn default() -> Self {
        LzpCodec::new()
    }
}

impl ByteTransform for LzpCodec {
    fn forward(&mut self, ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let n = src.len();
        if n < LZP_MIN_BLOCK {
            return Err(Error::Skip("block too small"));
        }
        let min_match = lzp_min_match(ctx.bs_version);
        let mut table = vec![0u32; 1 << LZP_HASH_LOG];
        let budget = dst.len().min(n - 1);

        dst[..4].copy_from_slice(&src[..4]);
        let mut i = 4usize;
        let mut j = 4usize;
        while i < n {
            let ctx_word = u32::from_le_bytes(src[i - 4..i].try_into().unwrap());
            let h = lzp_hash(ctx_word);
            let pred = table[h] as usize;
            table[h] = i as u32;
            if pred > 0 && pred < i {
                let len = match_length(src, pred, i, n).min(min_match + LZP_MAX_LEN_EXCESS);
                if len >= min_match {
                    let mut tmp = Vec::with_capacity(4);
                    emit_len(&mut tmp, len - min_match);
                    if j + 1 + tmp.len() > budget {
                        return Err(Error::Skip("lzp output expanded"));
                    }
                    dst[j] = LZP_ESCAPE;
                    dst[j + 1..j + 1 + tmp.len()].copy_from_slice(&tmp);
                    j += 1 + tmp.len();
                    i += len;
                    continue;
                }
            }
            let b = src[i];
            if b == LZP_ESCAPE {
                if j + 2 > budget {
                    return Err(Error::Skip("lzp output expanded"));
                }
                dst[j] = LZP_ESCAPE;
                dst[j + 1] = 0xFF;
                j += 2;
            } else {
                if j >= budget {
                    return Err(Error::Skip("lzp output expanded"));
                }
                dst[j] = b;
                j += 1;
            }
            i += 1;
        }
        Ok((n, j))
    }

    fn inverse(&mut self, ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        if src.len() < 4 {
            return Err(Error::corruption("truncated lzp block"));
        }
        let min_match = lzp_min_match(ctx.bs_version);
        let mut table = vec![0u32; 1 << LZP_HASH_LOG];
        if dst.len() < 4 {
            return Err(Error::corruption("output exceeds block size"));
        }
        dst[..4].copy_from_slice(&src[..4]);
        let mut i = 4usize;
        let mut j = 4usize;
        while i < src.len() {
            let ctx_word = u32::from_le_bytes(dst[j - 4..j].try_into().unwrap());
            let h = lzp_hash(ctx_word);
            let pred = table[h] as usize;
            table[h] = j as u32;
            let b = src[i];
            if b == LZP_ESCAPE {
                let next = *src
                    .get(i + 1)
                    .ok_or_else(|| Error::corruption("truncated lzp escape"))?;
                if next == 0xFF {
                    if j >= dst.len() {
                        return Err(Error::corruption("output exceeds block size"));
                    }
                    dst[j] = LZP_ESCAPE;
                    i += 2;
                    j += 1;
                    continue;
                }
                i += 1;
                let len = min_match + read_len(src, &mut i)?;
                if pred == 0 || pred >= j {
                    return Err(Error::corruption("lzp match without context"));
                }
                if j + len > dst.len() {
                    return Err(Error::corruption("lzp match overrun"));
                }
                for k in 0..len {
                    dst[j + k] = dst[pred + k];
                }
                j += len;
            } else {
                if j >= dst.len() {
                    return Err(Error::corruption("output exceeds block size"));
                }
                dst[j] = b;
                i += 1;
                j += 1;
            }
        }
        Ok((i, j))
    }

    fn max_encoded_len(&self, src_len: usize) -> usize {
        src_len + src_len / 64 + 16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lz_roundtrip(extra: bool, data: &[u8]) -> Vec<u8> {
        let codec = LzCodec::new(extra);
        let mut ctx = Context::default();
        let mut enc = vec![0u8; codec.max_encoded_len(data.len()).max(data.len() + 64)];
        let (_, written) = LzCodec::new(extra).forward(&mut ctx, data, &mut enc).unwrap();
        enc.truncate(written);
        let mut out = vec![0u8; data.len()];
        let (_, m) = LzCodec::new(extra).inverse(&mut ctx, &enc, &mut out).unwrap();
        assert_eq!(m, data.len());
        assert_eq!(out, data);
        enc
    }

    fn repetitive_sample() -> Vec<u8> {
        b"a moderately repetitive sample, a moderately repetitive sample with drift, "
            .iter()
            .cycle()
            .take(20_000)
            .copied()
            .collect()
    }

    #[test]
    fn repetitive_data_compresses() {
        let data = repetitive_sample();
        let enc = lz_roundtrip(false, &data);
        assert!(enc.len() < data.len() / 3);
    }

    #[test]
    fn extra_mode_roundtrips() {
        lz_roundtrip(true, &repetitive_sample());
    }

    #[test]
    fn overlapping_matches_roundtrip() {
        // Runs force dist < len copies on decode.
        let mut data = vec![b'x'; 5000];
        data.extend_from_slice(b"tail content to break the run tail content");
        data.extend_from_slice(&vec![b'y'; 3000]);
        lz_roundtrip(false, &data);
    }

    #[test]
    fn incompressible_data_is_skipped() {
        let mut state = 0x5EEDu64;
        let data: Vec<u8> = (0..4096)
            .map(|_| {
                state = state.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
                (state >> 40) as u8
            })
            .collect();
        let codec = LzCodec::new(false);
        let mut ctx = Context::default();
        let mut enc = vec![0u8; codec.max_encoded_len(data.len()).max(data.len() + 64)];
        let err = LzCodec::new(false).forward(&mut ctx, &data, &mut enc).unwrap_err();
        assert!(err.is_skip());
    }

    #[test]
    fn small_alphabet_is_refused() {
        let data = vec![0u8; 4096];
        let mut ctx = Context::default();
        ctx.data_type = DataType::SmallAlphabet;
        let codec = LzCodec::new(false);
        let mut enc = vec![0u8; codec.max_encoded_len(data.len())];
        let err = LzCodec::new(false).forward(&mut ctx, &data, &mut enc).unwrap_err();
        assert!(err.is_skip());
    }

    #[test]
    fn corrupt_offsets_are_rejected() {
        let data = repetitive_sample();
        let codec = LzCodec::new(false);
        let mut ctx = Context::default();
        let mut enc = vec![0u8; codec.max_encoded_len(data.len()).max(data.len() + 64)];
        let (_, written) = LzCodec::new(false).forward(&mut ctx, &data, &mut enc).unwrap();
        enc.truncate(written);
        enc[0] = 0xFF; // literal region end beyond the block
        let mut out = vec![0u8; data.len()];
        assert!(LzCodec::new(false).inverse(&mut ctx, &enc, &mut out).is_err());
    }

    fn lzp_roundtrip(data: &[u8]) -> Vec<u8> {
        let codec = LzpCodec::new();
        let mut ctx = Context::default();
        let mut enc = vec![0u8; codec.max_encoded_len(data.len()).max(data.len() + 64)];
        let (_, written) = LzpCodec::new().forward(&mut ctx, data, &mut enc).unwrap();
        enc.truncate(written);
        let mut out = vec![0u8; data.len()];
        let (_, m) = LzpCodec::new().inverse(&mut ctx, &enc, &mut out).unwrap();
        assert_eq!(m, data.len());
        assert_eq!(out, data);
        enc
    }

    #[test]
    fn lzp_long_repeats_compress() {
        let chunk: Vec<u8> = (0..200u8).collect();
        let mut data = Vec::new();
        for _ in 0..40 {
            data.extend_from_slice(&chunk);
        }
        let enc = lzp_roundtrip(&data);
        assert!(enc.len() < data.len() / 4);
    }

    #[test]
    fn lzp_escape_byte_survives() {
        let mut data = vec![0u8; 600];
        for i in (0..600).step_by(7) {
            data[i] = LZP_ESCAPE;
        }
        // Short block is below LZP_MIN_BLOCK; grow it with repeats.
        let mut big = Vec::new();
        for _ in 0..8 {
            big.extend_from_slice(&data);
        }
        lzp_roundtrip(&big);
    }
}
