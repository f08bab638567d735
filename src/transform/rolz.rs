//! Reduced Offset Lempel-Ziv.
//!
//! Matches are addressed by a small index into a per-context ring of recent
//! positions instead of a raw distance: the two preceding bytes select one
//! of 65536 rings, each holding the last `1 << log_pos_checks` positions
//! seen under that context. Encoder and decoder maintain identical rings,
//! so only the ring index travels.
//!
//! Two flavors share the parser:
//! - **ROLZ**: the four step streams (flags, literals, lengths, ring
//!   indexes) are each compressed with the order-0 ANS coder and
//!   concatenated behind a header of varint lengths.
//! - **ROLZX**: everything is coded bit by bit through an embedded 56-bit
//!   binary range coder with two 16-bit probability tables (one for literal
//!   bits, one for match structure), both selected by the previous output
//!   byte and adapted with a 5-bit shift.
//!
//! The params byte carries `log_pos_checks` and the minimum match; streams
//! written before bitstream version 4 used the swapped layout, which the
//! decoder still accepts.

use crate::bitstream::{BitReader, BitWriter};
use crate::entropy::{AnsDecoder, AnsEncoder, EntropyDecoder, EntropyEncoder};
use crate::error::{Error, Result};
use crate::types::Context;

use super::lz::{emit_len, match_length, read_len};
use super::ByteTransform;

const MIN_BLOCK_LEN: usize = 64;
const ROLZ_MIN_MATCH: usize = 5;
const ROLZ_LOG_POS_CHECKS: u32 = 5;
/// ROLZX codes the length excess as one byte (two nibble trees).
const ROLZX_MAX_LEN_EXCESS: usize = 255;
const MAX_MATCH: usize = 65535 + 254 + ROLZ_MIN_MATCH;

// ── Position rings ───────────────────────────────────────────────────────────

/// Per-context rings of recent positions, maintained identically by the
/// encoder (over the source) and the decoder (over its output).
struct PositionRings {
    positions: Vec<u32>,
    cursors: Vec<u8>,
    counts: Vec<u8>,
    slots: usize,
}

impl PositionRings {
    fn new(log_pos_checks: u32) -> PositionRings {
        let slots = 1usize << log_pos_checks;
        PositionRings {
            positions: vec![0u32; 65536 * slots],
            cursors: vec![0u8; 65536],
            counts: vec![0u8; 65536],
            slots,
        }
    }

    #[inline]
    fn key(data: &[u8], i: usize) -> usize {
        ((data[i - 2] as usize) << 8) | data[i - 1] as usize
    }

    fn insert(&mut self, key: usize, pos: usize) {
        let mask = self.slots - 1;
        let c = self.cursors[key] as usize;
        self.positions[key * self.slots + (c & mask)] = pos as u32;
        self.cursors[key] = ((c + 1) & mask) as u8;
        if (self.counts[key] as usize) < self.slots {
            self.counts[key] += 1;
        }
    }

    /// Position for ring index `idx` (0 = most recent insertion).
    fn get(&self, key: usize, idx: usize) -> Option<usize> {
        if idx >= self.counts[key] as usize {
            return None;
        }
        let mask = self.slots - 1;
        let c = self.cursors[key] as usize;
        Some(self.positions[key * self.slots + (c.wrapping_sub(1 + idx) & mask)] as usize)
    }

    fn count(&self, key: usize) -> usize {
        self.counts[key] as usize
    }
}

/// One parsed step.
#[derive(Debug, Clone, Copy)]
enum Step {
    Literal(u8),
    Match { len_excess: usize, idx: u8 },
}

/// Greedy parse shared by both flavors. `sink(step, end_pos)` receives every
/// step together with the source position right after it.
fn parse<F: FnMut(Step, usize) -> Result<()>>(
    src: &[u8],
    log_pos_checks: u32,
    max_len_excess: usize,
    mut sink: F,
) -> Result<()> {
    let n = src.len();
    let mut rings = PositionRings::new(log_pos_checks);
    let mut i = 2usize;
    while i < n {
        let key = PositionRings::key(src, i);
        let mut best: Option<(usize, usize)> = None; // (len, idx)
        for idx in 0..rings.count(key) {
            let pos = rings.get(key, idx).unwrap();
            let len = match_length(src, pos, i, n)
                .min(ROLZ_MIN_MATCH.saturating_add(max_len_excess))
                .min(MAX_MATCH);
            if len >= ROLZ_MIN_MATCH && best.map_or(true, |(bl, _)| len > bl) {
                best = Some((len, idx));
            }
        }
        rings.insert(key, i);
        match best {
            Some((len, idx)) => {
                i += len;
                sink(
                    Step::Match {
                        len_excess: len - ROLZ_MIN_MATCH,
                        idx: idx as u8,
                    },
                    i,
                )?;
            }
            None => {
                let b = src[i];
                i += 1;
                sink(Step::Literal(b), i)?;
            }
        }
    }
    Ok(())
}

/// Replay driver shared by both decoders: `next` yields the step for the
/// current context key; ring maintenance mirrors the parser exactly.
fn replay<F: FnMut(usize) -> Result<Step>>(
    dst: &mut [u8],
    out_len: usize,
    seed: &[u8],
    log_pos_checks: u32,
    mut next: F,
) -> Result<usize> {
    if out_len > dst.len() {
        return Err(Error::corruption("decoded size exceeds block size"));
    }
    if seed.len() > out_len {
        return Err(Error::corruption("rolz seed longer than block"));
    }
    dst[..seed.len()].copy_from_slice(seed);
    let mut rings = PositionRings::new(log_pos_checks);
    let mut j = seed.len();
    while j < out_len {
        let key = PositionRings::key(dst, j);
        let step = next(dst[j - 1] as usize)?;
        match step {
            Step::Literal(b) => {
                rings.insert(key, j);
                dst[j] = b;
                j += 1;
            }
            Step::Match { len_excess, idx } => {
                let pos = rings
                    .get(key, idx as usize)
                    .ok_or_else(|| Error::corruption("rolz ring index out of range"))?;
                rings.insert(key, j);
                let len = ROLZ_MIN_MATCH + len_excess;
                if j + len > out_len {
                    return Err(Error::corruption("rolz match overrun"));
                }
                for k in 0..len {
                    dst[j + k] = dst[pos + k];
                }
                j += len;
            }
        }
    }
    Ok(j)
}

// ── Stream helpers (ROLZ flavor) ─────────────────────────────────────────────

fn write_stream(out: &mut Vec<u8>, raw: &[u8]) -> Result<()> {
    let mut bw = BitWriter::new();
    AnsEncoder::new().encode(raw, &mut bw)?;
    let enc = bw.close();
    emit_len(out, raw.len());
    emit_len(out, enc.len());
    out.extend_from_slice(&enc);
    Ok(())
}

fn read_stream(src: &[u8], i: &mut usize) -> Result<Vec<u8>> {
    let raw_len = read_len(src, i)?;
    let enc_len = read_len(src, i)?;
    if *i + enc_len > src.len() {
        return Err(Error::corruption("truncated rolz stream"));
    }
    let mut raw = vec![0u8; raw_len];
    if raw_len > 0 {
        let mut br = BitReader::new(&src[*i..*i + enc_len]);
        AnsDecoder::new().decode(&mut raw, &mut br)?;
    }
    *i += enc_len;
    Ok(raw)
}

fn params_byte(log_pos_checks: u32) -> u8 {
    ((log_pos_checks as u8) << 4) | ROLZ_MIN_MATCH as u8
}

fn parse_params(b: u8, bs_version: u32) -> Result<(u32, usize)> {
    // Pre-v4 streams carried the two fields swapped.
    let (log, mm) = if bs_version < 4 {
        (u32::from(b & 0x0F), (b >> 4) as usize)
    } else {
        (u32::from(b >> 4), (b & 0x0F) as usize)
    };
    if !(2..=8).contains(&log) || mm == 0 {
        return Err(Error::corruption("invalid rolz parameters"));
    }
    Ok((log, mm))
}

// ── ROLZ (ANS streams) ───────────────────────────────────────────────────────

pub struct RolzCodec;

impl RolzCodec {
    pub fn new() -> RolzCodec {
        RolzCodec
    }
}

impl Default for RolzCodec {
    fn default() -> Self {
        RolzCodec::new()
    }
}

impl ByteTransform for RolzCodec {
    fn forward(&mut self, _ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let n = src.len();
        if n < MIN_BLOCK_LEN {
            return Err(Error::Skip("block too small"));
        }
        let mut flags = Vec::with_capacity(n / 4);
        let mut lits = Vec::with_capacity(n / 2);
        let mut lens = Vec::with_capacity(n / 16);
        let mut idxs = Vec::with_capacity(n / 16);
        parse(src, ROLZ_LOG_POS_CHECKS, usize::MAX, |step, _end| {
            match step {
                Step::Literal(b) => {
                    flags.push(0);
                    lits.push(b);
                }
                Step::Match { len_excess, idx } => {
                    flags.push(1);
                    emit_len(&mut lens, len_excess);
                    idxs.push(idx);
                }
            }
            Ok(())
        })?;

        let mut out = Vec::with_capacity(n / 2);
        out.push(params_byte(ROLZ_LOG_POS_CHECKS));
        out.extend_from_slice(&src[..2]);
        write_stream(&mut out, &flags)?;
        write_stream(&mut out, &lits)?;
        write_stream(&mut out, &lens)?;
        write_stream(&mut out, &idxs)?;
        if out.len() >= n || out.len() > dst.len() {
            return Err(Error::Skip("rolz output expanded"));
        }
        dst[..out.len()].copy_from_slice(&out);
        Ok((n, out.len()))
    }

    fn inverse(&mut self, ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        if src.len() < 3 {
            return Err(Error::corruption("truncated rolz block"));
        }
        let (log, min_match) = parse_params(src[0], ctx.bs_version)?;
        if min_match != ROLZ_MIN_MATCH {
            return Err(Error::corruption("unsupported rolz minimum match"));
        }
        let seed = [src[1], src[2]];
        let mut i = 3usize;
        let flags = read_stream(src, &mut i)?;
        let lits = read_stream(src, &mut i)?;
        let lens = read_stream(src, &mut i)?;
        let idxs = read_stream(src, &mut i)?;

        // Output length is implied by the streams; add it up first so the
        // replay loop can bound-check every write.
        let mut li = 0usize;
        let mut vi = 0usize;
        let mut out_len = 2usize;
        for &f in &flags {
            match f {
                0 => {
                    li += 1;
                    out_len += 1;
                }
                1 => out_len += ROLZ_MIN_MATCH + read_len(&lens, &mut vi)?,
                _ => return Err(Error::corruption("invalid rolz flag")),
            }
        }
        if li != lits.len() {
            return Err(Error::corruption("rolz literal count mismatch"));
        }

        let mut fi = 0usize;
        let mut li = 0usize;
        let mut vi = 0usize;
        let mut ii = 0usize;
        let written = replay(dst, out_len, &seed, log, |_prev| {
            // Streams already carry everything; the context byte is unused.
            let f = *flags
                .get(fi)
                .ok_or_else(|| Error::corruption("rolz flag stream underrun"))?;
            fi += 1;
            if f == 0 {
                let b = lits[li];
                li += 1;
                Ok(Step::Literal(b))
            } else {
                let len_excess = read_len(&lens, &mut vi)?;
                let idx = *idxs
                    .get(ii)
                    .ok_or_else(|| Error::corruption("rolz index stream underrun"))?;
                ii += 1;
                Ok(Step::Match { len_excess, idx })
            }
        })?;
        Ok((src.len(), written))
    }

    fn max_encoded_len(&self, src_len: usize) -> usize {
        src_len + src_len / 16 + 1024
    }
}

// ── 56-bit binary range coder ────────────────────────────────────────────────

const RC_BITS: u32 = 56;
const RC_MASK: u64 = (1 << RC_BITS) - 1;
const RC_TOP_SHIFT: u32 = RC_BITS - 8;
const PROB_ONE_HALF: u16 = 0x8000;
const ADAPT_SHIFT: u32 = 5;

struct BinaryRangeEncoder {
    x1: u64,
    x2: u64,
    out: Vec<u8>,
}

impl BinaryRangeEncoder {
    fn new() -> BinaryRangeEncoder {
        BinaryRangeEncoder {
            x1: 0,
            x2: RC_MASK,
            out: Vec::new(),
        }
    }

    fn encode(&mut self, bit: u32, p: &mut u16) {
        let xmid = self.x1 + (((self.x2 - self.x1) >> 16) * u64::from(*p));
        if bit != 0 {
            self.x2 = xmid;
            *p += (0xFFFF - *p) >> ADAPT_SHIFT;
        } else {
            self.x1 = xmid + 1;
            *p -= *p >> ADAPT_SHIFT;
        }
        while (self.x1 ^ self.x2) >> RC_TOP_SHIFT == 0 {
            self.out.push((self.x1 >> RC_TOP_SHIFT) as u8);
            self.x1 = (self.x1 << 8) & RC_MASK;
            self.x2 = ((self.x2 << 8) | 0xFF) & RC_MASK;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        for _ in 0..7 {
            self.out.push((self.x1 >> RC_TOP_SHIFT) as u8);
            self.x1 = (self.x1 << 8) & RC_MASK;
        }
        self.out
    }
}

struct BinaryRangeDecoder<'a> {
    x1: u64,
    x2: u64,
    x: u64,
    src: &'a [u8],
    pos: usize,
}

impl<'a> BinaryRangeDecoder<'a> {
    fn new(src: &'a [u8]) -> BinaryRangeDecoder<'a> {
        let mut d = BinaryRangeDecoder {
            x1: 0,
            x2: RC_MASK,
            x: 0,
            src,
            pos: 0,
        };
        for _ in 0..7 {
            d.x = (d.x << 8) | u64::from(d.next_byte());
        }
        d
    }

    #[inline]
    fn next_byte(&mut self) -> u8 {
        // Reading past the payload pads with zeros; corrupt streams are
        // caught by the structural checks in the replay loop.
        let b = self.src.get(self.pos).copied().unwrap_or(0);
        self.pos += 1;
        b
    }

    fn decode(&mut self, p: &mut u16) -> u32 {
        let xmid = self.x1 + (((self.x2 - self.x1) >> 16) * u64::from(*p));
        let bit = u32::from(self.x <= xmid);
        if bit != 0 {
            self.x2 = xmid;
            *p += (0xFFFF - *p) >> ADAPT_SHIFT;
        } else {
            self.x1 = xmid + 1;
            *p -= *p >> ADAPT_SHIFT;
        }
        while (self.x1 ^ self.x2) >> RC_TOP_SHIFT == 0 {
            self.x1 = (self.x1 << 8) & RC_MASK;
            self.x2 = ((self.x2 << 8) | 0xFF) & RC_MASK;
            self.x = ((self.x << 8) & RC_MASK) | u64::from(self.next_byte());
        }
        bit
    }
}

// ── ROLZX (context-mixing range coder) ───────────────────────────────────────

// Match-table node layout within a 256-entry context row:
// node 0: match flag; nodes 1..31: ring-index tree (5 bits);
// nodes 128..143 and 192..207: high and low nibble trees of the length.
const NODE_FLAG: usize = 0;
const NODE_LEN_HI: usize = 128;
const NODE_LEN_LO: usize = 192;

struct RolzxModel {
    lit_probs: Vec<u16>,
    match_probs: Vec<u16>,
}

impl RolzxModel {
    fn new() -> RolzxModel {
        RolzxModel {
            lit_probs: vec![PROB_ONE_HALF; 256 << 8],
            match_probs: vec![PROB_ONE_HALF; 256 << 8],
        }
    }
}

fn encode_tree(rc: &mut BinaryRangeEncoder, probs: &mut [u16], bits: u32, value: u32) {
    let mut node = 1usize;
    for k in (0..bits).rev() {
        let bit = (value >> k) & 1;
        rc.encode(bit, &mut probs[node]);
        node = (node << 1) | bit as usize;
    }
}

fn decode_tree(rc: &mut BinaryRangeDecoder, probs: &mut [u16], bits: u32) -> u32 {
    let mut node = 1usize;
    for _ in 0..bits {
        let bit = rc.decode(&mut probs[node]);
        node = (node << 1) | bit as usize;
    }
    node as u32 - (1 << bits)
}

pub struct RolzxCodec;

impl RolzxCodec {
    pub fn new() -> RolzxCodec {
        RolzxCodec
    }
}

impl Default for RolzxCodec {
    fn default() -> Self {
        RolzxCodec::new()
    }
}

impl ByteTransform for RolzxCodec {
    fn forward(&mut self, _ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let n = src.len();
        if n < MIN_BLOCK_LEN {
            return Err(Error::Skip("block too small"));
        }
        let mut model = RolzxModel::new();
        let mut rc = BinaryRangeEncoder::new();
        let mut prev = src[1] as usize;
        parse(src, ROLZ_LOG_POS_CHECKS, ROLZX_MAX_LEN_EXCESS, |step, end| {
            let row = prev << 8;
            match step {
                Step::Literal(b) => {
                    rc.encode(0, &mut model.match_probs[row + NODE_FLAG]);
                    encode_tree(&mut rc, &mut model.lit_probs[row..row + 256], 8, u32::from(b));
                }
                Step::Match { len_excess, idx } => {
                    rc.encode(1, &mut model.match_probs[row + NODE_FLAG]);
                    let m = &mut model.match_probs[row..row + 256];
                    encode_tree(&mut rc, m, ROLZ_LOG_POS_CHECKS, u32::from(idx));
                    encode_tree(&mut rc, &mut m[NODE_LEN_HI..NODE_LEN_HI + 32], 4, (len_excess >> 4) as u32);
                    encode_tree(&mut rc, &mut m[NODE_LEN_LO..NODE_LEN_LO + 32], 4, (len_excess & 15) as u32);
                }
            }
            prev = src[end - 1] as usize;
            Ok(())
        })?;

        let payload = rc.finish();
        let mut out = Vec::with_capacity(payload.len() + 16);
        out.push(params_byte(ROLZ_LOG_POS_CHECKS));
        emit_len(&mut out, n);
        out.extend_from_slice(&src[..2]);
        out.extend_from_slice(&payload);
        if out.len() >= n || out.len() > dst.len() {
            return Err(Error::Skip("rolzx output expanded"));
        }
        dst[..out.len()].copy_from_slice(&out);
        Ok((n, out.len()))
    }

    fn inverse(&mut self, ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        if src.len() < 4 {
            return Err(Error::corruption("truncated rolzx block"));
        }
        let (log, min_match) = parse_params(src[0], ctx.bs_version)?;
        if min_match != ROLZ_MIN_MATCH {
            return Err(Error::corruption("unsupported rolzx minimum match"));
        }
        let mut i = 1usize;
        let out_len = read_len(src, &mut i)?;
        if i + 2 > src.len() {
            return Err(Error::corruption("truncated rolzx seed"));
        }
        let seed = [src[i], src[i + 1]];
        i += 2;

        let mut model = RolzxModel::new();
        let mut rc = BinaryRangeDecoder::new(&src[i..]);
        let written = replay(dst, out_len, &seed, log, |prev| {
            let row = prev << 8;
            let is_match = rc.decode(&mut model.match_probs[row + NODE_FLAG]);
            if is_match == 0 {
                let b = decode_tree(&mut rc, &mut model.lit_probs[row..row + 256], 8) as u8;
                Ok(Step::Literal(b))
            } else {
                let m = &mut model.match_probs[row..row + 256];
                let idx = decode_tree(&mut rc, m, log);
                let hi = decode_tree(&mut rc, &mut m[NODE_LEN_HI..NODE_LEN_HI + 32], 4);
                let lo = decode_tree(&mut rc, &mut m[NODE_LEN_LO..NODE_LEN_LO + 32], 4);
                Ok(Step::Match {
                    len_excess: ((hi << 4) | lo) as usize,
                    idx: idx as u8,
                })
            }
        })?;
        Ok((src.len(), written))
    }

    fn max_encoded_len(&self, src_len: usize) -> usize {
        src_len + src_len / 16 + 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        b"rolz indexes recent positions per two-byte context; rolz indexes win. "
            .iter()
            .cycle()
            .take(12_000)
            .copied()
            .collect()
    }

    fn rolz_roundtrip(data: &[u8]) -> Vec<u8> {
        let codec = RolzCodec::new();
        let mut ctx = Context::default();
        let mut enc = vec![0u8; codec.max_encoded_len(data.len())];
        let (_, written) = RolzCodec::new().forward(&mut ctx, data, &mut enc).unwrap();
        enc.truncate(written);
        let mut out = vec![0u8; data.len()];
        let (_, m) = RolzCodec::new().inverse(&mut ctx, &enc, &mut out).unwrap();
        assert_eq!(m, data.len());
        assert_eq!(out, data);
        enc
    }

    fn rolzx_roundtrip(data: &[u8]) -> Vec<u8> {
        let codec = RolzxCodec::new();
        let mut ctx = Context::default();
        let mut enc = vec![0u8; codec.max_encoded_len(data.len())];
        let (_, written) = RolzxCodec::new().forward(&mut ctx, data, &mut enc).unwrap();
        enc.truncate(written);
        let mut out = vec![0u8; data.len()];
        let (_, m) = RolzxCodec::new().inverse(&mut ctx, &enc, &mut out).unwrap();
        assert_eq!(m, data.len());
        assert_eq!(out, data);
        enc
    }

    #[test]
    fn rolz_repetitive_text_compresses() {
        let data = sample();
        let enc = rolz_roundtrip(&data);
        assert!(enc.len() < data.len() / 3);
    }

    #[test]
    fn rolzx_repetitive_text_compresses() {
        let data = sample();
        let enc = rolzx_roundtrip(&data);
        assert!(enc.len() < data.len() / 3);
    }

    #[test]
    fn rolz_mixed_content_roundtrips() {
        let mut data = sample();
        data.extend((0..4096u32).map(|i| (i * 17 % 251) as u8));
        data.extend_from_slice(&sample());
        rolz_roundtrip(&data);
        rolzx_roundtrip(&data);
    }

    #[test]
    fn rolz_bad_flag_is_rejected() {
        let data = sample();
        let codec = RolzCodec::new();
        let mut ctx = Context::default();
        let mut enc = vec![0u8; codec.max_encoded_len(data.len())];
        let (_, written) = RolzCodec::new().forward(&mut ctx, &data, &mut enc).unwrap();
        enc.truncate(written);
        enc[0] = 0x05; // log_pos_checks 0 is out of range
        let mut out = vec![0u8; data.len()];
        assert!(RolzCodec::new().inverse(&mut ctx, &enc, &mut out).is_err());
    }

    #[test]
    fn binary_range_coder_roundtrips_bits() {
        let bits: Vec<u32> = (0..10_000u32).map(|i| (i * 7 + i / 13) & 1).collect();
        let mut enc = BinaryRangeEncoder::new();
        let mut p = PROB_ONE_HALF;
        for &b in &bits {
            enc.encode(b, &mut p);
        }
        let payload = enc.finish();
        let mut dec = BinaryRangeDecoder::new(&payload);
        let mut p = PROB_ONE_HALF;
        for &b in &bits {
            assert_eq!(dec.decode(&mut p), b);
        }
    }
}
