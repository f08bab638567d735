//! Dictionary-based word substitution for text blocks.
//!
//! A hybrid dictionary backs the codec: roughly a thousand static English
//! words preloaded per process, plus dynamic slots filled with unmatched
//! words as the block streams by (a ring, so stale words age out). Both
//! sides replay the identical insertion sequence, so the dictionary never
//! travels in the payload.
//!
//! Output alphabet:
//! - `0x00..=0x7F` except `0x0F`: literal byte.
//! - `0x0F`: escape; the next byte is raw (non-ASCII input and literal 0x0F).
//! - `0x80`: case-flip marker, followed by a word index whose first letter
//!   is emitted with flipped case.
//! - `0x81..=0xBF`: one-byte word index (6 bits, index 1..63).
//! - `0xC0..=0xDF` + 1: two-byte word index (13 bits).
//! - `0xF0..=0xFF` + 2: three-byte word index (20 bits).
//!
//! Mode byte (first of the block): `000XHL0V`: X = XML/HTML heuristic,
//! H = CRLF normalization active (CRs dropped, re-inserted before every LF
//! on decode), L reserved, V = token variant (always 1 here).

use crate::error::{Error, Result};
use crate::types::{Context, DataType};

use super::words::{static_word_spans, MAX_WORD_LEN, STATIC_WORDS};
use super::ByteTransform;

const ESCAPE: u8 = 0x0F;
const CASE_FLIP: u8 = 0x80;
const HASH1: u32 = 0x7FEB_352D;
const HASH2: u32 = 0x846C_A68B;
const MIN_DYN_WORD_LEN: usize = 3;
const MIN_BLOCK_LEN: usize = 1024;

const MODE_XML: u8 = 1 << 4;
const MODE_CRLF: u8 = 1 << 3;
const MODE_VARIANT: u8 = 1;

#[inline]
fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphabetic()
}

fn word_hash(word: &[u8], flip_first: bool) -> u32 {
    let mut h = word.len() as u32;
    for (k, &c) in word.iter().enumerate() {
        let c = if k == 0 && flip_first { c ^ 0x20 } else { c };
        h = h.wrapping_mul(HASH1) ^ u32::from(c).wrapping_mul(HASH2);
    }
    h
}

#[derive(Clone, Copy)]
struct DictEntry {
    hash: u32,
    /// Offset into the static blob, or into the dynamic arena with the top
    /// bit set.
    off: u32,
    len: u8,
}

const DYNAMIC_FLAG: u32 = 1 << 31;

/// Hybrid dictionary: static entries plus a dynamic ring, indexed through a
/// single-slot hash map (an insert simply overwrites the slot).
struct Dictionary {
    map: Vec<u32>, // entry index + 1; 0 = empty
    mask: u32,
    entries: Vec<DictEntry>,
    arena: Vec<u8>,
    dyn_base: usize,
    dyn_capacity: usize,
    cursor: usize,
}

impl Dictionary {
    fn new(log_size: u32) -> Dictionary {
        let spans = static_word_spans();
        let dyn_capacity = 1usize << (log_size - 2);
        let mut entries = Vec::with_capacity(spans.len() + dyn_capacity);
        for &(off, len) in &spans {
            let word = &STATIC_WORDS.as_bytes()[off as usize..off as usize + len as usize];
            entries.push(DictEntry {
                hash: word_hash(word, false),
                off,
                len,
            });
        }
        let dyn_base = entries.len();
        entries.resize(
            dyn_base + dyn_capacity,
            DictEntry {
                hash: 0,
                off: DYNAMIC_FLAG,
                len: 0,
            },
        );
        let mut dict = Dictionary {
            map: vec![0u32; 1 << log_size],
            mask: (1u32 << log_size) - 1,
            entries,
            arena: vec![0u8; dyn_capacity * (MAX_WORD_LEN + 1)],
            dyn_base,
            dyn_capacity,
            cursor: 0,
        };
        for idx in 0..dict.dyn_base {
            let h = dict.entries[idx].hash;
            dict.map[(h & dict.mask) as usize] = idx as u32 + 1;
        }
        dict
    }

    fn word_bytes(&self, e: &DictEntry) -> &[u8] {
        let len = e.len as usize;
        if e.off & DYNAMIC_FLAG != 0 {
            let off = (e.off & !DYNAMIC_FLAG) as usize;
            &self.arena[off..off + len]
        } else {
            &STATIC_WORDS.as_bytes()[e.off as usize..e.off as usize + len]
        }
    }

    /// Exact-match lookup; returns the 1-based dictionary index.
    fn find(&self, word: &[u8], h: u32, flip_first: bool) -> Option<usize> {
        let slot = self.map[(h & self.mask) as usize];
        if slot == 0 {
            return None;
        }
        let e = &self.entries[slot as usize - 1];
        if e.hash != h || e.len as usize != word.len() {
            return None;
        }
        let stored = self.word_bytes(e);
        let matches = if flip_first {
            stored[0] == (word[0] ^ 0x20) && stored[1..] == word[1..]
        } else {
            stored == word
        };
        matches.then_some(slot as usize)
    }

    /// Overwrite the oldest dynamic slot with `word`.
    fn insert(&mut self, word: &[u8], h: u32) {
        let idx = self.dyn_base + self.cursor;
        let off = self.cursor * (MAX_WORD_LEN + 1);
        self.arena[off..off + word.len()].copy_from_slice(word);
        self.entries[idx] = DictEntry {
            hash: h,
            off: off as u32 | DYNAMIC_FLAG,
            len: word.len() as u8,
        };
        self.map[(h & self.mask) as usize] = idx as u32 + 1;
        self.cursor = (self.cursor + 1) % self.dyn_capacity;
    }

    fn max_index(&self) -> usize {
        self.entries.len()
    }
}

/// Block statistics driving the accept/refuse decision and the mode byte.
struct TextStats {
    is_text: bool,
    is_crlf: bool,
    is_xml: bool,
}

fn compute_stats(src: &[u8]) -> TextStats {
    let n = src.len();
    let mut freqs = [0u32; 256];
    crate::global::compute_histogram(src, &mut freqs);

    let printable: u64 = (32..127)
        .chain([9usize, 10, 13])
        .map(|b| u64::from(freqs[b]))
        .sum();
    let high: u64 = (128..256).map(|b| u64::from(freqs[b])).sum();
    let breaks = u64::from(freqs[10]) + u64::from(freqs[32]);

    let is_text = printable * 100 >= n as u64 * 75
        && high * 10 <= n as u64
        && breaks * 100 >= n as u64;

    // CRLF only counts when the pairing is total in both directions.
    let mut is_crlf = freqs[13] > 0 && freqs[13] == freqs[10];
    if is_crlf {
        for (i, &b) in src.iter().enumerate() {
            if b == 13 && src.get(i + 1) != Some(&10) {
                is_crlf = false;
                break;
            }
            if b == 10 && (i == 0 || src[i - 1] != 13) {
                is_crlf = false;
                break;
            }
        }
    }

    let lt = i64::from(freqs[b'<' as usize]);
    let gt = i64::from(freqs[b'>' as usize]);
    let is_xml = lt > 0 && (lt - gt).abs() * 100 <= lt && freqs[b'&' as usize] > 0;

    TextStats {
        is_text,
        is_crlf,
        is_xml,
    }
}

fn dict_log_size(block_size: usize, entropy: u8) -> u32 {
    let mut log = if block_size == 0 {
        13
    } else {
        (usize::BITS - block_size.leading_zeros()).clamp(13, 19)
    };
    if entropy == crate::entropy::TPAQX_TYPE && log < 19 {
        log += 1;
    }
    log
}

fn token_len(idx: usize) -> usize {
    if idx < 64 {
        1
    } else if idx < 8192 {
        2
    } else {
        3
    }
}

fn write_token(dst: &mut [u8], j: usize, idx: usize) -> Option<usize> {
    if idx < 64 {
        *dst.get_mut(j)? = 0x80 | idx as u8;
        Some(j + 1)
    } else if idx < 8192 {
        if j + 2 > dst.len() {
            return None;
        }
        dst[j] = 0xC0 | (idx >> 8) as u8;
        dst[j + 1] = (idx & 0xFF) as u8;
        Some(j + 2)
    } else {
        if j + 3 > dst.len() {
            return None;
        }
        dst[j] = 0xF0 | (idx >> 16) as u8;
        dst[j + 1] = ((idx >> 8) & 0xFF) as u8;
        dst[j + 2] = (idx & 0xFF) as u8;
        Some(j + 3)
    }
}

pub struct TextCodec;

impl TextCodec {
    pub fn new() -> TextCodec {
        TextCodec
    }
}

impl Default for TextCodec {
    fn default() -> Self {
        TextCodec::new()
    }
}

impl ByteTransform for TextCodec {
    fn forward(&mut self, ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let n = src.len();
        if n < MIN_BLOCK_LEN {
            return Err(Error::Skip("block too small"));
        }
        if !matches!(
            ctx.data_type,
            DataType::Undefined | DataType::Text | DataType::Bin
        ) {
            return Err(Error::Skip("data type not text"));
        }
        let stats = compute_stats(src);
        if !stats.is_text {
            return Err(Error::Skip("block is not text"));
        }
        ctx.data_type = DataType::Text;

        let mut dict = Dictionary::new(dict_log_size(ctx.block_size, ctx.entropy));
        let mut mode = MODE_VARIANT;
        if stats.is_crlf {
            mode |= MODE_CRLF;
        }
        if stats.is_xml {
            mode |= MODE_XML;
        }
        dst[0] = mode;
        let mut j = 1usize;

        let emit_literals = |dst: &mut [u8], j: &mut usize, bytes: &[u8]| -> Result<()> {
            for &b in bytes {
                if stats.is_crlf && b == 13 {
                    continue;
                }
                if b < 0x80 && b != ESCAPE {
                    if *j >= dst.len() {
                        return Err(Error::Skip("literal output expanded"));
                    }
                    dst[*j] = b;
                    *j += 1;
                } else {
                    if *j + 2 > dst.len() {
                        return Err(Error::Skip("literal output expanded"));
                    }
                    dst[*j] = ESCAPE;
                    dst[*j + 1] = b;
                    *j += 2;
                }
            }
            Ok(())
        };

        let mut anchor = 0usize;
        let mut i = 0usize;
        while i < n {
            if !is_word_byte(src[i]) {
                i += 1;
                continue;
            }
            let word_start = i;
            while i < n && is_word_byte(src[i]) {
                i += 1;
            }
            let word = &src[word_start..i];
            if word.len() > MAX_WORD_LEN {
                continue;
            }
            let h1 = word_hash(word, false);
            let hit = dict
                .find(word, h1, false)
                .map(|idx| (idx, false))
                .or_else(|| {
                    let h2 = word_hash(word, true);
                    dict.find(word, h2, true).map(|idx| (idx, true))
                });
            match hit {
                Some((idx, flipped)) => {
                    let cost = token_len(idx) + usize::from(flipped);
                    if cost < word.len() {
                        emit_literals(dst, &mut j, &src[anchor..word_start])?;
                        if flipped {
                            if j >= dst.len() {
                                return Err(Error::Skip("token output expanded"));
                            }
                            dst[j] = CASE_FLIP;
                            j += 1;
                        }
                        j = write_token(dst, j, idx)
                            .ok_or(Error::Skip("token output expanded"))?;
                        anchor = i;
                    } else if flipped && word.len() >= MIN_DYN_WORD_LEN {
                        // Not emitted, so the decoder sees plain literals and
                        // will insert under the exact hash; mirror that here.
                        dict.insert(word, h1);
                    }
                }
                None => {
                    if word.len() >= MIN_DYN_WORD_LEN {
                        dict.insert(word, h1);
                    }
                }
            }
        }
        emit_literals(dst, &mut j, &src[anchor..n])?;
        if j >= n {
            return Err(Error::Skip("no text compression gain"));
        }
        Ok((n, j))
    }

    fn inverse(&mut self, ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        if src.is_empty() {
            return Err(Error::corruption("empty text block"));
        }
        let mode = src[0];
        if mode & 0b1110_0010 != 0 || mode & MODE_VARIANT == 0 {
            return Err(Error::corruption("invalid text mode byte"));
        }
        let crlf = mode & MODE_CRLF != 0;

        let mut dict = Dictionary::new(dict_log_size(ctx.block_size, ctx.entropy));
        let max_index = dict.max_index();

        let mut i = 1usize;
        let mut j = 0usize;
        // Start of the current literal-run word in the output, if any. Words
        // produced by tokens are already in the dictionary and are not
        // re-processed.
        let mut word_start: Option<usize> = None;

        // Finishing a literal word mirrors the encoder's miss-path insert.
        macro_rules! close_word {
            ($dst:expr, $end:expr) => {
                if let Some(s) = word_start.take() {
                    let len = $end - s;
                    if (MIN_DYN_WORD_LEN..=MAX_WORD_LEN).contains(&len) {
                        let h1 = word_hash(&$dst[s..$end], false);
                        if dict.find(&$dst[s..$end], h1, false).is_none() {
                            dict.insert(&$dst[s..$end], h1);
                        }
                    }
                }
            };
        }

        let read_index = |src: &[u8], i: usize| -> Result<(usize, usize)> {
            let b = src[i];
            if (0x81..=0xBF).contains(&b) {
                Ok(((b & 0x3F) as usize, i + 1))
            } else if (0xC0..=0xDF).contains(&b) {
                let lo = *src
                    .get(i + 1)
                    .ok_or_else(|| Error::corruption("truncated word index"))?;
                Ok(((((b & 0x1F) as usize) << 8) | lo as usize, i + 2))
            } else if b >= 0xF0 {
                if i + 3 > src.len() {
                    return Err(Error::corruption("truncated word index"));
                }
                Ok((
                    (((b & 0x0F) as usize) << 16)
                        | ((src[i + 1] as usize) << 8)
                        | src[i + 2] as usize,
                    i + 3,
                ))
            } else {
                Err(Error::corruption("invalid word token"))
            }
        };

        while i < src.len() {
            let b = src[i];
            if b < 0x80 {
                let raw = if b == ESCAPE {
                    i += 1;
                    *src
                        .get(i)
                        .ok_or_else(|| Error::corruption("truncated escape"))?
                } else {
                    b
                };
                i += 1;
                if crlf && raw == 10 {
                    if j + 2 > dst.len() {
                        return Err(Error::corruption("output exceeds block size"));
                    }
                    close_word!(dst, j);
                    dst[j] = 13;
                    dst[j + 1] = 10;
                    j += 2;
                    continue;
                }
                if j >= dst.len() {
                    return Err(Error::corruption("output exceeds block size"));
                }
                if is_word_byte(raw) {
                    if word_start.is_none() {
                        word_start = Some(j);
                    }
                } else {
                    close_word!(dst, j);
                }
                dst[j] = raw;
                j += 1;
            } else {
                close_word!(dst, j);
                let flipped = b == CASE_FLIP;
                if flipped {
                    i += 1;
                    if i >= src.len() {
                        return Err(Error::corruption("truncated case-flip token"));
                    }
                }
                let (idx, next) = read_index(src, i)?;
                i = next;
                if idx == 0 || idx > max_index {
                    return Err(Error::corruption("word index out of range"));
                }
                let e = dict.entries[idx - 1];
                if e.len == 0 {
                    return Err(Error::corruption("word index references empty slot"));
                }
                let len = e.len as usize;
                if j + len > dst.len() {
                    return Err(Error::corruption("output exceeds block size"));
                }
                dst[j..j + len].copy_from_slice(dict.word_bytes(&e));
                if flipped {
                    dst[j] ^= 0x20;
                }
                j += len;
            }
        }
        close_word!(dst, j);
        Ok((src.len(), j))
    }

    fn max_encoded_len(&self, src_len: usize) -> usize {
        src_len + src_len / 2 + 16
    }
}
