//! Escape-based run-length transform.
//!
//! The escape byte is chosen per block as the least frequent symbol and
//! written as a one-byte header. A run of four or more identical bytes is
//! emitted as the byte once, the escape, then the run count; a literal
//! occurrence of the escape byte is emitted as `ESC 0`.
//!
//! Count encoding (threshold already subtracted, then offset by 1 so that 0
//! stays reserved for the literal escape):
//! - `1..=223`: one byte.
//! - `224..=6943`: `0xE0 | hi` then `lo` (13-bit offset from 224).
//! - larger: `0xFF` then two big-endian bytes (offset from 6944).

use crate::error::{Error, Result};
use crate::global::compute_histogram;
use crate::types::Context;

use super::ByteTransform;

/// Runs shorter than this stay literal.
const RUN_THRESHOLD: usize = 4;
const MIN_BLOCK_LEN: usize = 16;

/// Largest count value the 3-byte form can carry.
const MAX_COUNT: usize = 6944 + 65535;

fn write_count(dst: &mut [u8], j: usize, count: usize) -> Option<usize> {
    debug_assert!(count >= 1 && count <= MAX_COUNT);
    if count < 224 {
        if j >= dst.len() {
            return None;
        }
        dst[j] = count as u8;
        Some(j + 1)
    } else if count < 6944 {
        if j + 2 > dst.len() {
            return None;
        }
        let v = count - 224;
        dst[j] = 0xE0 | (v >> 8) as u8;
        dst[j + 1] = (v & 0xFF) as u8;
        Some(j + 2)
    } else {
        if j + 3 > dst.len() {
            return None;
        }
        let v = count - 6944;
        dst[j] = 0xFF;
        dst[j + 1] = (v >> 8) as u8;
        dst[j + 2] = (v & 0xFF) as u8;
        Some(j + 3)
    }
}

fn read_count(src: &[u8], i: usize) -> Result<(usize, usize)> {
    let b = *src
        .get(i)
        .ok_or_else(|| Error::corruption("truncated run count"))?;
    if b < 0xE0 {
        Ok((b as usize, i + 1))
    } else if b < 0xFF {
        let lo = *src
            .get(i + 1)
            .ok_or_else(|| Error::corruption("truncated run count"))?;
        Ok((224 + (((b & 0x1F) as usize) << 8) + lo as usize, i + 2))
    } else {
        if i + 3 > src.len() {
            return Err(Error::corruption("truncated run count"));
        }
        Ok((
            6944 + ((src[i + 1] as usize) << 8) + src[i + 2] as usize,
            i + 3,
        ))
    }
}

pub struct Rlt;

impl Rlt {
    pub fn new() -> Rlt {
        Rlt
    }
}

impl Default for Rlt {
    fn default() -> Self {
        Rlt::new()
    }
}

impl ByteTransform for Rlt {
    fn forward(&mut self, _ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let n = src.len();
        if n < MIN_BLOCK_LEN {
            return Err(Error::Skip("block too small"));
        }
        let mut freqs = [0u32; 256];
        compute_histogram(src, &mut freqs);
        let escape = freqs
            .iter()
            .enumerate()
            .min_by_key(|&(_, &f)| f)
            .map(|(s, _)| s as u8)
            .unwrap();

        dst[0] = escape;
        let mut i = 0usize;
        let mut j = 1usize;
        let expanded = || Error::Skip("runs expanded output");
        while i < n {
            let v = src[i];
            let mut run = 1usize;
            while i + run < n && src[i + run] == v && run < MAX_COUNT + RUN_THRESHOLD - 1 {
                run += 1;
            }
            // Runs of the escape byte itself cannot use the run form (the
            // count parse would start on the escape value); they stay as
            // literal ESC 0 pairs, which is fine for the rarest symbol.
            if run >= RUN_THRESHOLD && v != escape {
                if j + 2 > dst.len() {
                    return Err(expanded());
                }
                dst[j] = v;
                dst[j + 1] = escape;
                j = write_count(dst, j + 2, run - RUN_THRESHOLD + 1).ok_or_else(expanded)?;
                i += run;
            } else {
                for _ in 0..run {
                    if v == escape {
                        if j + 2 > dst.len() {
                            return Err(expanded());
                        }
                        dst[j] = escape;
                        dst[j + 1] = 0;
                        j += 2;
                    } else {
                        if j >= dst.len() {
                            return Err(expanded());
                        }
                        dst[j] = v;
                        j += 1;
                    }
                    i += 1;
                }
            }
        }
        if j >= n {
            return Err(Error::Skip("no runs worth encoding"));
        }
        Ok((i, j))
    }

    fn inverse(&mut self, _ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        if src.is_empty() {
            return Ok((0, 0));
        }
        let escape = src[0];
        let mut i = 1usize;
        let mut j = 0usize;
        let mut prev: Option<u8> = None;
        while i < src.len() {
            let v = src[i];
            if v == escape {
                let (count, next) = read_count(src, i + 1)?;
                i = next;
                if count == 0 {
                    // Literal escape byte.
                    if j >= dst.len() {
                        return Err(Error::corruption("output exceeds block size"));
                    }
                    dst[j] = escape;
                    j += 1;
                    prev = Some(escape);
                } else {
                    let v = prev.ok_or_else(|| Error::corruption("run without preceding byte"))?;
                    // The run byte was already emitted once.
                    let extra = count + RUN_THRESHOLD - 2;
                    if j + extra > dst.len() {
                        return Err(Error::corruption("run exceeds block size"));
                    }
                    dst[j..j + extra].fill(v);
                    j += extra;
                    prev = None;
                }
            } else {
                if j >= dst.len() {
                    return Err(Error::corruption("output exceeds block size"));
                }
                dst[j] = v;
                j += 1;
                i += 1;
                prev = Some(v);
            }
        }
        Ok((i, j))
    }

    fn max_encoded_len(&self, src_len: usize) -> usize {
        src_len + src_len / 32 + 16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8]) -> Vec<u8> {
        let rlt = Rlt::new();
        let mut ctx = Context::default();
        let mut enc = vec![0u8; rlt.max_encoded_len(data.len())];
        let (_, written) = Rlt::new().forward(&mut ctx, data, &mut enc).unwrap();
        enc.truncate(written);
        let mut out = vec![0u8; data.len()];
        let (_, n) = Rlt::new().inverse(&mut ctx, &enc, &mut out).unwrap();
        assert_eq!(n, data.len());
        assert_eq!(out, data);
        enc
    }

    #[test]
    fn long_run_stays_tiny() {
        let mut data = vec![0x01u8];
        data.extend_from_slice(&[0x08u8; 79_999]);
        let enc = roundtrip(&data);
        // Header + literal + one long run split into two segments.
        assert!(enc.len() <= 16);
    }

    #[test]
    fn short_runs_stay_literal_next_to_long_ones() {
        // Three-byte runs are below the threshold and pass as literals; the
        // long run pays for the block.
        let mut data = b"aaabbbccc".to_vec();
        data.extend_from_slice(&[b'd'; 500]);
        data.extend_from_slice(b"eeefffggg");
        let enc = roundtrip(&data);
        assert!(enc.len() < data.len() / 2);
    }

    #[test]
    fn runless_blocks_are_skipped() {
        let data: Vec<u8> = (0..=255u8).cycle().take(512).collect();
        let rlt = Rlt::new();
        let mut ctx = Context::default();
        let mut enc = vec![0u8; rlt.max_encoded_len(data.len())];
        let err = Rlt::new().forward(&mut ctx, &data, &mut enc).unwrap_err();
        assert!(err.is_skip());
    }

    #[test]
    fn escape_literals_survive() {
        // Make 0x7F the rarest byte, then sprinkle literal occurrences.
        let mut data = vec![b'x'; 200];
        data[10] = 0x7F;
        data[100] = 0x7F;
        roundtrip(&data);
    }

    #[test]
    fn mixed_runs() {
        let mut data = Vec::new();
        for (byte, len) in [(5u8, 300usize), (9, 2), (5, 7000), (0, 4), (1, 1)] {
            data.extend(std::iter::repeat(byte).take(len));
        }
        roundtrip(&data);
    }
}
