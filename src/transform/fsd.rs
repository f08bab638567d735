//! Fixed-step delta transform for multimedia-like data (audio samples,
//! image rows, interleaved channels).
//!
//! Candidate step distances {1, 2, 3, 4, 8, 16} are scored on three sampled
//! sub-blocks by the first-order entropy of their delta histograms; the
//! winning distance must beat the raw entropy by a margin or the block is
//! skipped. Output is either zig-zag deltas (with a one-byte escape for the
//! one unrepresentable difference) or a plain XOR against the stepped
//! predecessor, whichever samples better.
//!
//! Header: mode byte (1 = delta, 2 = XOR), distance byte, then the first
//! `distance` bytes verbatim.

use crate::error::{Error, Result};
use crate::global::first_order_entropy_1024;
use crate::types::{Context, DataType};

use super::ByteTransform;

const DISTANCES: [usize; 6] = [1, 2, 3, 4, 8, 16];
const MIN_BLOCK_LEN: usize = 1024;
const MODE_DELTA: u8 = 1;
const MODE_XOR: u8 = 2;
const ESCAPE: u8 = 0xFF;

/// delta (as two's-complement byte) → zig-zag code. `-128` maps to the
/// escape value 0xFF.
fn zigzag_table() -> [u8; 256] {
    std::array::from_fn(|i| {
        let d = i as u8 as i8;
        match d {
            0.. => (d as u8) << 1,
            -127..=-1 => ((-(d as i16)) as u8 * 2) - 1,
            i8::MIN => ESCAPE,
        }
    })
}

/// zig-zag code → delta byte. Index 0xFF is never used (escape).
fn unzigzag_table() -> [u8; 256] {
    let zz = zigzag_table();
    let mut inv = [0u8; 256];
    for (i, &z) in zz.iter().enumerate() {
        inv[z as usize] = i as u8;
    }
    inv
}

fn sample_entropy(src: &[u8], dist: usize, xor: bool) -> u32 {
    // Three spread-out windows rather than the whole block.
    let n = src.len();
    let window = (n / 8).clamp(256, 64 * 1024);
    let starts = [dist, n / 2, n - window.min(n - dist) - 1];
    let mut freqs = [0u32; 256];
    let mut total = 0usize;
    for &s in &starts {
        let end = (s + window).min(n);
        for i in s.max(dist)..end {
            let v = if xor {
                src[i] ^ src[i - dist]
            } else {
                src[i].wrapping_sub(src[i - dist])
            };
            freqs[v as usize] += 1;
            total += 1;
        }
    }
    first_order_entropy_1024(total, &freqs)
}

pub struct Fsd;

impl Fsd {
    pub fn new() -> Fsd {
        Fsd
    }
}

impl Default for Fsd {
    fn default() -> Self {
        Fsd::new()
    }
}

impl ByteTransform for Fsd {
    fn forward(&mut self, ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let n = src.len();
        if n < MIN_BLOCK_LEN {
            return Err(Error::Skip("block too small"));
        }
        if !matches!(
            ctx.data_type,
            DataType::Undefined | DataType::Multimedia | DataType::Bin
        ) {
            return Err(Error::Skip("data type not multimedia"));
        }

        // Raw entropy of the same samples is the bar to beat.
        let mut raw_freqs = [0u32; 256];
        crate::global::compute_histogram(src, &mut raw_freqs);
        let raw = first_order_entropy_1024(n, &raw_freqs);

        let mut best = (u32::MAX, 0usize, false);
        for &dist in &DISTANCES {
            let e_delta = sample_entropy(src, dist, false);
            if e_delta < best.0 {
                best = (e_delta, dist, false);
            }
            let e_xor = sample_entropy(src, dist, true);
            if e_xor < best.0 {
                best = (e_xor, dist, true);
            }
        }
        let (entropy, dist, xor) = best;
        // Require a real gain: at least 1/16 below the raw estimate.
        if entropy >= raw - raw / 16 {
            return Err(Error::Skip("delta does not reduce entropy"));
        }

        let budget = dst.len();
        if 2 + dist > budget {
            return Err(Error::Skip("delta header expanded output"));
        }
        dst[0] = if xor { MODE_XOR } else { MODE_DELTA };
        dst[1] = dist as u8;
        dst[2..2 + dist].copy_from_slice(&src[..dist]);
        let mut j = 2 + dist;

        if xor {
            if j + (n - dist) > budget {
                return Err(Error::Skip("xor output expanded"));
            }
            for i in dist..n {
                dst[j] = src[i] ^ src[i - dist];
                j += 1;
            }
        } else {
            let zz = zigzag_table();
            for i in dist..n {
                let d = src[i].wrapping_sub(src[i - dist]);
                let code = zz[d as usize];
                if code == ESCAPE {
                    if j + 2 > budget {
                        return Err(Error::Skip("delta escapes expanded output"));
                    }
                    dst[j] = ESCAPE;
                    dst[j + 1] = src[i];
                    j += 2;
                } else {
                    if j >= budget {
                        return Err(Error::Skip("delta output expanded"));
                    }
                    dst[j] = code;
                    j += 1;
                }
            }
        }
        ctx.data_type = DataType::Multimedia;
        Ok((n, j))
    }

    fn inverse(&mut self, _ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        if src.len() < 2 {
            return Err(Error::corruption("truncated delta header"));
        }
        let mode = src[0];
        let dist = src[1] as usize;
        if !DISTANCES.contains(&dist) || (mode != MODE_DELTA && mode != MODE_XOR) {
            return Err(Error::corruption("invalid delta header"));
        }
        if 2 + dist > src.len() || dist > dst.len() {
            return Err(Error::corruption("truncated delta seed"));
        }
        dst[..dist].copy_from_slice(&src[2..2 + dist]);
        let mut i = 2 + dist;
        let mut j = dist;

        if mode == MODE_XOR {
            while i < src.len() {
                if j >= dst.len() {
                    return Err(Error::corruption("output exceeds block size"));
                }
                dst[j] = src[i] ^ dst[j - dist];
                i += 1;
                j += 1;
            }
        } else {
            let inv = unzigzag_table();
            while i < src.len() {
                if j >= dst.len() {
                    return Err(Error::corruption("output exceeds block size"));
                }
                let code = src[i];
                i += 1;
                if code == ESCAPE {
                    let raw = *src
                        .get(i)
                        .ok_or_else(|| Error::corruption("truncated escape"))?;
                    i += 1;
                    dst[j] = raw;
                } else {
                    dst[j] = dst[j - dist].wrapping_add(inv[code as usize]);
                }
                j += 1;
            }
        }
        Ok((i, j))
    }

    fn max_encoded_len(&self, src_len: usize) -> usize {
        src_len + src_len / 16 + 32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8]) {
        let fsd = Fsd::new();
        let mut ctx = Context::default();
        let mut enc = vec![0u8; fsd.max_encoded_len(data.len())];
        let (_, written) = Fsd::new().forward(&mut ctx, data, &mut enc).unwrap();
        enc.truncate(written);
        assert_eq!(ctx.data_type, DataType::Multimedia);
        let mut out = vec![0u8; data.len()];
        let (_, n) = Fsd::new().inverse(&mut ctx, &enc, &mut out).unwrap();
        assert_eq!(n, data.len());
        assert_eq!(out, data);
    }

    #[test]
    fn smooth_ramp_picks_delta() {
        // A slow sawtooth: consecutive differences are tiny.
        let data: Vec<u8> = (0..20_000u32).map(|i| ((i / 7) % 251) as u8).collect();
        roundtrip(&data);
    }

    #[test]
    fn interleaved_channels_pick_wider_step() {
        // Two interleaved ramps favor distance 2 over distance 1.
        let data: Vec<u8> = (0..30_000u32)
            .map(|i| {
                if i % 2 == 0 {
                    ((i / 16) % 256) as u8
                } else {
                    (255 - (i / 16) % 200) as u8
                }
            })
            .collect();
        roundtrip(&data);
    }

    #[test]
    fn random_data_is_skipped() {
        let mut state = 0xABCDEFu64;
        let data: Vec<u8> = (0..8192)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                (state >> 33) as u8
            })
            .collect();
        let fsd = Fsd::new();
        let mut ctx = Context::default();
        let mut enc = vec![0u8; fsd.max_encoded_len(data.len())];
        let err = Fsd::new().forward(&mut ctx, &data, &mut enc).unwrap_err();
        assert!(err.is_skip());
    }

    #[test]
    fn text_data_type_is_refused() {
        let data = vec![1u8; 4096];
        let fsd = Fsd::new();
        let mut ctx = Context::default();
        ctx.data_type = DataType::Text;
        let mut enc = vec![0u8; fsd.max_encoded_len(data.len())];
        let err = Fsd::new().forward(&mut ctx, &data, &mut enc).unwrap_err();
        assert!(err.is_skip());
    }
}
