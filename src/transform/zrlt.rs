//! Zero run-length transform.
//!
//! Only zero runs are coded: a run of `n` zeros becomes the binary digits of
//! `n + 1`, one digit per byte, least significant first, so the final digit
//! is always the leading 1 of the value and doubles as the terminator.
//! Non-zero bytes are shifted up by one to keep the digit values 0 and 1 free;
//! `0xFE` and `0xFF` cannot be shifted and are escaped as `0xFF 0x00` and
//! `0xFF 0x01`.
//!
//! The transform declares a 1x encoded size: any expansion is reported as a
//! skip and the block is passed through unchanged.

use crate::error::{Error, Result};
use crate::types::Context;

use super::ByteTransform;

/// Blocks shorter than this are never worth the pass.
const MIN_BLOCK_LEN: usize = 16;

pub struct Zrlt;

impl Zrlt {
    pub fn new() -> Zrlt {
        Zrlt
    }
}

impl Default for Zrlt {
    fn default() -> Self {
        Zrlt::new()
    }
}

impl ByteTransform for Zrlt {
    fn forward(&mut self, _ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let n = src.len();
        if n < MIN_BLOCK_LEN {
            return Err(Error::Skip("block too small"));
        }
        let budget = dst.len();
        let mut i = 0usize;
        let mut j = 0usize;
        while i < n {
            if src[i] == 0 {
                let mut run = 1usize;
                while i + run < n && src[i + run] == 0 {
                    run += 1;
                }
                i += run;
                let mut val = run + 1;
                while val > 0 {
                    if j >= budget {
                        return Err(Error::Skip("zero runs expanded output"));
                    }
                    dst[j] = (val & 1) as u8;
                    j += 1;
                    val >>= 1;
                }
            } else {
                let v = src[i];
                i += 1;
                if v >= 0xFE {
                    if j + 2 > budget {
                        return Err(Error::Skip("zero runs expanded output"));
                    }
                    dst[j] = 0xFF;
                    dst[j + 1] = v - 0xFE;
                    j += 2;
                } else {
                    if j >= budget {
                        return Err(Error::Skip("zero runs expanded output"));
                    }
                    dst[j] = v + 1;
                    j += 1;
                }
            }
        }
        Ok((i, j))
    }

    fn inverse(&mut self, _ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let n = src.len();
        let mut i = 0usize;
        let mut j = 0usize;
        while i < n {
            let b = src[i];
            if b <= 1 {
                // Run digits, least significant first; the last digit is 1.
                let mut val = 0usize;
                let mut shift = 0u32;
                while i < n && src[i] <= 1 {
                    val |= (src[i] as usize) << shift;
                    shift += 1;
                    i += 1;
                    if shift > 40 {
                        return Err(Error::corruption("zero run length overflow"));
                    }
                }
                if val < 2 {
                    return Err(Error::corruption("unterminated zero run"));
                }
                let run = val - 1;
                if j + run > dst.len() {
                    return Err(Error::corruption("zero run exceeds block size"));
                }
                dst[j..j + run].fill(0);
                j += run;
            } else if b == 0xFF {
                i += 1;
                if i >= n {
                    return Err(Error::corruption("truncated escape"));
                }
                let v = src[i];
                if v > 1 {
                    return Err(Error::corruption("invalid escape payload"));
                }
                i += 1;
                if j >= dst.len() {
                    return Err(Error::corruption("output exceeds block size"));
                }
                dst[j] = 0xFE + v;
                j += 1;
            } else {
                i += 1;
                if j >= dst.len() {
                    return Err(Error::corruption("output exceeds block size"));
                }
                dst[j] = b - 1;
                j += 1;
            }
        }
        Ok((i, j))
    }

    fn max_encoded_len(&self, src_len: usize) -> usize {
        // Isolated zeros and 0xFE/0xFF escapes can expand; anything beyond
        // this margin is reported as a skip instead.
        src_len + src_len / 8 + 16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8]) -> Vec<u8> {
        let mut ctx = Context::default();
        let mut enc = vec![0u8; Zrlt::new().max_encoded_len(data.len())];
        let (_, written) = Zrlt::new().forward(&mut ctx, data, &mut enc).unwrap();
        enc.truncate(written);
        let mut out = vec![0u8; data.len()];
        let (_, n) = Zrlt::new().inverse(&mut ctx, &enc, &mut out).unwrap();
        assert_eq!(n, data.len());
        assert_eq!(out, data);
        enc
    }

    #[test]
    fn matches_reference_vector() {
        let input: Vec<u8> = vec![
            0, 1, 2, 2, 2, 2, 7, 9, 9, 16, 16, 16, 1, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3,
            3, 3, 3, 3, 3,
        ];
        let enc = roundtrip(&input);
        // The leading single zero is a one-significant-bit run (digits 0, 1);
        // every non-zero byte is shifted up by one.
        assert_eq!(
            &enc[..15],
            &[0, 1, 2, 3, 3, 3, 3, 8, 10, 10, 17, 17, 17, 2, 4]
        );
    }

    #[test]
    fn long_zero_run() {
        let mut data = vec![0u8; 1000];
        data.push(5);
        data.extend_from_slice(&[0u8; 500]);
        let enc = roundtrip(&data);
        assert!(enc.len() < 32);
    }

    #[test]
    fn escapes_high_bytes() {
        let mut data = vec![0u8; 32];
        data.extend_from_slice(&[0xFE, 0xFF, 0x10]);
        roundtrip(&data);
    }

    #[test]
    fn refuses_escape_heavy_blocks() {
        let data = vec![0xFEu8; 1000];
        let zrlt = Zrlt::new();
        let mut ctx = Context::default();
        let mut enc = vec![0u8; zrlt.max_encoded_len(data.len())];
        let err = Zrlt::new().forward(&mut ctx, &data, &mut enc).unwrap_err();
        assert!(err.is_skip());
    }

    #[test]
    fn all_zero_positions_survive() {
        let mut data = vec![7u8; 64];
        for i in (0..64).step_by(5) {
            data[i] = 0;
        }
        roundtrip(&data);
    }
}
