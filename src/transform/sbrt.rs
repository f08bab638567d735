//! Sort-by-rank transforms: Move-To-Front, Rank and TimeStamp.
//!
//! All three are the same machine with different promotion keys. Each symbol
//! carries a key derived from the current position `i` and its previous
//! occurrence `p`; after every emission the symbol is re-inserted into the
//! rank list so the list stays sorted by descending key:
//!
//! - MTF: key = `i` (pure recency, always bubbles to rank 0).
//! - Rank: key = `(i + p) / 2` (recency and frequency blended).
//! - TimeStamp: key = `p` (previous occurrence only).
//!
//! The two masks and the shift select the mode, which makes forward and
//! inverse a single pair of loops shared by the whole family.

use crate::error::{Error, Result};
use crate::types::Context;

use super::ByteTransform;

/// Mode selector for the SBR family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbrtMode {
    Mtf,
    Rank,
    TimeStamp,
}

pub struct Sbrt {
    mode: SbrtMode,
}

impl Sbrt {
    pub fn new(mode: SbrtMode) -> Sbrt {
        Sbrt { mode }
    }

    fn params(&self) -> (usize, usize, u32) {
        // (mask1 applied to i, mask2 applied to p, shift)
        match self.mode {
            SbrtMode::Mtf => (usize::MAX, 0, 0),
            SbrtMode::Rank => (usize::MAX, usize::MAX, 1),
            SbrtMode::TimeStamp => (0, usize::MAX, 0),
        }
    }
}

impl ByteTransform for Sbrt {
    fn forward(&mut self, _ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let n = src.len();
        if dst.len() < n {
            return Err(Error::capacity("sbrt output buffer too small"));
        }
        let (mask1, mask2, shift) = self.params();
        let mut prev = [0usize; 256];
        let mut key = [0usize; 256];
        let mut s2r: [u8; 256] = std::array::from_fn(|i| i as u8);
        let mut r2s: [u8; 256] = std::array::from_fn(|i| i as u8);

        for (i, &c) in src.iter().enumerate() {
            let c = c as usize;
            let mut rank = s2r[c] as usize;
            dst[i] = rank as u8;
            let qc = ((i & mask1) + (prev[c] & mask2)) >> shift;
            prev[c] = i;
            key[c] = qc;
            // Bubble the symbol up past every entry with a key at most qc.
            while rank > 0 && key[r2s[rank - 1] as usize] <= qc {
                r2s[rank] = r2s[rank - 1];
                s2r[r2s[rank] as usize] = rank as u8;
                rank -= 1;
            }
            r2s[rank] = c as u8;
            s2r[c] = rank as u8;
        }
        Ok((n, n))
    }

    fn inverse(&mut self, _ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let n = src.len();
        if dst.len() < n {
            return Err(Error::capacity("sbrt output buffer too small"));
        }
        let (mask1, mask2, shift) = self.params();
        let mut prev = [0usize; 256];
        let mut key = [0usize; 256];
        let mut r2s: [u8; 256] = std::array::from_fn(|i| i as u8);

        for (i, &r) in src.iter().enumerate() {
            let mut rank = r as usize;
            let c = r2s[rank] as usize;
            dst[i] = c as u8;
            let qc = ((i & mask1) + (prev[c] & mask2)) >> shift;
            prev[c] = i;
            key[c] = qc;
            while rank > 0 && key[r2s[rank - 1] as usize] <= qc {
                r2s[rank] = r2s[rank - 1];
                rank -= 1;
            }
            r2s[rank] = c as u8;
        }
        Ok((n, n))
    }

    fn max_encoded_len(&self, src_len: usize) -> usize {
        src_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(mode: SbrtMode, data: &[u8]) -> Vec<u8> {
        let mut ctx = Context::default();
        let mut enc = vec![0u8; data.len()];
        Sbrt::new(mode).forward(&mut ctx, data, &mut enc).unwrap();
        let mut out = vec![0u8; data.len()];
        Sbrt::new(mode).inverse(&mut ctx, &enc, &mut out).unwrap();
        assert_eq!(out, data);
        enc
    }

    #[test]
    fn mtf_repeated_symbol_ranks_zero() {
        let enc = roundtrip(SbrtMode::Mtf, b"aaaaaaa");
        // First occurrence emits the identity rank, the rest emit 0.
        assert_eq!(enc[0], b'a');
        assert!(enc[1..].iter().all(|&r| r == 0));
    }

    #[test]
    fn all_modes_roundtrip() {
        let data: Vec<u8> = b"the banana band planned a bland banana stand"
            .iter()
            .cycle()
            .take(2000)
            .copied()
            .collect();
        for mode in [SbrtMode::Mtf, SbrtMode::Rank, SbrtMode::TimeStamp] {
            roundtrip(mode, &data);
        }
    }

    #[test]
    fn full_byte_range_roundtrips() {
        let data: Vec<u8> = (0..=255u8).rev().cycle().take(1024).collect();
        for mode in [SbrtMode::Mtf, SbrtMode::Rank, SbrtMode::TimeStamp] {
            roundtrip(mode, &data);
        }
    }
}
