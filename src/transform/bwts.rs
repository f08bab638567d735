//! Bijective Burrows-Wheeler transform (no primary index).
//!
//! The text is cut into its Lyndon factorization; the multiset of all
//! rotations of all factors is sorted under infinite-repetition order and
//! the last character of each rotation is emitted. Equal infinite words
//! contribute equal characters, so ties cost nothing. The inverse is a
//! plain LF chase: each cycle of the mapping spells one factor, and cycles
//! discovered from the smallest row outward reassemble the factors back to
//! front.

use crate::error::{Error, Result};
use crate::types::Context;

use super::ByteTransform;

pub struct Bwts;

impl Bwts {
    pub fn new() -> Bwts {
        Bwts
    }
}

impl Default for Bwts {
    fn default() -> Self {
        Bwts::new()
    }
}

/// Lyndon factorization (Duval). Returns factor start offsets plus `n`.
fn lyndon_factors(s: &[u8]) -> Vec<usize> {
    let n = s.len();
    let mut bounds = vec![0usize];
    let mut i = 0usize;
    while i < n {
        let mut j = i + 1;
        let mut k = i;
        while j < n && s[k] <= s[j] {
            if s[k] < s[j] {
                k = i;
            } else {
                k += 1;
            }
            j += 1;
        }
        while i <= k {
            i += j - k;
            bounds.push(i);
        }
    }
    bounds
}

/// Compare two rotations under omega-order (infinite repetition). Equality
/// is settled after `|u| + |v|` characters.
fn cmp_rotations(
    s: &[u8],
    (a_start, a_end, a_rot): (usize, usize, usize),
    (b_start, b_end, b_rot): (usize, usize, usize),
) -> std::cmp::Ordering {
    let la = a_end - a_start;
    let lb = b_end - b_start;
    let mut ia = a_rot;
    let mut ib = b_rot;
    for _ in 0..la + lb {
        let ca = s[ia];
        let cb = s[ib];
        if ca != cb {
            return ca.cmp(&cb);
        }
        ia += 1;
        if ia == a_end {
            ia = a_start;
        }
        ib += 1;
        if ib == b_end {
            ib = b_start;
        }
    }
    std::cmp::Ordering::Equal
}

impl ByteTransform for Bwts {
    fn forward(&mut self, _ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let n = src.len();
        if n == 0 {
            return Err(Error::Skip("empty block"));
        }
        if dst.len() < n {
            return Err(Error::capacity("bwts output buffer too small"));
        }
        if n == 1 {
            dst[0] = src[0];
            return Ok((1, 1));
        }
        let bounds = lyndon_factors(src);

        // Every position tagged with its factor extent.
        let mut rotations: Vec<(usize, usize, usize)> = Vec::with_capacity(n);
        for w in bounds.windows(2) {
            let (start, end) = (w[0], w[1]);
            for rot in start..end {
                rotations.push((start, end, rot));
            }
        }
        rotations.sort_by(|&a, &b| cmp_rotations(src, a, b));

        for (r, &(start, end, rot)) in rotations.iter().enumerate() {
            dst[r] = if rot == start {
                src[end - 1]
            } else {
                src[rot - 1]
            };
        }
        Ok((n, n))
    }

    fn inverse(&mut self, _ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let n = src.len();
        if n > dst.len() {
            return Err(Error::corruption("decoded size exceeds block size"));
        }
        if n == 0 {
            return Ok((0, 0));
        }
        // Standard LF over the rotation multiset (no sentinel).
        let mut bucket = [0u32; 256];
        for &b in src {
            bucket[b as usize] += 1;
        }
        let mut sum = 0u32;
        for c in 0..256 {
            let f = bucket[c];
            bucket[c] = sum;
            sum += f;
        }
        let mut lf = vec![0u32; n];
        for (k, &b) in src.iter().enumerate() {
            let c = b as usize;
            lf[k] = bucket[c];
            bucket[c] += 1;
        }

        let mut used = vec![false; n];
        let mut pos = n;
        for start in 0..n {
            if used[start] {
                continue;
            }
            let mut k = start;
            loop {
                if pos == 0 {
                    return Err(Error::corruption("bwts cycle overrun"));
                }
                used[k] = true;
                pos -= 1;
                dst[pos] = src[k];
                k = lf[k] as usize;
                if k == start {
                    break;
                }
                if used[k] {
                    return Err(Error::corruption("bwts cycle is not a permutation"));
                }
            }
        }
        Ok((n, n))
    }

    fn max_encoded_len(&self, src_len: usize) -> usize {
        src_len
    }
}
