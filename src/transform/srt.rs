//! Sorted rank transform.
//!
//! The block's histogram is written as a varint header, then every byte is
//! replaced by its current rank in a list of symbols kept sorted by
//! descending *remaining* frequency. After each emission the symbol's
//! remaining count drops by one and the symbol sinks past neighbours with a
//! larger remaining count, so ranks stay small for symbols that keep
//! appearing. The decoder replays the identical list maintenance from the
//! histogram alone.

use crate::error::{Error, Result};
use crate::types::Context;

use super::ByteTransform;

fn write_varint(out: &mut Vec<u8>, mut v: u32) {
    while v >= 0x80 {
        out.push((v & 0x7F) as u8 | 0x80);
        v >>= 7;
    }
    out.push(v as u8);
}

fn read_varint(src: &[u8], mut i: usize) -> Result<(u32, usize)> {
    let mut v = 0u32;
    let mut shift = 0u32;
    loop {
        let b = *src
            .get(i)
            .ok_or_else(|| Error::corruption("truncated histogram varint"))?;
        i += 1;
        if shift >= 32 {
            return Err(Error::corruption("histogram varint overflow"));
        }
        v |= u32::from(b & 0x7F) << shift;
        if b & 0x80 == 0 {
            return Ok((v, i));
        }
        shift += 7;
    }
}

/// Rank list shared by forward and inverse: symbols sorted by descending
/// remaining count, ties broken by symbol value.
struct RankList {
    symbols: Vec<u8>,
    rank_of: [usize; 256],
    remaining: [u32; 256],
}

impl RankList {
    fn new(freqs: &[u32; 256]) -> RankList {
        let mut symbols: Vec<u8> = (0..=255u8).filter(|&s| freqs[s as usize] > 0).collect();
        symbols.sort_by(|&a, &b| {
            freqs[b as usize]
                .cmp(&freqs[a as usize])
                .then(a.cmp(&b))
        });
        let mut rank_of = [usize::MAX; 256];
        for (r, &s) in symbols.iter().enumerate() {
            rank_of[s as usize] = r;
        }
        RankList {
            symbols,
            rank_of,
            remaining: *freqs,
        }
    }

    /// Consume one occurrence of the symbol at `rank` and restore ordering.
    fn consume(&mut self, rank: usize) {
        let c = self.symbols[rank] as usize;
        self.remaining[c] -= 1;
        let count = self.remaining[c];
        let mut r = rank;
        while r + 1 < self.symbols.len() {
            let next = self.symbols[r + 1] as usize;
            let nc = self.remaining[next];
            if nc > count || (nc == count && next < c) {
                self.symbols[r] = next as u8;
                self.rank_of[next] = r;
                r += 1;
            } else {
                break;
            }
        }
        self.symbols[r] = c as u8;
        self.rank_of[c] = r;
    }
}

pub struct Srt;

impl Srt {
    pub fn new() -> Srt {
        Srt
    }
}

impl Default for Srt {
    fn default() -> Self {
        Srt::new()
    }
}

impl ByteTransform for Srt {
    fn forward(&mut self, _ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let n = src.len();
        if n == 0 {
            return Err(Error::Skip("empty block"));
        }
        let mut freqs = [0u32; 256];
        crate::global::compute_histogram(src, &mut freqs);

        let mut header = Vec::with_capacity(300);
        for &f in freqs.iter() {
            write_varint(&mut header, f);
        }
        if header.len() + n > dst.len() {
            return Err(Error::Skip("histogram header expanded output"));
        }
        dst[..header.len()].copy_from_slice(&header);

        let mut list = RankList::new(&freqs);
        for (i, &c) in src.iter().enumerate() {
            let rank = list.rank_of[c as usize];
            dst[header.len() + i] = rank as u8;
            list.consume(rank);
        }
        Ok((n, header.len() + n))
    }

    fn inverse(&mut self, _ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let mut freqs = [0u32; 256];
        let mut i = 0usize;
        for f in freqs.iter_mut() {
            let (v, next) = read_varint(src, i)?;
            *f = v;
            i = next;
        }
        let total: u64 = freqs.iter().map(|&f| u64::from(f)).sum();
        let n = usize::try_from(total).map_err(|_| Error::corruption("histogram too large"))?;
        if n != src.len() - i {
            return Err(Error::corruption("histogram does not match payload size"));
        }
        if n > dst.len() {
            return Err(Error::corruption("decoded size exceeds block size"));
        }

        let mut list = RankList::new(&freqs);
        for (j, &r) in src[i..].iter().enumerate() {
            let rank = r as usize;
            if rank >= list.symbols.len() {
                return Err(Error::corruption("rank out of range"));
            }
            dst[j] = list.symbols[rank];
            list.consume(rank);
        }
        Ok((src.len(), n))
    }

    fn max_encoded_len(&self, src_len: usize) -> usize {
        // 256 varints of at most 5 bytes on top of the payload.
        src_len + 1280
    }
}
