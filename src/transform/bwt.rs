//! Burrows-Wheeler Transform with chunked primary indexes.
//!
//! The forward direction builds a suffix array (SA-IS) and emits the
//! sentinel-style BWT: conceptually the text is followed by a unique
//! smallest sentinel, whose row is recorded as a primary index instead of
//! being stored. For blocks of 256 bytes or more the text is cut into 8
//! equal chunks and the row of each chunk's first suffix is recorded, which
//! lets the inverse run 8 independent LF chases.
//!
//! Inverse algorithms, chosen by block size:
//! - **merge-prev** (≤ 4 MiB): one `u32` array packs `(next_row << 8) |
//!   symbol`; all chases run in the calling task.
//! - **big-block** (> 4 MiB): an unpacked `u32` row array; chunk chases are
//!   spread over up to `min(jobs, 8)` rayon tasks writing disjoint output
//!   slices, stepping two symbols per iteration.
//!
//! Mini-header written in front of the payload:
//! `mode = (log2(chunks) << 2) | (index_size - 1)`, then `chunks` big-endian
//! primary indexes of `index_size` bytes. Every index is a row number in
//! `[1, n]`.

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::types::Context;

use super::sais::suffix_array;
use super::ByteTransform;

/// Block size limit (suffix array rows fit in 30 bits).
pub const MAX_BWT_BLOCK: usize = 1 << 30;
/// Above this the inverse switches to the unpacked big-block algorithm.
const MERGE_PREV_LIMIT: usize = 4 * 1024 * 1024;

/// Number of chunks for a block of `n` bytes.
pub fn bwt_chunks(n: usize) -> usize {
    if n < 256 {
        1
    } else {
        8
    }
}

/// Spread `jobs` workers over `tasks` slots, remainder first.
pub(crate) fn compute_jobs_per_task(jobs: usize, tasks: usize) -> Vec<usize> {
    let q = jobs / tasks;
    let r = jobs % tasks;
    (0..tasks).map(|t| q + usize::from(t < r)).collect()
}

pub struct Bwt;

impl Bwt {
    pub fn new() -> Bwt {
        Bwt
    }
}

impl Default for Bwt {
    fn default() -> Self {
        Bwt::new()
    }
}

fn write_header(dst: &mut [u8], indexes: &[usize]) -> usize {
    let max = indexes.iter().copied().max().unwrap_or(0);
    let index_size = (crate::global::log2(max.max(1) as u64) / 8 + 1) as usize;
    let chunks = indexes.len();
    dst[0] = ((chunks.trailing_zeros() as u8) << 2) | (index_size as u8 - 1);
    let mut j = 1;
    for &p in indexes {
        for k in (0..index_size).rev() {
            dst[j] = (p >> (8 * k)) as u8;
            j += 1;
        }
    }
    j
}

fn read_header(src: &[u8], n_hint: usize) -> Result<(Vec<usize>, usize)> {
    let mode = *src
        .first()
        .ok_or_else(|| Error::corruption("missing bwt header"))?;
    let log_chunks = (mode >> 2) as u32;
    let index_size = (mode & 3) as usize + 1;
    if log_chunks > 3 {
        return Err(Error::corruption("invalid bwt chunk count"));
    }
    let chunks = 1usize << log_chunks;
    let mut indexes = Vec::with_capacity(chunks);
    let mut j = 1usize;
    for _ in 0..chunks {
        if j + index_size > src.len() {
            return Err(Error::corruption("truncated bwt header"));
        }
        let mut p = 0usize;
        for _ in 0..index_size {
            p = (p << 8) | src[j] as usize;
            j += 1;
        }
        if p == 0 || p > n_hint {
            return Err(Error::corruption("bwt primary index out of range"));
        }
        indexes.push(p);
    }
    Ok((indexes, j))
}

/// Sentinel-style BWT from the suffix array. Returns the row of each chunk's
/// first suffix; `out` receives the n transform bytes.
fn forward_bwt(src: &[u8], out: &mut [u8]) -> Vec<usize> {
    let n = src.len();
    let sa = suffix_array(src);
    let chunks = bwt_chunks(n);
    let step = n.div_ceil(chunks);
    let mut indexes = vec![0usize; chunks];

    out[0] = src[n - 1];
    let mut pidx = 0usize;
    for (k, &p) in sa.iter().enumerate() {
        if p == 0 {
            pidx = k + 1;
            break;
        }
    }
    indexes[0] = pidx;
    for (k, &p) in sa.iter().enumerate() {
        let p = p as usize;
        let row = k + 1;
        if p == 0 {
            continue;
        }
        if p % step == 0 {
            indexes[p / step] = row;
        }
        let pos = if row < pidx { row } else { row - 1 };
        out[pos] = src[p - 1];
    }
    indexes
}

/// Packed single-array inverse for blocks up to 4 MiB.
fn inverse_merge_prev(bwt: &[u8], indexes: &[usize], out: &mut [u8]) -> Result<()> {
    let n = bwt.len();
    let pidx = indexes[0];
    let mut bucket = [0u32; 256];
    for &b in bwt {
        bucket[b as usize] += 1;
    }
    let mut sum = 1u32; // row 0 is the sentinel
    for c in 0..256 {
        let f = bucket[c];
        bucket[c] = sum;
        sum += f;
    }
    let mut data = vec![0u32; n];
    for (k, &b) in bwt.iter().enumerate() {
        let c = b as usize;
        data[k] = (bucket[c] << 8) | b as u32;
        bucket[c] += 1;
    }

    let chunks = indexes.len();
    let step = n.div_ceil(chunks);
    for c in 0..chunks {
        let chunk_start = c * step;
        let chunk_end = ((c + 1) * step).min(n);
        // The chase starting at the next chunk's row emits this chunk
        // backwards; the last chunk starts from the sentinel row.
        let mut row = if c + 1 < chunks { indexes[c + 1] } else { 0 };
        for pos in (chunk_start..chunk_end).rev() {
            let k = if row > pidx { row - 1 } else { row };
            let v = *data
                .get(k)
                .ok_or_else(|| Error::corruption("bwt row out of range"))?;
            out[pos] = v as u8;
            row = (v >> 8) as usize;
        }
    }
    Ok(())
}

/// Unpacked inverse for large blocks; chunk chases run on rayon tasks over
/// disjoint output slices, two symbols per loop iteration.
fn inverse_big(bwt: &[u8], indexes: &[usize], out: &mut [u8], jobs: usize) -> Result<()> {
    let n = bwt.len();
    let pidx = indexes[0];
    let mut bucket = vec![0u32; 256];
    for &b in bwt {
        bucket[b as usize] += 1;
    }
    let mut sum = 1u32;
    for c in 0..256 {
        let f = bucket[c];
        bucket[c] = sum;
        sum += f;
    }
    let mut next = vec![0u32; n];
    for (k, &b) in bwt.iter().enumerate() {
        let c = b as usize;
        next[k] = bucket[c];
        bucket[c] += 1;
    }

    let chunks = indexes.len();
    let step = n.div_ceil(chunks);
    // Split the output at chunk boundaries so tasks own disjoint regions.
    let mut slices: Vec<(usize, &mut [u8])> = Vec::with_capacity(chunks);
    let mut rest = out;
    let mut offset = 0usize;
    for c in 0..chunks {
        let end = (((c + 1) * step).min(n)).max(offset);
        let (head, tail) = rest.split_at_mut(end - offset);
        slices.push((c, head));
        rest = tail;
        offset = end;
    }

    // Group the chunk chases over min(jobs, chunks) tasks.
    let tasks = jobs.clamp(1, chunks);
    let per_task = compute_jobs_per_task(chunks, tasks);
    let mut groups: Vec<Vec<(usize, &mut [u8])>> = Vec::with_capacity(tasks);
    let mut it = slices.into_iter();
    for &count in &per_task {
        groups.push((&mut it).take(count).collect());
    }

    let next_ref = &next;
    let chase = |c: usize, slice: &mut [u8]| -> Result<()> {
        let mut row = if c + 1 < chunks { indexes[c + 1] } else { 0 };
        let mut pos = slice.len();
        // Two symbols per iteration.
        while pos >= 2 {
            let k = if row > pidx { row - 1 } else { row };
            let b1 = *bwt
                .get(k)
                .ok_or_else(|| Error::corruption("bwt row out of range"))?;
            row = next_ref[k] as usize;
            let k = if row > pidx { row - 1 } else { row };
            let b2 = *bwt
                .get(k)
                .ok_or_else(|| Error::corruption("bwt row out of range"))?;
            row = next_ref[k] as usize;
            slice[pos - 1] = b1;
            slice[pos - 2] = b2;
            pos -= 2;
        }
        if pos == 1 {
            let k = if row > pidx { row - 1 } else { row };
            slice[0] = *bwt
                .get(k)
                .ok_or_else(|| Error::corruption("bwt row out of range"))?;
        }
        Ok(())
    };
    groups
        .into_par_iter()
        .map(|group| {
            for (c, slice) in group {
                chase(c, slice)?;
            }
            Ok(())
        })
        .collect::<Vec<Result<()>>>()
        .into_iter()
        .collect::<Result<Vec<()>>>()?;
    Ok(())
}

impl ByteTransform for Bwt {
    fn forward(&mut self, _ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let n = src.len();
        if n == 0 {
            return Err(Error::Skip("empty block"));
        }
        if n > MAX_BWT_BLOCK {
            return Err(Error::Skip("block exceeds bwt limit"));
        }
        if n < 2 {
            // Degenerate: header + byte.
            dst[0] = 0;
            dst[1] = 1;
            dst[2] = src[0];
            return Ok((n, 3));
        }
        let chunks = bwt_chunks(n);
        let mut payload = vec![0u8; n];
        let indexes = forward_bwt(src, &mut payload);
        let header_len = 1 + chunks * 4;
        if header_len + n > dst.len() {
            return Err(Error::capacity("bwt output buffer too small"));
        }
        let h = write_header(dst, &indexes);
        dst[h..h + n].copy_from_slice(&payload);
        Ok((n, h + n))
    }

    fn inverse(&mut self, ctx: &mut Context, src: &[u8], dst: &mut [u8]) -> Result<(usize, usize)> {
        let (indexes, header_len) = read_header(src, dst.len().max(src.len()))?;
        let bwt = &src[header_len..];
        let n = bwt.len();
        if n > dst.len() {
            return Err(Error::corruption("decoded size exceeds block size"));
        }
        if indexes.len() != bwt_chunks(n) {
            return Err(Error::corruption("bwt chunk count mismatch"));
        }
        for &p in &indexes {
            if p > n {
                return Err(Error::corruption("bwt primary index out of range"));
            }
        }
        if n == 0 {
            return Ok((src.len(), 0));
        }
        if n <= MERGE_PREV_LIMIT {
            inverse_merge_prev(bwt, &indexes, &mut dst[..n])?;
        } else {
            inverse_big(bwt, &indexes, &mut dst[..n], ctx.jobs)?;
        }
        Ok((src.len(), n))
    }

    fn max_encoded_len(&self, src_len: usize) -> usize {
        src_len + 1 + 8 * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8], jobs: usize) -> Vec<u8> {
        let bwt = Bwt::new();
        let mut ctx = Context::default();
        ctx.jobs = jobs;
        let mut enc = vec![0u8; bwt.max_encoded_len(data.len())];
        let (_, written) = Bwt::new().forward(&mut ctx, data, &mut enc).unwrap();
        enc.truncate(written);
        let mut out = vec![0u8; data.len()];
        let (_, m) = Bwt::new().inverse(&mut ctx, &enc, &mut out).unwrap();
        assert_eq!(m, data.len());
        assert_eq!(out, data);
        enc
    }

    #[test]
    fn mississippi_reference_output() {
        let enc = roundtrip(b"mississippi", 1);
        // Single chunk, one-byte index: mode 0, primary index 5.
        assert_eq!(enc[0], 0);
        assert_eq!(enc[1], 5);
        assert_eq!(&enc[2..], b"ipssmpissii");
    }

    #[test]
    fn eight_chunks_above_256_bytes() {
        let data: Vec<u8> = b"chunked burrows wheeler "
            .iter()
            .cycle()
            .take(4096)
            .copied()
            .collect();
        let enc = roundtrip(&data, 1);
        assert_eq!(enc[0] >> 2, 3, "log2(chunks) must be 3");
    }

    #[test]
    fn job_counts_agree() {
        let data: Vec<u8> = (0..50_000u32).map(|i| (i * 31 % 253) as u8).collect();
        let reference = roundtrip(&data, 1);
        for jobs in [2usize, 4, 8] {
            assert_eq!(roundtrip(&data, jobs), reference);
        }
    }

    #[test]
    fn degenerate_inputs() {
        roundtrip(b"a", 1);
        roundtrip(b"ab", 1);
        roundtrip(&[7u8; 300], 1);
    }

    #[test]
    fn corrupt_primary_index_is_rejected() {
        let mut enc = roundtrip(b"mississippi", 1);
        enc[1] = 200; // beyond the 11-byte block
        let mut ctx = Context::default();
        let mut out = vec![0u8; 11];
        assert!(Bwt::new().inverse(&mut ctx, &enc, &mut out).is_err());
    }

    #[test]
    fn jobs_split_evenly() {
        assert_eq!(compute_jobs_per_task(8, 8), vec![1; 8]);
        assert_eq!(compute_jobs_per_task(3, 2), vec![2, 1]);
        assert_eq!(compute_jobs_per_task(1, 8), vec![1, 0, 0, 0, 0, 0, 0, 0]);
    }
}
