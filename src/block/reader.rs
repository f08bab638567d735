//! Block reader: parses the stream header, reads block records
//! sequentially, and fans block decoding out to the worker pool while
//! emitting decoded bytes strictly in block order.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam_channel::unbounded;

use crate::bitstream::BitReader;
use crate::entropy::{self, EntropyDecoder};
use crate::error::{Error, Result};
use crate::transform::{self, Sequence};
use crate::types::Context;

use super::{block_checksum, read_varint_from, ChecksumMode, MAGIC, MAX_BLOCK_SIZE};

/// Parsed stream header, also served to the `--info` listing.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub bs_version: u32,
    pub checksum: ChecksumMode,
    pub entropy: u8,
    pub transform_ids: Vec<u8>,
    pub block_size: usize,
    pub original_size: Option<u64>,
}

/// One block record lifted off the stream, ready for a worker.
struct BlockRecord {
    index: u64,
    copy: bool,
    skip_flags: u8,
    stored_checksum: Option<u64>,
    pre_len: usize,
    payload: Vec<u8>,
}

/// Decompressing source implementing [`Read`].
pub struct CompressedInputStream<R: Read> {
    src: R,
    info: StreamInfo,
    pool: crate::pool::WorkerPool,
    jobs: usize,
    out: Vec<u8>,
    out_pos: usize,
    next_index: u64,
    eof: bool,
    /// First block to emit and first block to stop at (1-based, `to`
    /// exclusive); blocks outside the window are skipped without decoding.
    from_block: u64,
    to_block: u64,
}

impl<R: Read> CompressedInputStream<R> {
    pub fn new(src: R, jobs: usize) -> Result<CompressedInputStream<R>> {
        Self::with_range(src, jobs, 0, u64::MAX)
    }

    /// Restrict decoding to block indexes in `[from, to)`; 0 means no bound.
    pub fn with_range(
        mut src: R,
        jobs: usize,
        from: u64,
        to: u64,
    ) -> Result<CompressedInputStream<R>> {
        let jobs = jobs.clamp(1, 64);
        let info = read_stream_header(&mut src)?;
        entropy::new_decoder(info.entropy, &Context::default())?;
        let pool = crate::pool::WorkerPool::new(jobs, jobs * 2)?;
        Ok(CompressedInputStream {
            src,
            info,
            pool,
            jobs,
            out: Vec::new(),
            out_pos: 0,
            next_index: 1,
            eof: false,
            from_block: from,
            to_block: if to == 0 { u64::MAX } else { to },
        })
    }

    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    /// Read one block record off the stream. `None` on the terminator.
    fn read_record(&mut self) -> Result<Option<BlockRecord>> {
        let mut mode = [0u8; 1];
        self.src.read_exact(&mut mode)?;
        let mode = mode[0];
        let index = self.next_index;
        self.next_index += 1;

        if mode & 0x80 != 0 {
            // Copy block: raw length, checksum, verbatim bytes.
            let len_size = (mode & 0x07) as usize;
            if len_size == 0 || len_size > 4 {
                return Err(Error::corruption("invalid copy block mode byte"));
            }
            let len = self.read_be(len_size)? as usize;
            if len == 0 || len > self.info.block_size {
                return Err(Error::corruption("invalid copy block length"));
            }
            let stored_checksum = self.read_checksum()?;
            let mut payload = vec![0u8; len];
            self.src.read_exact(&mut payload)?;
            return Ok(Some(BlockRecord {
                index,
                copy: true,
                skip_flags: 0,
                stored_checksum,
                pre_len: len,
                payload,
            }));
        }

        let v = mode & 0x7F;
        let payload_bits = if v <= 4 {
            if v == 0 {
                return Err(Error::corruption("invalid block length size"));
            }
            self.read_be(v as usize)?
        } else {
            1u64 << v
        };
        if payload_bits == 0 {
            return Ok(None); // stream terminator
        }
        let mut skip = [0u8; 1];
        self.src.read_exact(&mut skip)?;
        let stored_checksum = self.read_checksum()?;
        let pre_len = read_varint_from(&mut self.src)? as usize;
        let max_pre = transform_bound(&self.info);
        if pre_len == 0 || pre_len > max_pre {
            return Err(Error::corruption("invalid pre-transform size"));
        }
        let payload_len = (payload_bits as usize).div_ceil(8);
        let mut payload = vec![0u8; payload_len];
        self.src.read_exact(&mut payload)?;
        Ok(Some(BlockRecord {
            index,
            copy: false,
            skip_flags: skip[0],
            stored_checksum,
            pre_len,
            payload,
        }))
    }

    fn read_be(&mut self, bytes: usize) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.src.read_exact(&mut buf[..bytes])?;
        let mut v = 0u64;
        for &b in &buf[..bytes] {
            v = (v << 8) | u64::from(b);
        }
        Ok(v)
    }

    fn read_checksum(&mut self) -> Result<Option<u64>> {
        match self.info.checksum {
            ChecksumMode::None => Ok(None),
            ChecksumMode::X32 => {
                let mut b = [0u8; 4];
                self.src.read_exact(&mut b)?;
                Ok(Some(u64::from(u32::from_be_bytes(b))))
            }
            ChecksumMode::X64 => {
                let mut b = [0u8; 8];
                self.src.read_exact(&mut b)?;
                Ok(Some(u64::from_be_bytes(b)))
            }
        }
    }

    /// Pull the next batch of blocks through the pool into `self.out`.
    fn fill(&mut self) -> Result<()> {
        self.out.clear();
        self.out_pos = 0;
        if self.pool.is_cancelled() {
            return Err(Error::corruption("stream aborted after block failure"));
        }
        if self.eof {
            return Ok(());
        }
        // Collect up to `jobs` decodable records.
        let mut records = Vec::new();
        while records.len() < self.jobs {
            if self.next_index >= self.to_block {
                self.eof = true;
                break;
            }
            match self.read_record()? {
                None => {
                    self.eof = true;
                    break;
                }
                // Records before the window are consumed but never decoded.
                Some(rec) if rec.index < self.from_block => continue,
                Some(rec) => records.push(rec),
            }
        }
        if records.is_empty() {
            return Ok(());
        }

        let jobs_per =
            crate::transform::bwt::compute_jobs_per_task(self.jobs, records.len());
        let (tx, rx) = unbounded::<(u64, Result<Vec<u8>>)>();
        let cancel = self.pool.cancel_flag();
        let first = records[0].index;
        let total = records.len();
        for (k, rec) in records.into_iter().enumerate() {
            let tx = tx.clone();
            let cancel = Arc::clone(&cancel);
            let info = self.info.clone();
            let task_jobs = jobs_per[k].max(1);
            self.pool.submit(Box::new(move || {
                let index = rec.index;
                let result = if cancel.load(Ordering::SeqCst) {
                    Err(Error::Skip("cancelled"))
                } else {
                    decode_block(rec, &info, task_jobs).inspect_err(|e| {
                        if !e.is_skip() {
                            cancel.store(true, Ordering::SeqCst);
                        }
                    })
                };
                let _ = tx.send((index, result));
            }));
        }
        drop(tx);

        let mut pending: BTreeMap<u64, Result<Vec<u8>>> = BTreeMap::new();
        for _ in 0..total {
            let (index, result) = rx
                .recv()
                .map_err(|_| Error::capacity("worker channel closed"))?;
            pending.insert(index, result);
        }
        let mut first_error: Option<Error> = None;
        for index in first..first + total as u64 {
            match pending.remove(&index) {
                Some(Ok(bytes)) => {
                    if first_error.is_none() {
                        self.out.extend_from_slice(&bytes);
                    }
                }
                Some(Err(e)) => {
                    if first_error.is_none() && !e.is_skip() {
                        first_error = Some(e);
                    }
                }
                None => return Err(Error::corruption("missing block result")),
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        Ok(())
    }
}

impl<R: Read> Read for CompressedInputStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.out_pos >= self.out.len() {
            if self.eof {
                return Ok(0);
            }
            self.fill()
                .map_err(|e| std::io::Error::other(e.to_string()))?;
            if self.out.is_empty() {
                return Ok(0);
            }
        }
        let n = (self.out.len() - self.out_pos).min(buf.len());
        buf[..n].copy_from_slice(&self.out[self.out_pos..self.out_pos + n]);
        self.out_pos += n;
        Ok(n)
    }
}

/// Largest pre-transform payload any stage may legally produce.
fn transform_bound(info: &StreamInfo) -> usize {
    let ctx = Context::new(info.block_size, info.bs_version);
    match Sequence::new(&info.transform_ids, &ctx) {
        Ok(seq) => seq.max_encoded_len(info.block_size),
        Err(_) => info.block_size,
    }
}

fn read_stream_header<R: Read>(src: &mut R) -> Result<StreamInfo> {
    let mut head = [0u8; 15];
    src.read_exact(&mut head).map_err(|_| {
        Error::corruption("stream too short for a header")
    })?;
    let mut br = BitReader::new(&head);
    let magic = br.read_bits(32)? as u32;
    if magic != MAGIC {
        return Err(Error::corruption("bad magic, not a kanzi stream"));
    }
    let bs_version = br.read_bits(4)? as u32;
    if !(3..=crate::BITSTREAM_VERSION).contains(&bs_version) {
        return Err(Error::corruption(format!(
            "unsupported bitstream version {bs_version}"
        )));
    }
    let checksum = ChecksumMode::from_code(br.read_bits(2)?)?;
    let entropy = br.read_bits(5)? as u8;
    let chain = br.read_bits(48)?;
    let block_kib = br.read_bits(28)? as usize;
    if block_kib == 0 || block_kib > MAX_BLOCK_SIZE / 1024 {
        return Err(Error::corruption("block size out of range"));
    }
    let has_size = br.read_bit()? == 1;
    let original_size = if has_size {
        let mut b = [0u8; 8];
        src.read_exact(&mut b)?;
        Some(u64::from_be_bytes(b))
    } else {
        None
    };
    let transform_ids = transform::unpack_chain(chain);
    for &id in &transform_ids {
        if transform::transform_name(id) == "UNKNOWN" {
            return Err(Error::corruption(format!("unknown transform id {id} in header")));
        }
    }
    Ok(StreamInfo {
        bs_version,
        checksum,
        entropy,
        transform_ids,
        block_size: block_kib * 1024,
        original_size,
    })
}

// ── Per-block decoding ───────────────────────────────────────────────────────

fn decode_block(rec: BlockRecord, info: &StreamInfo, task_jobs: usize) -> Result<Vec<u8>> {
    let data = if rec.copy {
        rec.payload
    } else {
        let mut ctx = Context::new(info.block_size, info.bs_version);
        ctx.entropy = info.entropy;
        ctx.transform = transform::pack_chain(&info.transform_ids).unwrap_or(0);
        ctx.jobs = task_jobs;

        let mut pre = vec![0u8; rec.pre_len];
        let mut br = BitReader::new(&rec.payload);
        let mut dec = entropy::new_decoder(info.entropy, &ctx)?;
        dec.decode(&mut pre, &mut br)?;

        let mut seq = Sequence::new(&info.transform_ids, &ctx)?;
        let out = seq.inverse(&mut ctx, &pre, rec.skip_flags, info.block_size)?;
        if out.len() > info.block_size {
            return Err(Error::corruption("decoded block exceeds block size"));
        }
        out
    };
    if let Some(stored) = rec.stored_checksum {
        let computed = block_checksum(info.checksum, &data, crate::BITSTREAM_VERSION)
            .unwrap_or_default();
        if computed != stored {
            return Err(Error::corruption(format!(
                "checksum mismatch in block {}",
                rec.index
            )));
        }
    }
    Ok(data)
}
