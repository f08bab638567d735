//! Block writer: slices the input into blocks, fans them out to the worker
//! pool, and writes self-describing encoded blocks in index order.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam_channel::unbounded;

use crate::bitstream::BitWriter;
use crate::entropy::{self, EntropyEncoder};
use crate::error::{Error, Result};
use crate::global::{compute_histogram, detect_simple_type};
use crate::transform::{self, Sequence};
use crate::types::Context;

use super::{
    block_checksum, normalize_block_size, push_varint, ChecksumMode, DEFAULT_BLOCK_SIZE, MAGIC,
};

/// Stream-level parameters fixed at creation time.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub block_size: usize,
    pub checksum: ChecksumMode,
    pub entropy: u8,
    pub transform_ids: Vec<u8>,
    pub jobs: usize,
    pub original_size: Option<u64>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            block_size: DEFAULT_BLOCK_SIZE,
            checksum: ChecksumMode::None,
            entropy: entropy::NONE_TYPE,
            transform_ids: Vec::new(),
            jobs: 1,
            original_size: None,
        }
    }
}

/// Compressing sink implementing [`Write`]. Data is buffered into blocks;
/// full batches are dispatched to the pool and drained in block order.
/// [`close`](CompressedOutputStream::close) flushes the tail block and the
/// stream terminator.
pub struct CompressedOutputStream<W: Write> {
    sink: W,
    cfg: WriterConfig,
    pool: crate::pool::WorkerPool,
    buf: Vec<u8>,
    next_index: u64,
    header_written: bool,
    closed: bool,
    compressed: u64,
}

impl<W: Write> CompressedOutputStream<W> {
    pub fn new(sink: W, mut cfg: WriterConfig) -> Result<CompressedOutputStream<W>> {
        cfg.block_size = normalize_block_size(cfg.block_size);
        cfg.jobs = cfg.jobs.clamp(1, 64);
        entropy::new_encoder(cfg.entropy, &Context::default())?;
        if cfg.transform_ids.len() > transform::MAX_STAGES {
            return Err(Error::invalid_param("too many transform stages"));
        }
        let pool = crate::pool::WorkerPool::new(cfg.jobs, cfg.jobs * 2)?;
        Ok(CompressedOutputStream {
            sink,
            cfg,
            pool,
            buf: Vec::new(),
            next_index: 1,
            header_written: false,
            closed: false,
            compressed: 0,
        })
    }

    /// Total bytes written to the underlying sink so far.
    pub fn compressed_size(&self) -> u64 {
        self.compressed
    }

    fn write_stream_header(&mut self) -> Result<()> {
        let mut bw = BitWriter::with_capacity(24);
        bw.write_bits(u64::from(MAGIC), 32);
        bw.write_bits(u64::from(crate::BITSTREAM_VERSION), 4);
        bw.write_bits(self.cfg.checksum.code(), 2);
        bw.write_bits(u64::from(self.cfg.entropy), 5);
        bw.write_bits(transform::pack_chain(&self.cfg.transform_ids)?, 48);
        bw.write_bits(self.cfg.block_size.div_ceil(1024) as u64, 28);
        match self.cfg.original_size {
            Some(size) => {
                bw.write_bit(1);
                bw.write_bits(size, 64);
            }
            None => bw.write_bit(0),
        }
        bw.align();
        let header = bw.close();
        self.sink.write_all(&header)?;
        self.compressed += header.len() as u64;
        self.header_written = true;
        Ok(())
    }

    /// Encode and emit `count` whole blocks from the front of the buffer
    /// (the final call may pass a trailing partial block).
    fn drain_blocks(&mut self, count: usize) -> Result<()> {
        if self.pool.is_cancelled() {
            // A previous batch failed; nothing may be emitted after that.
            return Err(Error::capacity("stream aborted after block failure"));
        }
        if !self.header_written {
            self.write_stream_header()?;
        }
        if count == 0 {
            return Ok(());
        }
        let bs = self.cfg.block_size;
        let take = (count * bs).min(self.buf.len());
        let data: Vec<u8> = self.buf.drain(..take).collect();
        let blocks: Vec<Vec<u8>> = data.chunks(bs).map(<[u8]>::to_vec).collect();
        let jobs_per = crate::transform::bwt::compute_jobs_per_task(self.cfg.jobs, blocks.len());

        let (tx, rx) = unbounded::<(u64, Result<Vec<u8>>)>();
        let cancel = self.pool.cancel_flag();
        let expected_first = self.next_index;
        let total = blocks.len();
        for (k, block) in blocks.into_iter().enumerate() {
            let index = self.next_index;
            self.next_index += 1;
            let tx = tx.clone();
            let cancel = Arc::clone(&cancel);
            let cfg = self.cfg.clone();
            let task_jobs = jobs_per[k].max(1);
            self.pool.submit(Box::new(move || {
                let result = if cancel.load(Ordering::SeqCst) {
                    Err(Error::Skip("cancelled"))
                } else {
                    encode_block(&block, &cfg, task_jobs).inspect_err(|e| {
                        if !e.is_skip() {
                            cancel.store(true, Ordering::SeqCst);
                        }
                    })
                };
                let _ = tx.send((index, result));
            }));
        }
        drop(tx);

        // Park out-of-order completions until the next expected index lands.
        let mut pending: BTreeMap<u64, Result<Vec<u8>>> = BTreeMap::new();
        for _ in 0..total {
            let (index, result) = rx
                .recv()
                .map_err(|_| Error::capacity("worker channel closed"))?;
            pending.insert(index, result);
        }
        let mut first_error: Option<Error> = None;
        for index in expected_first..expected_first + total as u64 {
            match pending.remove(&index) {
                Some(Ok(bytes)) => {
                    if first_error.is_none() {
                        self.sink.write_all(&bytes)?;
                        self.compressed += bytes.len() as u64;
                    }
                }
                Some(Err(e)) => {
                    if first_error.is_none() && !e.is_skip() {
                        first_error = Some(e);
                    }
                }
                None => {
                    return Err(Error::capacity("missing block result"));
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        Ok(())
    }

    /// Flush remaining data, write the terminator and flush the sink.
    /// Idempotent; the stream accepts no writes afterwards.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.pool.is_cancelled() {
            return Err(Error::capacity("stream aborted after block failure"));
        }
        while !self.buf.is_empty() {
            let blocks = self.buf.len().div_ceil(self.cfg.block_size).min(self.cfg.jobs);
            self.drain_blocks(blocks)?;
        }
        if !self.header_written {
            self.write_stream_header()?;
        }
        // Terminator: a normal block with a zero payload bit-length.
        self.sink.write_all(&[0x01, 0x00])?;
        self.compressed += 2;
        self.sink.flush()?;
        self.closed = true;
        Ok(())
    }
}

impl<W: Write> Write for CompressedOutputStream<W> {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        if self.closed {
            return Err(std::io::Error::other("stream already closed"));
        }
        self.buf.extend_from_slice(data);
        let batch = self.cfg.block_size * self.cfg.jobs;
        while self.buf.len() >= batch {
            self.drain_blocks(self.cfg.jobs)
                .map_err(|e| std::io::Error::other(e.to_string()))?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        // Partial blocks cannot be flushed early; pass through to the sink.
        self.sink.flush()
    }
}

impl<W: Write> Drop for CompressedOutputStream<W> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

// ── Per-block encoding ───────────────────────────────────────────────────────

/// Encode one block into its wire representation (§ block format in the
/// module docs). Transform-local skips are folded into the skip-flag byte;
/// a block that ends up no smaller than its raw form is stored as a copy
/// block without any entropy coding.
pub(crate) fn encode_block(data: &[u8], cfg: &WriterConfig, task_jobs: usize) -> Result<Vec<u8>> {
    let checksum = block_checksum(cfg.checksum, data, crate::BITSTREAM_VERSION);

    // The context carries the header's view of the block size (KiB ceiling)
    // so size-derived parameters agree with the decoder.
    let header_block_size = cfg.block_size.div_ceil(1024) * 1024;
    let mut ctx = Context::new(header_block_size, crate::BITSTREAM_VERSION);
    ctx.entropy = cfg.entropy;
    ctx.transform = transform::pack_chain(&cfg.transform_ids)?;
    ctx.jobs = task_jobs;
    ctx.file_size = cfg.original_size;
    if !cfg.transform_ids.is_empty() {
        let mut freqs = [0u32; 256];
        compute_histogram(data, &mut freqs);
        ctx.data_type = detect_simple_type(data.len(), &freqs);
    }

    let mut seq = Sequence::new(&cfg.transform_ids, &ctx)?;
    let (payload, skip_flags) = seq.forward(&mut ctx, data)?;

    let mut bw = BitWriter::with_capacity(payload.len() + 1024);
    let mut enc = entropy::new_encoder(cfg.entropy, &ctx)?;
    enc.encode(&payload, &mut bw)?;
    enc.dispose(&mut bw);
    let payload_bits = bw.written();
    let enc_bytes = bw.close();

    let checksum_bytes = (cfg.checksum.bits() / 8) as usize;
    let normal_size = 1 + 4 + 1 + checksum_bytes + 5 + enc_bytes.len();
    if payload_bits >= 1 << 32 || normal_size >= 1 + 4 + checksum_bytes + data.len() {
        return Ok(copy_block(data, cfg, checksum));
    }

    let mut out = Vec::with_capacity(enc_bytes.len() + 16 + checksum_bytes);
    if payload_bits.is_power_of_two() && payload_bits >= 32 {
        out.push(crate::global::log2(payload_bits) as u8);
    } else {
        let len_size = ((crate::global::log2(payload_bits.max(1)) / 8) + 1) as usize;
        out.push(len_size as u8);
        for k in (0..len_size).rev() {
            out.push((payload_bits >> (8 * k)) as u8);
        }
    }
    out.push(skip_flags);
    push_checksum(&mut out, cfg.checksum, checksum);
    push_varint(&mut out, payload.len() as u64);
    out.extend_from_slice(&enc_bytes);
    Ok(out)
}

fn copy_block(data: &[u8], cfg: &WriterConfig, checksum: Option<u64>) -> Vec<u8> {
    let len = data.len() as u64;
    let len_size = ((crate::global::log2(len.max(1)) / 8) + 1) as usize;
    let mut out = Vec::with_capacity(data.len() + 16);
    out.push(0x80 | len_size as u8);
    for k in (0..len_size).rev() {
        out.push((len >> (8 * k)) as u8);
    }
    push_checksum(&mut out, cfg.checksum, checksum);
    out.extend_from_slice(data);
    out
}

fn push_checksum(out: &mut Vec<u8>, mode: ChecksumMode, checksum: Option<u64>) {
    match (mode, checksum) {
        (ChecksumMode::X32, Some(h)) => out.extend_from_slice(&(h as u32).to_be_bytes()),
        (ChecksumMode::X64, Some(h)) => out.extend_from_slice(&h.to_be_bytes()),
        _ => {}
    }
}
