//! Block stream mechanics: header metadata, block windows, terminator
//! handling, streaming writes.

#[path = "common/corpus.rs"]
mod corpus;

use std::io::{Read, Write};

use kanzi::block::ChecksumMode;
use kanzi::{CompressedInputStream, CompressedOutputStream, WriterConfig};

fn sample_config() -> WriterConfig {
    WriterConfig {
        block_size: 16 * 1024,
        checksum: ChecksumMode::X32,
        entropy: kanzi::entropy_id("HUFFMAN").unwrap(),
        transform_ids: kanzi::parse_chain("PACK+LZ").unwrap(),
        jobs: 3,
        original_size: Some(123_456),
    }
}

#[test]
fn header_metadata_survives_the_trip() {
    let data = corpus::text_bytes(123_456);
    let enc = kanzi::compress(&data, sample_config()).unwrap();
    let r = CompressedInputStream::new(&enc[..], 1).unwrap();
    let info = r.info();
    assert_eq!(info.bs_version, kanzi::BITSTREAM_VERSION);
    assert_eq!(info.block_size, 16 * 1024);
    assert_eq!(info.checksum, ChecksumMode::X32);
    assert_eq!(kanzi::entropy_name(info.entropy), "HUFFMAN");
    assert_eq!(kanzi::chain_name(&info.transform_ids), "PACK+LZ");
    assert_eq!(info.original_size, Some(123_456));
}

#[test]
fn dribbled_writes_equal_bulk_writes() {
    let data = corpus::text_bytes(70_000);
    let bulk = kanzi::compress(&data, sample_config()).unwrap();

    let mut out = Vec::new();
    let mut w = CompressedOutputStream::new(&mut out, sample_config()).unwrap();
    for chunk in data.chunks(137) {
        w.write_all(chunk).unwrap();
    }
    w.close().unwrap();
    drop(w);
    assert_eq!(out, bulk);
}

#[test]
fn block_window_selects_middle_blocks() {
    // 8 blocks of 16 KiB; decode only blocks 3 and 4.
    let data = corpus::text_bytes(8 * 16 * 1024);
    let enc = kanzi::compress(&data, sample_config()).unwrap();
    let mut r = CompressedInputStream::with_range(&enc[..], 2, 3, 5).unwrap();
    let mut out = Vec::new();
    r.read_to_end(&mut out).unwrap();
    assert_eq!(out, &data[2 * 16 * 1024..4 * 16 * 1024]);
}

#[test]
fn trailing_garbage_after_terminator_is_ignored() {
    let data = corpus::text_bytes(5_000);
    let mut enc = kanzi::compress(&data, sample_config()).unwrap();
    enc.extend_from_slice(b"trailing junk");
    assert_eq!(kanzi::decompress(&enc, 1).unwrap(), data);
}

#[test]
fn copy_blocks_checksum_random_data() {
    let data = corpus::random_bytes(64 * 1024, 99);
    let mut cfg = sample_config();
    cfg.checksum = ChecksumMode::X64;
    let mut enc = kanzi::compress(&data, cfg).unwrap();
    assert_eq!(kanzi::decompress(&enc, 2).unwrap(), data);
    let pos = enc.len() - 100;
    enc[pos] ^= 1;
    assert!(kanzi::decompress(&enc, 2).is_err());
}

#[test]
fn unsupported_entropy_id_is_rejected_at_creation() {
    let cfg = WriterConfig {
        entropy: 7, // TPAQ: recognized name, unsupported codec
        ..sample_config()
    };
    assert!(CompressedOutputStream::new(Vec::new(), cfg).is_err());
}
