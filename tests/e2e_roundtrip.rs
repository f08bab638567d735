//! End-to-end stream round trips: every level preset over the fixed corpus,
//! plus the documented reference scenarios.

#[path = "common/corpus.rs"]
mod corpus;

use kanzi::block::ChecksumMode;
use kanzi::{compress, decompress, WriterConfig};

fn config(level: u32, block_size: usize, checksum: ChecksumMode) -> WriterConfig {
    let (chain, entropy) = kanzi::cli::level_preset(level).unwrap();
    WriterConfig {
        block_size,
        checksum,
        entropy: kanzi::entropy_id(entropy).unwrap(),
        transform_ids: kanzi::parse_chain(chain).unwrap(),
        jobs: 2,
        original_size: None,
    }
}

fn roundtrip_level(level: u32, block_size: usize, data: &[u8]) -> Vec<u8> {
    let cfg = config(level, block_size, ChecksumMode::X32);
    let enc = compress(data, cfg).unwrap_or_else(|e| panic!("level {level}: {e}"));
    let dec = decompress(&enc, 2).unwrap_or_else(|e| panic!("level {level}: {e}"));
    assert_eq!(dec, data, "level {level} block {block_size} mismatch");
    enc
}

#[test]
fn mississippi_through_bwt_only() {
    let cfg = WriterConfig {
        block_size: 1024,
        checksum: ChecksumMode::None,
        entropy: kanzi::entropy_id("NONE").unwrap(),
        transform_ids: kanzi::parse_chain("BWT").unwrap(),
        jobs: 1,
        original_size: None,
    };
    // Tiny blocks fall back to a copy block (the transform plus its header
    // cannot beat 11 raw bytes), but the trip must still be exact; the
    // reference BWT output itself is pinned down in the transform tests.
    let enc = compress(b"mississippi", cfg).unwrap();
    assert_eq!(decompress(&enc, 1).unwrap(), b"mississippi");
}

#[test]
fn all_levels_roundtrip_text() {
    let data = corpus::text_bytes(300_000);
    for level in 0..=9 {
        roundtrip_level(level, 1 << 20, &data);
    }
}

#[test]
fn all_levels_roundtrip_mixed_corpus() {
    let inputs: Vec<Vec<u8>> = vec![
        corpus::random_bytes(100_000, 42),
        vec![0u8; 100_000],
        vec![b'A'; 100_000],
        corpus::utf8_bytes(120_000),
        corpus::x86_object(),
        corpus::arm64_object(),
        corpus::wav_bytes(40_000),
    ];
    for (i, data) in inputs.iter().enumerate() {
        for level in [0, 2, 3, 4, 5, 7, 9] {
            let cfg = config(level, 256 * 1024, ChecksumMode::X64);
            let enc = compress(data, cfg).unwrap_or_else(|e| panic!("input {i} level {level}: {e}"));
            let dec = decompress(&enc, 4).unwrap();
            assert_eq!(&dec, data, "input {i} level {level}");
        }
    }
}

#[test]
fn tiny_and_odd_block_sizes() {
    let data = corpus::text_bytes(10_000);
    // 64 MiB exercises the single-oversized-block path.
    for bs in [1024usize, 4096, 64 * 1024, 64 << 20] {
        roundtrip_level(5, bs, &data);
        roundtrip_level(2, bs, &data);
    }
}

#[test]
fn empty_input_roundtrips() {
    let enc = compress(&[], config(3, 1 << 20, ChecksumMode::None)).unwrap();
    assert_eq!(decompress(&enc, 1).unwrap(), Vec::<u8>::new());
}

#[test]
fn random_block_does_not_inflate() {
    // No compression expected; the copy-block fallback caps the overhead
    // well under 1% of the raw size.
    let data = corpus::random_bytes(1 << 20, 7);
    let cfg = config(5, 1 << 20, ChecksumMode::None);
    let enc = compress(&data, cfg).unwrap();
    assert!(enc.len() < data.len() + data.len() / 100);
    assert_eq!(decompress(&enc, 2).unwrap(), data);
}

#[test]
fn sixteen_mib_of_one_symbol_collapses() {
    let data = vec![b'A'; 16 << 20];
    let cfg = config(3, 4 << 20, ChecksumMode::None);
    let enc = compress(&data, cfg).unwrap();
    assert!(enc.len() < 1024, "got {} bytes", enc.len());
    assert_eq!(decompress(&enc, 4).unwrap(), data);
}

#[test]
fn corrupted_stream_fails_checksum() {
    let data = corpus::text_bytes(200_000);
    let cfg = config(3, 64 * 1024, ChecksumMode::X32);
    let mut enc = compress(&data, cfg).unwrap();
    // Flip one byte well inside a block payload.
    let pos = enc.len() / 2;
    enc[pos] ^= 0x20;
    assert!(decompress(&enc, 2).is_err());
}

#[test]
fn truncated_stream_is_rejected() {
    let data = corpus::text_bytes(50_000);
    let enc = compress(&data, config(2, 16 * 1024, ChecksumMode::None)).unwrap();
    assert!(decompress(&enc[..enc.len() / 2], 1).is_err());
    assert!(decompress(&enc[..10], 1).is_err());
}

#[test]
fn garbage_magic_is_rejected() {
    let err = decompress(b"not a kanzi stream at all...", 1).unwrap_err();
    assert!(err.to_string().contains("magic"));
}

#[test]
fn job_counts_do_not_change_output_bytes() {
    let data = corpus::text_bytes(2 << 20);
    let enc = compress(&data, config(5, 256 * 1024, ChecksumMode::X32)).unwrap();
    for jobs in [1usize, 2, 4, 8] {
        assert_eq!(decompress(&enc, jobs).unwrap(), data, "jobs = {jobs}");
    }
}
