//! BWT-specific end-to-end checks: chunked decode determinism across job
//! counts, including the large-block inverse path.

#[path = "common/corpus.rs"]
mod corpus;

use kanzi::transform::{self, ByteTransform};
use kanzi::types::Context;

fn bwt_roundtrip(data: &[u8], jobs: usize) -> Vec<u8> {
    let ctx0 = Context::default();
    let mut t = transform::new_transform(transform::BWT_ID, &ctx0).unwrap();
    let mut ctx = Context::default();
    ctx.jobs = jobs;
    let mut enc = vec![0u8; t.max_encoded_len(data.len())];
    let (_, written) = t.forward(&mut ctx, data, &mut enc).unwrap();
    enc.truncate(written);
    let mut out = vec![0u8; data.len()];
    let (_, m) = t.inverse(&mut ctx, &enc, &mut out).unwrap();
    assert_eq!(m, data.len());
    assert_eq!(&out, &data);
    enc
}

#[test]
fn eight_chunk_decode_is_job_count_invariant() {
    let data = corpus::text_bytes(200_000);
    let reference = bwt_roundtrip(&data, 1);
    for jobs in [2usize, 4, 8] {
        assert_eq!(bwt_roundtrip(&data, jobs), reference, "jobs {jobs}");
    }
}

#[test]
fn large_block_inverse_matches_small_path() {
    // Past 4 MiB the inverse switches algorithms; outputs must not differ.
    let len = (4 << 20) + 4096;
    let mut data = corpus::text_bytes(len);
    data[len - 1] = 0; // uneven tail
    let reference = bwt_roundtrip(&data, 1);
    for jobs in [2usize, 8] {
        assert_eq!(bwt_roundtrip(&data, jobs), reference, "jobs {jobs}");
    }
}

#[test]
fn single_chunk_below_256_bytes() {
    let data = corpus::text_bytes(200);
    let enc = bwt_roundtrip(&data, 4);
    assert_eq!(enc[0] >> 2, 0, "log2(chunks) must be 0 under 256 bytes");
}

#[test]
fn bwts_matches_bwt_compressibility_class() {
    // Not a byte-for-byte relation, just both must round trip on the same
    // inputs including repetitive extremes.
    let inputs = [
        corpus::text_bytes(10_000),
        vec![b'z'; 5_000],
        corpus::random_bytes(6_000, 3),
    ];
    for data in &inputs {
        let ctx0 = Context::default();
        let mut t = transform::new_transform(transform::BWTS_ID, &ctx0).unwrap();
        let mut ctx = Context::default();
        let mut enc = vec![0u8; data.len()];
        t.forward(&mut ctx, data, &mut enc).unwrap();
        let mut out = vec![0u8; data.len()];
        let (_, m) = t.inverse(&mut ctx, &enc, &mut out).unwrap();
        assert_eq!(&out[..m], &data[..]);
    }
}
