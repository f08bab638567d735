//! Cross-transform invariants: forward/inverse identity or skip, output
//! bounds, varint round trips, position preservation.

#[path = "common/corpus.rs"]
mod corpus;

use kanzi::transform::{self, ByteTransform};
use kanzi::types::Context;

fn all_ids() -> Vec<u8> {
    vec![
        transform::PACK_ID,
        transform::BWT_ID,
        transform::BWTS_ID,
        transform::LZ_ID,
        transform::LZX_ID,
        transform::LZP_ID,
        transform::ROLZ_ID,
        transform::ROLZX_ID,
        transform::RLT_ID,
        transform::ZRLT_ID,
        transform::MTFT_ID,
        transform::RANK_ID,
        transform::SRT_ID,
        transform::TEXT_ID,
        transform::MM_ID,
        transform::EXE_ID,
        transform::UTF_ID,
        transform::TS_ID,
    ]
}

fn corpus_inputs() -> Vec<Vec<u8>> {
    vec![
        corpus::text_bytes(20_000),
        corpus::random_bytes(8_192, 5),
        vec![0u8; 4_096],
        vec![0xEEu8; 4_096],
        corpus::utf8_bytes(16_000),
        corpus::x86_object(),
        corpus::wav_bytes(8_000),
    ]
}

/// Either the forward pass skips, or inverse(forward(x)) == x and the
/// output respects the declared bound.
#[test]
fn forward_inverse_identity_or_skip() {
    for data in corpus_inputs() {
        for id in all_ids() {
            let ctx0 = Context::default();
            let mut fwd = transform::new_transform(id, &ctx0).unwrap();
            let mut ctx = Context::default();
            let mut enc = vec![0u8; fwd.max_encoded_len(data.len()).max(64)];
            match fwd.forward(&mut ctx, &data, &mut enc) {
                Err(e) if e.is_skip() => continue,
                Err(e) => panic!("{}: hard error {e}", transform::transform_name(id)),
                Ok((read, written)) => {
                    assert_eq!(read, data.len(), "{}", transform::transform_name(id));
                    assert!(
                        written <= fwd.max_encoded_len(data.len()).max(64),
                        "{} wrote past its bound",
                        transform::transform_name(id)
                    );
                    enc.truncate(written);
                    let mut inv = transform::new_transform(id, &ctx0).unwrap();
                    let mut ctx2 = Context::default();
                    let mut out = vec![0u8; data.len() + 64];
                    let (_, m) = inv
                        .inverse(&mut ctx2, &enc, &mut out)
                        .unwrap_or_else(|e| panic!("{}: {e}", transform::transform_name(id)));
                    assert_eq!(&out[..m], &data[..], "{}", transform::transform_name(id));
                }
            }
        }
    }
}

/// The LZ family must stay within its documented worst case.
#[test]
fn lz_output_bound() {
    for data in corpus_inputs() {
        for id in [transform::LZ_ID, transform::LZX_ID, transform::LZP_ID] {
            let ctx0 = Context::default();
            let mut t = transform::new_transform(id, &ctx0).unwrap();
            let mut ctx = Context::default();
            let mut enc = vec![0u8; data.len() + data.len() / 64 + 16];
            if let Ok((_, written)) = t.forward(&mut ctx, &data, &mut enc) {
                assert!(written <= data.len() + data.len() / 64 + 16);
            }
        }
    }
}

/// Length varint round trip across the representation breakpoints.
#[test]
fn length_varint_roundtrip() {
    use kanzi::transform::lz::{emit_len, read_len};
    let mut values: Vec<usize> = (0..1024).collect();
    values.extend([253, 254, 255, 256, 65789, 65790, 65791, 70000, (1 << 24) - 1]);
    for v in values {
        let mut buf = Vec::new();
        emit_len(&mut buf, v);
        let mut i = 0usize;
        assert_eq!(read_len(&buf, &mut i).unwrap(), v, "value {v}");
        assert_eq!(i, buf.len(), "value {v} left {i}/{} bytes", buf.len());
    }
}

/// ZRLT keeps every non-zero byte at its original position.
#[test]
fn zrlt_preserves_nonzero_positions() {
    let mut data = vec![0u8; 2_000];
    for i in (3..2_000).step_by(11) {
        data[i] = (i % 200 + 1) as u8;
    }
    let ctx0 = Context::default();
    let mut t = transform::new_transform(transform::ZRLT_ID, &ctx0).unwrap();
    let mut ctx = Context::default();
    let mut enc = vec![0u8; t.max_encoded_len(data.len())];
    let (_, written) = t.forward(&mut ctx, &data, &mut enc).unwrap();
    enc.truncate(written);
    let mut out = vec![0u8; data.len()];
    let (_, m) = t.inverse(&mut ctx, &enc, &mut out).unwrap();
    assert_eq!(m, data.len());
    for (i, &b) in data.iter().enumerate() {
        if b != 0 {
            assert_eq!(out[i], b, "position {i}");
        }
    }
}

/// Text codec hits stay within four output bytes per original byte.
#[test]
fn text_tokens_bounded() {
    let data = corpus::text_bytes(30_000);
    let ctx0 = Context::default();
    let mut t = transform::new_transform(transform::TEXT_ID, &ctx0).unwrap();
    let mut ctx = Context::default();
    let mut enc = vec![0u8; t.max_encoded_len(data.len())];
    let (read, written) = t.forward(&mut ctx, &data, &mut enc).unwrap();
    assert!(written <= 4 * read);
}
