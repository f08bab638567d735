//! Entropy stage contract: decode(encode(x)) == x for every implemented
//! codec over assorted distributions, and factory rejection of the
//! out-of-scope ids.

#[path = "common/corpus.rs"]
mod corpus;

use kanzi::bitstream::{BitReader, BitWriter};
use kanzi::entropy::{self, EntropyDecoder, EntropyEncoder};
use kanzi::types::Context;

fn implemented() -> Vec<u8> {
    vec![
        entropy::NONE_TYPE,
        entropy::HUFFMAN_TYPE,
        entropy::ANS0_TYPE,
        entropy::RANGE_TYPE,
        entropy::FPAQ_TYPE,
    ]
}

fn shapes() -> Vec<Vec<u8>> {
    vec![
        corpus::text_bytes(50_000),
        corpus::random_bytes(30_000, 11),
        vec![0u8; 20_000],
        vec![0xABu8; 1],
        (0..=255u8).cycle().take(12_345).collect(),
        corpus::utf8_bytes(9_000),
    ]
}

#[test]
fn every_codec_roundtrips_every_shape() {
    for id in implemented() {
        for (k, data) in shapes().iter().enumerate() {
            let ctx = Context::default();
            let mut enc = entropy::new_encoder(id, &ctx).unwrap();
            let mut bw = BitWriter::new();
            enc.encode(data, &mut bw).unwrap();
            enc.dispose(&mut bw);
            let buf = bw.close();

            let mut dec = entropy::new_decoder(id, &ctx).unwrap();
            let mut out = vec![0u8; data.len()];
            let mut br = BitReader::new(&buf);
            dec.decode(&mut out, &mut br).unwrap();
            assert_eq!(&out, data, "codec {} shape {k}", entropy::entropy_name(id));
        }
    }
}

#[test]
fn skewed_data_actually_compresses() {
    // 95% one symbol: every real codec must beat 8 bits/byte comfortably.
    let data: Vec<u8> = (0..40_000u32)
        .map(|i| if i % 20 == 0 { (i % 7) as u8 + 1 } else { 0 })
        .collect();
    for id in [entropy::HUFFMAN_TYPE, entropy::ANS0_TYPE, entropy::RANGE_TYPE, entropy::FPAQ_TYPE] {
        let ctx = Context::default();
        let mut enc = entropy::new_encoder(id, &ctx).unwrap();
        let mut bw = BitWriter::new();
        enc.encode(&data, &mut bw).unwrap();
        enc.dispose(&mut bw);
        let buf = bw.close();
        assert!(
            buf.len() < data.len() / 2,
            "{} produced {} bytes",
            entropy::entropy_name(id),
            buf.len()
        );
    }
}

#[test]
fn out_of_scope_codecs_are_rejected_by_name() {
    let ctx = Context::default();
    for name in ["ANS1", "CM", "TPAQ", "TPAQX"] {
        let id = entropy::entropy_id(name).unwrap();
        let err = entropy::new_encoder(id, &ctx).unwrap_err();
        assert!(err.to_string().contains(name));
        assert!(entropy::new_decoder(id, &ctx).is_err());
    }
    assert!(entropy::entropy_id("LZMA").is_err());
}

#[test]
fn multiple_blocks_through_one_adaptive_coder() {
    // FPAQ keeps adapted state between encode calls; the decoder must track.
    let ctx = Context::default();
    let blocks = [corpus::text_bytes(5_000), corpus::text_bytes(5_000)];
    let mut enc = entropy::new_encoder(entropy::FPAQ_TYPE, &ctx).unwrap();
    let mut buffers = Vec::new();
    for b in &blocks {
        let mut bw = BitWriter::new();
        enc.encode(b, &mut bw).unwrap();
        enc.dispose(&mut bw);
        buffers.push(bw.close());
    }
    let mut dec = entropy::new_decoder(entropy::FPAQ_TYPE, &ctx).unwrap();
    for (b, buf) in blocks.iter().zip(&buffers) {
        let mut out = vec![0u8; b.len()];
        let mut br = BitReader::new(buf);
        dec.decode(&mut out, &mut br).unwrap();
        assert_eq!(&out, b);
    }
}
