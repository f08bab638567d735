//! Thin wrapper around the `xxhash-rust` crate providing the XXH32 / XXH64
//! one-shot hashes used for block checksums.
//!
//! Checksums are computed over the *uncompressed* block bytes, before any
//! transform runs, and are seeded with the bitstream version so that streams
//! written under different format revisions never validate against each other.

pub use xxhash_rust::xxh32::Xxh32 as Xxh32State;
pub use xxhash_rust::xxh64::Xxh64 as Xxh64State;

/// One-shot XXH32 hash.
#[inline]
pub fn xxh32_oneshot(data: &[u8], seed: u32) -> u32 {
    xxhash_rust::xxh32::xxh32(data, seed)
}

/// One-shot XXH64 hash.
#[inline]
pub fn xxh64_oneshot(data: &[u8], seed: u64) -> u64 {
    xxhash_rust::xxh64::xxh64(data, seed)
}
