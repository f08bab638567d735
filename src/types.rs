//! Shared engine types: block data classification and the per-block context.
//!
//! The context is a plain struct with typed fields rather than a string map.
//! It is created per file, cloned per block so all stages of one block share
//! a view, and discarded when the block completes. Transforms read hint
//! fields at construction and may write `data_type` so later stages in the
//! same chain see the classification.

/// Classification of a block's content, produced by histogram heuristics or
/// by individual transforms, and consumed by later stages in the same chain
/// (e.g. the text codec refuses blocks already known to be non-text, the LZ
/// codec raises its minimum match length for DNA).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Undefined,
    Text,
    Bin,
    Exe,
    Dna,
    Utf8,
    Multimedia,
    Base64,
    SmallAlphabet,
}

impl Default for DataType {
    fn default() -> Self {
        DataType::Undefined
    }
}

/// Per-block typed context exchanged between transforms and the block engine.
///
/// `transform` packs up to 8 six-bit stage ids (48 bits total); `entropy` is
/// the five-bit entropy codec id from the file header.
#[derive(Debug, Clone)]
pub struct Context {
    pub block_size: usize,
    pub bs_version: u32,
    pub data_type: DataType,
    pub entropy: u8,
    pub transform: u64,
    pub file_size: Option<u64>,
    pub jobs: usize,
    /// Text codec variant (1 = escape tokens, 2 = bit-packed tokens).
    pub textcodec: u8,
    /// Sorted-by-rank family mode (MTF / Rank / TimeStamp).
    pub sbrt: u8,
    /// Transform id of the LZ flavor driving shared LZ parameters.
    pub lz: u8,
}

impl Context {
    pub fn new(block_size: usize, bs_version: u32) -> Context {
        Context {
            block_size,
            bs_version,
            data_type: DataType::Undefined,
            entropy: 0,
            transform: 0,
            file_size: None,
            jobs: 1,
            textcodec: 2,
            sbrt: 0,
            lz: 0,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new(4 * 1024 * 1024, crate::BITSTREAM_VERSION)
    }
}
