//! Compression level presets: each level maps to a fixed transform chain
//! and entropy codec pair.

use crate::error::{Error, Result};

/// `(chain, entropy)` preset for levels 0..=9.
pub const LEVELS: [(&str, &str); 10] = [
    ("NONE", "NONE"),
    ("PACK+LZ", "NONE"),
    ("PACK+LZ", "HUFFMAN"),
    ("TEXT+UTF+PACK+MM+LZX", "HUFFMAN"),
    ("TEXT+UTF+EXE+PACK+MM+LZX", "ANS0"),
    ("TEXT+UTF+BWT+RANK+ZRLT", "ANS0"),
    ("TEXT+UTF+BWT+SRT+ZRLT", "FPAQ"),
    ("TEXT+UTF+BWT", "FPAQ"),
    ("EXE+RLT+TEXT+UTF+ROLZX", "NONE"),
    ("EXE+RLT+TEXT+UTF+BWT+SRT+ZRLT", "FPAQ"),
];

/// Resolve a level into its chain/entropy strings.
pub fn level_preset(level: u32) -> Result<(&'static str, &'static str)> {
    LEVELS
        .get(level as usize)
        .copied()
        .ok_or_else(|| Error::invalid_param(format!("compression level {level} out of range 0..9")))
}

/// Block size used when `-b auto` is combined with a level.
pub fn auto_block_size(level: u32) -> usize {
    match level {
        0..=3 => 4 << 20,
        4..=6 => 16 << 20,
        _ => 32 << 20,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_presets_parse() {
        for (level, (chain, entropy)) in LEVELS.iter().enumerate() {
            let ids = crate::transform::parse_chain(chain)
                .unwrap_or_else(|e| panic!("level {level}: {e}"));
            assert!(ids.len() <= crate::transform::MAX_STAGES);
            crate::entropy::entropy_id(entropy).unwrap();
        }
    }

    #[test]
    fn level_three_matches_documented_pair() {
        assert_eq!(level_preset(3).unwrap(), ("TEXT+UTF+PACK+MM+LZX", "HUFFMAN"));
        assert!(level_preset(10).is_err());
    }
}
