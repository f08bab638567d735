//! File-level I/O: per-file compression and decompression, stream listing,
//! and the preference/notification plumbing shared with the CLI.

pub mod compress;
pub mod decompress;
pub mod info;
pub mod prefs;

pub use compress::{compress_file, default_compressed_name, CompressResult};
pub use decompress::{decompress_file, default_decompressed_name, DecompressResult};
pub use info::print_info;
pub use prefs::{display_level, set_display_level, Prefs, KNZ_EXTENSION, NONE_MARK, STDIN_MARK, STDOUT_MARK};
