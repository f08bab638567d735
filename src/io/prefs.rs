//! I/O preferences and the global notification level.

use std::sync::atomic::{AtomicI32, Ordering};

use crate::block::ChecksumMode;

pub const KB: usize = 1 << 10;
pub const MB: usize = 1 << 20;
pub const GB: usize = 1 << 30;

/// Default extension for compressed files.
pub const KNZ_EXTENSION: &str = ".knz";

/// Marker names for standard streams and the null sink.
pub const STDIN_MARK: &str = "stdin";
pub const STDOUT_MARK: &str = "stdout";
pub const NONE_MARK: &str = "none";

/// Global notification level: 0 silent, 1 errors, 2 results and warnings,
/// 3 progress, 4 verbose, 5 debug.
pub static DISPLAY_LEVEL: AtomicI32 = AtomicI32::new(2);

#[inline]
pub fn display_level() -> i32 {
    DISPLAY_LEVEL.load(Ordering::Relaxed)
}

#[inline]
pub fn set_display_level(level: i32) {
    DISPLAY_LEVEL.store(level.clamp(0, 5), Ordering::Relaxed);
}

/// Print to stderr when the notification level is at least `$level`.
#[macro_export]
macro_rules! log_at {
    ($level:expr, $($arg:tt)*) => {
        if $crate::io::prefs::display_level() >= $level {
            eprintln!($($arg)*);
        }
    };
}

/// Everything the coordinator needs to process one batch of files.
#[derive(Debug, Clone)]
pub struct Prefs {
    pub block_size: usize,
    pub checksum: ChecksumMode,
    pub entropy: u8,
    pub transform_ids: Vec<u8>,
    pub jobs: usize,
    pub overwrite: bool,
    pub remove_source: bool,
    pub from_block: u64,
    pub to_block: u64,
    pub skip_links: bool,
    pub skip_dot_files: bool,
    pub no_file_reorder: bool,
}

impl Default for Prefs {
    fn default() -> Self {
        Prefs {
            block_size: crate::block::DEFAULT_BLOCK_SIZE,
            checksum: ChecksumMode::None,
            entropy: crate::entropy::NONE_TYPE,
            transform_ids: Vec::new(),
            jobs: crate::util::default_jobs(),
            overwrite: false,
            remove_source: false,
            from_block: 0,
            to_block: 0,
            skip_links: false,
            skip_dot_files: false,
            no_file_reorder: false,
        }
    }
}
