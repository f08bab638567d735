//! Command-line surface (clap derive) and its reduction to [`Prefs`].

use clap::Parser;

use crate::block::{normalize_block_size, ChecksumMode, DEFAULT_BLOCK_SIZE};
use crate::error::{Error, Result};
use crate::io::prefs::Prefs;
use crate::util::parse_size;

use super::levels::{auto_block_size, level_preset};

/// Block-oriented lossless data compressor.
#[derive(Debug, Parser)]
#[command(name = "kanzi", version, about, disable_help_subcommand = true)]
pub struct Args {
    /// Compress the input
    #[arg(short = 'c', long, conflicts_with_all = ["decompress", "info"])]
    pub compress: bool,

    /// Decompress the input
    #[arg(short = 'd', long, conflicts_with = "info")]
    pub decompress: bool,

    /// Print stream header information
    #[arg(short = 'y', long)]
    pub info: bool,

    /// Input file, directory or 'stdin' (repeatable)
    #[arg(short = 'i', long = "input")]
    pub inputs: Vec<String>,

    /// Output file, directory, 'stdout' or 'none'
    #[arg(short = 'o', long)]
    pub output: Option<String>,

    /// Block size with optional K/M/G suffix, or 'auto'
    #[arg(short = 'b', long)]
    pub block: Option<String>,

    /// Compression level 0..9 (preset transform chain and entropy codec)
    #[arg(short = 'l', long)]
    pub level: Option<u32>,

    /// Entropy codec (NONE, HUFFMAN, ANS0, RANGE, FPAQ)
    #[arg(short = 'e', long)]
    pub entropy: Option<String>,

    /// Transform chain, e.g. TEXT+UTF+BWT+RANK+ZRLT
    #[arg(short = 't', long)]
    pub transform: Option<String>,

    /// Number of worker jobs (default: half the cores)
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Verbosity 0..5
    #[arg(short = 'v', long, default_value_t = 2)]
    pub verbose: i32,

    /// Overwrite existing output files
    #[arg(short = 'f', long = "force")]
    pub force: bool,

    /// Remove the source file after a successful operation
    #[arg(long)]
    pub rm: bool,

    /// Block checksum size (32 or 64); bare -x selects 32
    #[arg(
        short = 'x',
        long = "checksum",
        value_name = "SIZE",
        num_args = 0..=1,
        default_missing_value = "32"
    )]
    pub checksum: Option<u32>,

    /// First block to decompress (1-based)
    #[arg(long)]
    pub from: Option<u64>,

    /// Block to stop decompressing at (exclusive)
    #[arg(long)]
    pub to: Option<u64>,

    /// Do not follow or include symbolic links
    #[arg(long = "skip-links")]
    pub skip_links: bool,

    /// Ignore dot files during directory traversal
    #[arg(long = "skip-dot-files")]
    pub skip_dot_files: bool,

    /// Keep the input file order instead of sorting by size
    #[arg(long = "no-file-reorder")]
    pub no_file_reorder: bool,
}

impl Args {
    /// Reduce the parsed flags to coordinator preferences.
    pub fn to_prefs(&self) -> Result<Prefs> {
        let mut prefs = Prefs {
            overwrite: self.force,
            remove_source: self.rm,
            from_block: self.from.unwrap_or(0),
            to_block: self.to.unwrap_or(0),
            skip_links: self.skip_links,
            skip_dot_files: self.skip_dot_files,
            no_file_reorder: self.no_file_reorder,
            ..Prefs::default()
        };
        if let Some(jobs) = self.jobs {
            if jobs == 0 || jobs > 64 {
                return Err(Error::invalid_param("jobs must be in 1..=64"));
            }
            prefs.jobs = jobs;
        }
        prefs.checksum = match self.checksum {
            None => ChecksumMode::None,
            Some(32) => ChecksumMode::X32,
            Some(64) => ChecksumMode::X64,
            Some(other) => {
                return Err(Error::invalid_param(format!(
                    "checksum size {other} not supported (32 or 64)"
                )))
            }
        };

        // Level presets first, explicit -e / -t override.
        let level = self.level.unwrap_or(3);
        let (chain, entropy) = level_preset(level)?;
        let chain = self.transform.as_deref().unwrap_or(chain);
        let entropy = self.entropy.as_deref().unwrap_or(entropy);
        prefs.transform_ids = crate::transform::parse_chain(chain)?;
        prefs.entropy = crate::entropy::entropy_id(entropy)?;

        prefs.block_size = match self.block.as_deref() {
            None => {
                if self.level.is_some() {
                    auto_block_size(level)
                } else {
                    DEFAULT_BLOCK_SIZE
                }
            }
            Some("auto") => auto_block_size(level),
            Some(text) => {
                let size = parse_size(text)
                    .map_err(|_| Error::invalid_param(format!("invalid block size '{text}'")))?;
                if !(1024..=(1 << 30)).contains(&size) {
                    return Err(Error::invalid_param(format!(
                        "block size '{text}' out of range 1K..1G"
                    )));
                }
                size
            }
        };
        prefs.block_size = normalize_block_size(prefs.block_size);
        Ok(prefs)
    }
}
