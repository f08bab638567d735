//! Stream header listing (`-y` / `--info`).

use std::fs::File;
use std::io::BufReader;

use crate::block::reader::CompressedInputStream;
use crate::block::ChecksumMode;
use crate::error::Result;
use crate::transform::chain_name;

/// Filenames longer than this are shortened in the listing.
const MAX_NAME_LEN: usize = 32;

fn short_name(name: &str) -> String {
    if name.len() <= MAX_NAME_LEN {
        name.to_string()
    } else {
        format!("...{}", &name[name.len() - (MAX_NAME_LEN - 3)..])
    }
}

/// Print one line of header metadata per input file.
pub fn print_info(files: &[String]) -> Result<()> {
    for name in files {
        let file = BufReader::new(File::open(name)?);
        let stream = CompressedInputStream::new(file, 1)?;
        let info = stream.info();
        let checksum = match info.checksum {
            ChecksumMode::None => "none",
            ChecksumMode::X32 => "32 bits",
            ChecksumMode::X64 => "64 bits",
        };
        let size = info
            .original_size
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "{:<32} v{} block {} KiB, entropy {}, transforms {}, checksum {}, original size {}",
            short_name(name),
            info.bs_version,
            info.block_size / 1024,
            crate::entropy::entropy_name(info.entropy),
            chain_name(&info.transform_ids),
            checksum,
            size,
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_names_keep_their_tail() {
        let name = "a/very/long/path/that/goes/on/forever/archive.knz";
        let s = short_name(name);
        assert_eq!(s.len(), MAX_NAME_LEN);
        assert!(s.starts_with("..."));
        assert!(s.ends_with("archive.knz"));
    }

    #[test]
    fn short_names_are_untouched() {
        assert_eq!(short_name("data.knz"), "data.knz");
    }
}
