//! File-level decompression.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::block::reader::CompressedInputStream;
use crate::error::{Error, Result};
use crate::log_at;

use super::prefs::{Prefs, KNZ_EXTENSION, NONE_MARK, STDIN_MARK, STDOUT_MARK};

pub struct DecompressResult {
    pub read: u64,
    pub written: u64,
}

/// Strip the compressed extension, or append `.bak` when there is none.
pub fn default_decompressed_name(input: &Path) -> PathBuf {
    let s = input.to_string_lossy();
    match s.strip_suffix(KNZ_EXTENSION) {
        Some(stem) if !stem.is_empty() => PathBuf::from(stem),
        _ => {
            let mut name = input.as_os_str().to_os_string();
            name.push(".bak");
            PathBuf::from(name)
        }
    }
}

pub fn decompress_file(input: &str, output: &str, prefs: &Prefs) -> Result<DecompressResult> {
    let (reader, compressed_size): (Box<dyn Read>, u64) = if input == STDIN_MARK {
        (Box::new(io::stdin().lock()), 0)
    } else {
        let size = crate::util::file_size(Path::new(input)).unwrap_or(0);
        (Box::new(BufReader::new(File::open(input)?)), size)
    };

    if output != STDOUT_MARK && output != NONE_MARK && !prefs.overwrite && Path::new(output).exists()
    {
        return Err(Error::invalid_param(format!(
            "output file '{output}' exists, use force to overwrite"
        )));
    }
    let mut sink: Box<dyn Write> = match output {
        STDOUT_MARK => Box::new(io::stdout().lock()),
        NONE_MARK => Box::new(io::sink()),
        path => Box::new(BufWriter::new(File::create(path)?)),
    };

    let mut r =
        CompressedInputStream::with_range(reader, prefs.jobs, prefs.from_block, prefs.to_block)?;
    let mut written = 0u64;
    let mut buf = vec![0u8; 1 << 16];
    loop {
        let n = r
            .read(&mut buf)
            .map_err(|e| Error::corruption(e.to_string()))?;
        if n == 0 {
            break;
        }
        written += n as u64;
        sink.write_all(&buf[..n])?;
    }
    sink.flush()?;
    drop(sink);

    if input != STDIN_MARK && output != STDOUT_MARK && output != NONE_MARK {
        super::compress::preserve_times(Path::new(input), Path::new(output));
        if prefs.remove_source {
            std::fs::remove_file(input)?;
        }
    }
    log_at!(3, "{}: {} bytes restored", input, written);
    Ok(DecompressResult {
        read: compressed_size,
        written,
    })
}
