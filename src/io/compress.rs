//! File-level compression: open source and sink, pump through the block
//! writer, restore timestamps, optionally remove the source.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::block::writer::{CompressedOutputStream, WriterConfig};
use crate::error::{Error, Result};
use crate::log_at;

use super::prefs::{Prefs, KNZ_EXTENSION, NONE_MARK, STDIN_MARK, STDOUT_MARK};

/// Outcome of one file compression.
#[derive(Debug)]
pub struct CompressResult {
    pub read: u64,
    pub written: u64,
}

/// Derive the output path for an input when `-o` names a directory or is
/// absent.
pub fn default_compressed_name(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_os_string();
    name.push(KNZ_EXTENSION);
    PathBuf::from(name)
}

/// Compress `input` ("stdin" accepted) into `output` ("stdout"/"none"
/// accepted).
pub fn compress_file(input: &str, output: &str, prefs: &Prefs) -> Result<CompressResult> {
    let original_size = if input == STDIN_MARK {
        None
    } else {
        crate::util::file_size(Path::new(input)).ok()
    };

    let cfg = WriterConfig {
        block_size: prefs.block_size,
        checksum: prefs.checksum,
        entropy: prefs.entropy,
        transform_ids: prefs.transform_ids.clone(),
        jobs: prefs.jobs,
        original_size,
    };

    let mut reader: Box<dyn Read> = if input == STDIN_MARK {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(File::open(input)?))
    };

    if output != STDOUT_MARK && output != NONE_MARK && !prefs.overwrite {
        if Path::new(output).exists() {
            return Err(Error::invalid_param(format!(
                "output file '{output}' exists, use force to overwrite"
            )));
        }
    }
    let sink: Box<dyn Write> = match output {
        STDOUT_MARK => Box::new(io::stdout().lock()),
        NONE_MARK => Box::new(io::sink()),
        path => Box::new(BufWriter::new(File::create(path)?)),
    };

    let mut w = CompressedOutputStream::new(sink, cfg)?;
    let mut read = 0u64;
    let mut buf = vec![0u8; 1 << 16];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        read += n as u64;
        w.write_all(&buf[..n]).map_err(Error::Io)?;
    }
    w.close()?;
    let written = w.compressed_size();
    drop(w);

    if input != STDIN_MARK && output != STDOUT_MARK && output != NONE_MARK {
        preserve_times(Path::new(input), Path::new(output));
        if prefs.remove_source {
            std::fs::remove_file(input)?;
        }
    }
    log_at!(
        3,
        "{}: {} => {} bytes ({:.2}%)",
        input,
        read,
        written,
        if read > 0 {
            written as f64 * 100.0 / read as f64
        } else {
            0.0
        }
    );
    Ok(CompressResult { read, written })
}

/// Copy the source modification time onto the output, best effort.
pub(crate) fn preserve_times(src: &Path, dst: &Path) {
    if let Ok(meta) = std::fs::metadata(src) {
        let mtime = filetime::FileTime::from_last_modification_time(&meta);
        let _ = filetime::set_file_mtime(dst, mtime);
    }
}
