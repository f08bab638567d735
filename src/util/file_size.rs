//! File sizes and human size parsing.

use std::io;
use std::path::Path;

use crate::error::{Error, Result};

/// Size of a regular file, or an error for anything else.
pub fn file_size(path: &Path) -> io::Result<u64> {
    let meta = std::fs::metadata(path)?;
    if !meta.is_file() {
        return Err(io::Error::other("not a regular file"));
    }
    Ok(meta.len())
}

/// Parse a size with an optional K/M/G suffix ("4M", "65536", "1g").
pub fn parse_size(text: &str) -> Result<usize> {
    let t = text.trim();
    if t.is_empty() {
        return Err(Error::invalid_param("empty size"));
    }
    let (digits, mult) = match t.chars().last().unwrap().to_ascii_uppercase() {
        'K' => (&t[..t.len() - 1], 1usize << 10),
        'M' => (&t[..t.len() - 1], 1 << 20),
        'G' => (&t[..t.len() - 1], 1 << 30),
        _ => (t, 1),
    };
    let value: usize = digits
        .parse()
        .map_err(|_| Error::invalid_param(format!("invalid size '{text}'")))?;
    value
        .checked_mul(mult)
        .ok_or_else(|| Error::invalid_param(format!("size '{text}' overflows")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffixes() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("4M").unwrap(), 4 << 20);
        assert_eq!(parse_size("1g").unwrap(), 1 << 30);
        assert_eq!(parse_size("64k").unwrap(), 64 << 10);
        assert!(parse_size("").is_err());
        assert!(parse_size("x4M").is_err());
    }
}
