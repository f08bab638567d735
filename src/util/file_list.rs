//! Input enumeration with recursive directory expansion.
//!
//! Directories are walked with the `walkdir` crate; symlinks are never
//! followed (cyclic links cannot loop the walk). Optional filters drop
//! symlink entries and dot files, and by default the resulting list is
//! sorted by decreasing size so large files hit the worker pool first.

use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Expand a mixed list of file and directory paths into regular files.
pub fn create_file_list(
    inputs: &[PathBuf],
    skip_links: bool,
    skip_dot_files: bool,
    no_reorder: bool,
) -> io::Result<Vec<PathBuf>> {
    let mut result = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input) {
                let entry = entry.map_err(|e| {
                    e.io_error()
                        .map(|io| io::Error::new(io.kind(), io.to_string()))
                        .unwrap_or_else(|| io::Error::other(e.to_string()))
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                if skip_dot_files && is_dot_file(entry.path()) {
                    continue;
                }
                result.push(entry.into_path());
            }
        } else {
            if skip_links && input.is_symlink() {
                continue;
            }
            if skip_dot_files && is_dot_file(input) {
                continue;
            }
            result.push(input.clone());
        }
    }
    if !no_reorder {
        result.sort_by_key(|p| {
            std::cmp::Reverse(std::fs::metadata(p).map(|m| m.len()).unwrap_or(0))
        });
    }
    Ok(result)
}

fn is_dot_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn make_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("big.txt"), vec![0u8; 100]).unwrap();
        fs::write(root.join(".hidden"), b"x").unwrap();
        fs::write(root.join("sub/small.txt"), b"y").unwrap();
        dir
    }

    #[test]
    fn walks_recursively_and_sorts_by_size() {
        let dir = make_tree();
        let list =
            create_file_list(&[dir.path().to_path_buf()], false, false, false).unwrap();
        assert_eq!(list.len(), 3);
        assert!(list[0].ends_with("big.txt"));
    }

    #[test]
    fn dot_files_can_be_skipped() {
        let dir = make_tree();
        let list =
            create_file_list(&[dir.path().to_path_buf()], false, true, true).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|p| !p.ends_with(".hidden")));
    }
}
