//! File-level coordinator tests: on-disk round trips, overwrite policy,
//! source removal, name derivation.

#[path = "common/corpus.rs"]
mod corpus;

use std::fs;
use std::path::Path;

use kanzi::block::ChecksumMode;
use kanzi::io::{self, Prefs};

fn prefs() -> Prefs {
    Prefs {
        block_size: 64 * 1024,
        checksum: ChecksumMode::X32,
        entropy: kanzi::entropy_id("HUFFMAN").unwrap(),
        transform_ids: kanzi::parse_chain("PACK+LZ").unwrap(),
        jobs: 2,
        ..Prefs::default()
    }
}

#[test]
fn file_roundtrip_on_disk() {
    let dir = tempfile::TempDir::new().unwrap();
    let input = dir.path().join("data.bin");
    let packed = dir.path().join("data.bin.knz");
    let restored = dir.path().join("restored.bin");
    let data = corpus::text_bytes(150_000);
    fs::write(&input, &data).unwrap();

    let res = io::compress_file(
        input.to_str().unwrap(),
        packed.to_str().unwrap(),
        &prefs(),
    )
    .unwrap();
    assert_eq!(res.read, data.len() as u64);
    assert!(packed.metadata().unwrap().len() < data.len() as u64);

    io::decompress_file(
        packed.to_str().unwrap(),
        restored.to_str().unwrap(),
        &prefs(),
    )
    .unwrap();
    assert_eq!(fs::read(&restored).unwrap(), data);
}

#[test]
fn existing_output_requires_force() {
    let dir = tempfile::TempDir::new().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.knz");
    fs::write(&input, corpus::text_bytes(5_000)).unwrap();
    fs::write(&output, b"already here").unwrap();

    let err = io::compress_file(
        input.to_str().unwrap(),
        output.to_str().unwrap(),
        &prefs(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("exists"));

    let mut forced = prefs();
    forced.overwrite = true;
    io::compress_file(input.to_str().unwrap(), output.to_str().unwrap(), &forced).unwrap();
}

#[test]
fn remove_source_after_success() {
    let dir = tempfile::TempDir::new().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.knz");
    fs::write(&input, corpus::text_bytes(5_000)).unwrap();
    let mut p = prefs();
    p.remove_source = true;
    io::compress_file(input.to_str().unwrap(), output.to_str().unwrap(), &p).unwrap();
    assert!(!input.exists());
    assert!(output.exists());
}

#[test]
fn default_names() {
    assert_eq!(
        io::default_compressed_name(Path::new("a/b/file.txt")),
        Path::new("a/b/file.txt.knz")
    );
    assert_eq!(
        io::default_decompressed_name(Path::new("a/b/file.txt.knz")),
        Path::new("a/b/file.txt")
    );
    assert_eq!(
        io::default_decompressed_name(Path::new("noext")),
        Path::new("noext.bak")
    );
}

#[test]
fn original_size_lands_in_header() {
    let dir = tempfile::TempDir::new().unwrap();
    let input = dir.path().join("sized.bin");
    let output = dir.path().join("sized.knz");
    let data = corpus::text_bytes(33_333);
    fs::write(&input, &data).unwrap();
    io::compress_file(input.to_str().unwrap(), output.to_str().unwrap(), &prefs()).unwrap();

    let file = std::io::BufReader::new(fs::File::open(&output).unwrap());
    let stream = kanzi::CompressedInputStream::new(file, 1).unwrap();
    assert_eq!(stream.info().original_size, Some(33_333));
}
