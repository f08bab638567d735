//! Process exit codes, one per failure family.

use crate::error::Error;

pub const EXIT_OK: i32 = 0;
pub const EXIT_OPEN_FILE: i32 = 1;
pub const EXIT_CREATE_FILE: i32 = 2;
pub const EXIT_OVERWRITE: i32 = 3;
pub const EXIT_INVALID_PARAM: i32 = 4;
pub const EXIT_BLOCK_SIZE: i32 = 5;
pub const EXIT_PROCESS_BLOCK: i32 = 6;
pub const EXIT_READ: i32 = 7;
pub const EXIT_WRITE: i32 = 8;
pub const EXIT_CREATE_COMPRESSOR: i32 = 9;
pub const EXIT_CREATE_DECOMPRESSOR: i32 = 10;
pub const EXIT_INVALID_FILE: i32 = 11;
pub const EXIT_UNKNOWN: i32 = 127;

/// Map a library error to the exit-code table.
pub fn exit_code_for(err: &Error) -> i32 {
    match err {
        Error::Corruption(_) => EXIT_INVALID_FILE,
        Error::Capacity(_) => EXIT_PROCESS_BLOCK,
        Error::InvalidParam(msg) if msg.contains("exists") => EXIT_OVERWRITE,
        Error::InvalidParam(msg) if msg.contains("block size") => EXIT_BLOCK_SIZE,
        Error::InvalidParam(_) => EXIT_INVALID_PARAM,
        Error::Io(e) => match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => EXIT_OPEN_FILE,
            std::io::ErrorKind::WriteZero | std::io::ErrorKind::StorageFull => EXIT_WRITE,
            std::io::ErrorKind::UnexpectedEof => EXIT_READ,
            _ => EXIT_READ,
        },
        Error::Skip(_) => EXIT_UNKNOWN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corruption_maps_to_invalid_file() {
        assert_eq!(
            exit_code_for(&Error::corruption("checksum mismatch in block 3")),
            EXIT_INVALID_FILE
        );
        assert_eq!(
            exit_code_for(&Error::invalid_param("output file 'x' exists")),
            EXIT_OVERWRITE
        );
        assert_eq!(
            exit_code_for(&Error::invalid_param("block size '3' out of range")),
            EXIT_BLOCK_SIZE
        );
    }
}
