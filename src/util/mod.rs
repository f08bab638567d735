//! Small host utilities: core counting, file enumeration, file metadata.

pub mod cores;
pub mod file_list;
pub mod file_size;

pub use cores::{count_cores, default_jobs};
pub use file_list::create_file_list;
pub use file_size::{file_size, parse_size};
