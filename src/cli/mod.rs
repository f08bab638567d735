//! Command-line front end: argument parsing, level presets, exit codes and
//! operation dispatch.

pub mod args;
pub mod exit;
pub mod levels;

pub use args::Args;
pub use exit::{exit_code_for, EXIT_INVALID_PARAM, EXIT_OK, EXIT_UNKNOWN};
pub use levels::{auto_block_size, level_preset, LEVELS};
