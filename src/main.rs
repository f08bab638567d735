//! Binary entry point: parse flags, expand inputs, dispatch the selected
//! operation, and translate failures into the exit-code table.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use kanzi::cli::{exit_code_for, Args, EXIT_INVALID_PARAM, EXIT_OK};
use kanzi::io::{
    self, default_compressed_name, default_decompressed_name, set_display_level, NONE_MARK,
    STDIN_MARK, STDOUT_MARK,
};
use kanzi::log_at;

fn main() -> ExitCode {
    let args = Args::parse();
    set_display_level(args.verbose);
    ExitCode::from(run(&args).min(255) as u8)
}

fn run(args: &Args) -> i32 {
    let prefs = match args.to_prefs() {
        Ok(p) => p,
        Err(e) => {
            log_at!(1, "kanzi: {e}");
            return EXIT_INVALID_PARAM;
        }
    };
    if args.inputs.is_empty() {
        log_at!(1, "kanzi: no input given (use -i)");
        return EXIT_INVALID_PARAM;
    }

    if args.info {
        return match io::print_info(&args.inputs) {
            Ok(()) => EXIT_OK,
            Err(e) => {
                log_at!(1, "kanzi: {e}");
                exit_code_for(&e)
            }
        };
    }

    // Build the work list: stdin passes through, paths are expanded.
    let use_stdin = args.inputs.iter().any(|i| i == STDIN_MARK);
    let files: Vec<String> = if use_stdin {
        vec![STDIN_MARK.to_string()]
    } else {
        let paths: Vec<PathBuf> = args.inputs.iter().map(PathBuf::from).collect();
        match kanzi::util::create_file_list(
            &paths,
            prefs.skip_links,
            prefs.skip_dot_files,
            prefs.no_file_reorder,
        ) {
            Ok(list) if !list.is_empty() => {
                list.into_iter().map(|p| p.display().to_string()).collect()
            }
            Ok(_) => {
                log_at!(1, "kanzi: no input files found");
                return EXIT_INVALID_PARAM;
            }
            Err(e) => {
                log_at!(1, "kanzi: {e}");
                return EXIT_INVALID_PARAM;
            }
        }
    };

    let decompress = args.decompress;
    let multi = files.len() > 1;
    let out_dir = args
        .output
        .as_deref()
        .filter(|o| multi || std::path::Path::new(o).is_dir());

    let mut code = EXIT_OK;
    for file in &files {
        let output = resolve_output(args, file, out_dir, decompress);
        let result = if decompress {
            io::decompress_file(file, &output, &prefs).map(|_| ())
        } else {
            io::compress_file(file, &output, &prefs).map(|_| ())
        };
        if let Err(e) = result {
            log_at!(1, "kanzi: {file}: {e}");
            code = exit_code_for(&e);
            break;
        }
    }
    code
}

/// Pick the output name for one input file.
fn resolve_output(args: &Args, input: &str, out_dir: Option<&str>, decompress: bool) -> String {
    if input == STDIN_MARK {
        return args
            .output
            .clone()
            .unwrap_or_else(|| STDOUT_MARK.to_string());
    }
    match (&args.output, out_dir) {
        (Some(o), None) if o == STDOUT_MARK || o == NONE_MARK => o.clone(),
        (Some(o), None) => o.clone(),
        (_, Some(dir)) => {
            let name = if decompress {
                default_decompressed_name(std::path::Path::new(input))
            } else {
                default_compressed_name(std::path::Path::new(input))
            };
            let base = name.file_name().map(PathBuf::from).unwrap_or(name);
            PathBuf::from(dir).join(base).display().to_string()
        }
        (None, None) => {
            let path = std::path::Path::new(input);
            if decompress {
                default_decompressed_name(path).display().to_string()
            } else {
                default_compressed_name(path).display().to_string()
            }
        }
    }
}
