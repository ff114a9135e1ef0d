//! `collapse <input> [-o <output>] [--raw] [-v|--verbose]` — read a source
//! file, compile it straight to machine code, and write either a full
//! ELF64 executable or a raw code dump.
//!
//! Argument parsing is a manual loop over `env::args()` rather than a
//! dedicated argument-parsing crate — there are only a handful of flags and
//! none of them take more than one value.
use std::env;
use std::fs;
use std::io;
use std::process;

use collapse::error::{Error, Result};
use collapse::{elf, report, Compiler};

struct Args {
    input: String,
    output: String,
    raw: bool,
    verbose: bool,
}

fn print_usage() {
    eprintln!("Usage: collapse <input> [-o <output>] [--raw] [-v|--verbose]");
}

fn parse_args() -> Option<Args> {
    let argv: Vec<String> = env::args().collect();
    let mut input = None;
    let mut output = "a.out".to_string();
    let mut raw = false;
    let mut verbose = false;

    let mut i = 1;
    while i < argv.len() {
        match argv[i].as_str() {
            "-o" => {
                if i + 1 >= argv.len() {
                    eprintln!("error: -o requires an argument");
                    return None;
                }
                // Repeating `-o` overwrites the output path; the last one given wins.
                output = argv[i + 1].clone();
                i += 2;
            }
            "--raw" => {
                raw = true;
                i += 1;
            }
            "-v" | "--verbose" => {
                verbose = true;
                i += 1;
            }
            other => {
                if input.is_some() {
                    eprintln!("error: unexpected argument '{other}'");
                    return None;
                }
                input = Some(other.to_string());
                i += 1;
            }
        }
    }

    match input {
        Some(input) => Some(Args { input, output, raw, verbose }),
        None => None,
    }
}

fn run(args: &Args) -> Result<()> {
    let src = fs::read(&args.input).map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            Error::MissingInput(args.input.clone())
        } else {
            Error::Io(err)
        }
    })?;

    let mut compiler = Compiler::new(src);
    compiler.compile();

    let image = if args.raw {
        compiler.code_bytes().to_vec()
    } else {
        elf::write_executable(compiler.code_bytes(), compiler.global_bytes())
    };

    fs::write(&args.output, &image)?;
    if !args.raw {
        set_executable(&args.output)?;
    }

    report::print(
        &report::Stats {
            code_size: compiler.code_bytes().len(),
            variable_count: compiler.variable_count(),
            function_count: compiler.function_count(),
        },
        compiler.metadata(),
    );

    Ok(())
}

#[cfg(unix)]
fn set_executable(path: &str) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &str) -> Result<()> {
    Ok(())
}

fn main() {
    let Some(args) = parse_args() else {
        print_usage();
        process::exit(1);
    };

    // `-v` raises the log filter, but never clobbers an explicit RUST_LOG
    // the user already set.
    if args.verbose && env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    if let Err(err) = run(&args) {
        eprintln!("{err}");
        process::exit(1);
    }
}
