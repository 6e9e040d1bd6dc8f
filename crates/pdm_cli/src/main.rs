//! `pdm` command-line entry point.
//!
//! # Responsibility
//! - Parse arguments and hand off to `cli::run`.
//! - Print failures to stderr and exit non-zero.

mod cli;

fn main() {
    if let Err(err) = cli::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
