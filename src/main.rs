//! bits - A minimal, file-based task tracker for agent workflows

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = bits::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
