//! genmanifest - write or list package manifests for package directories.

use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

use tplpack::cli::commands::genmanifest::{self, GenmanifestArgs};
use tplpack::cli::init_tracing;
use tplpack::PkgError;

fn main() -> ExitCode {
    let args = match GenmanifestArgs::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    if args.is_noop() {
        let _ = GenmanifestArgs::command().print_help();
        return ExitCode::SUCCESS;
    }

    init_tracing(if args.debug { "debug" } else { "warn" }, false);

    match genmanifest::run(&args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(PkgError::Validation(message)) => {
            println!("FATAL: {message}");
            let _ = GenmanifestArgs::command().print_help();
            ExitCode::FAILURE
        }
        Err(e) => {
            println!("FATAL: {e}");
            ExitCode::FAILURE
        }
    }
}
