//! genkey - install the package author's signing keypair.

use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

use tplpack::cli::commands::genkey::{self, GenkeyArgs};
use tplpack::cli::init_tracing;

fn main() -> ExitCode {
    let args = match GenkeyArgs::try_parse() {
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
        let _ = GenkeyArgs::command().print_help();
        return ExitCode::SUCCESS;
    }

    init_tracing("warn,tplpack=info", false);

    match genkey::run(&args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            println!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}
