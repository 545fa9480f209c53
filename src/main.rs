//! tplpack - build, inspect and verify signed template packages.

use std::process::ExitCode;

use clap::Parser;

use tplpack::app::AppContext;
use tplpack::cli::output::{emit_robot, robot_error};
use tplpack::cli::{init_tracing, Cli};
use tplpack::Result;

fn main() -> ExitCode {
    let cli = Cli::parse();
    if !cli.quiet {
        init_tracing(filter(cli.verbose), cli.robot);
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.robot {
                // Robot mode: JSON error output to stdout
                let _ = emit_robot(&robot_error(&e));
            } else {
                eprintln!("Error: {e}");
                eprintln!("Hint: {}", e.code().suggestion());
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let ctx = AppContext::from_cli(cli)?;
    tplpack::cli::commands::run(&ctx, &cli.command)
}

const fn filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn,tplpack=info",
        1 => "info,tplpack=debug",
        2 => "debug,tplpack=trace",
        _ => "trace",
    }
}
