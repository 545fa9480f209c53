//! tplpack verify - check package signatures

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::cli::output::{emit_robot, robot_ok};
use crate::error::{PkgError, Result};
use crate::package::verify_archive;

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Package archive (.xml.gz)
    pub archive: PathBuf,
}

pub fn run(ctx: &AppContext, args: &VerifyArgs) -> Result<()> {
    let report = verify_archive(&args.archive)?;

    if ctx.robot_mode {
        emit_robot(&robot_ok(&report))?;
    } else if !ctx.quiet {
        println!("{} ({})", report.name.bold(), report.author);
        let status = |valid: bool| if valid { "ok".green() } else { "FAILED".red() };
        println!("  document  {}", status(report.document_valid));
        for file in &report.files {
            println!("  {:<40} {}", file.name, status(file.valid));
        }
    }

    if report.is_valid() {
        Ok(())
    } else {
        Err(PkgError::SignatureFailure(format!(
            "{} failed verification",
            args.archive.display()
        )))
    }
}
