//! tplpack contents - list a template's dependent files

use clap::Args;
use colored::Colorize;

use super::TemplateSource;
use crate::app::AppContext;
use crate::cli::output::{emit_robot, robot_ok};
use crate::error::Result;
use crate::package::package_contents;

#[derive(Args, Debug)]
pub struct ContentsArgs {
    #[command(flatten)]
    pub source: TemplateSource,
}

pub fn run(ctx: &AppContext, args: &ContentsArgs) -> Result<()> {
    let template = args.source.export()?;
    let report = package_contents(ctx, &template);

    if ctx.robot_mode {
        let warnings = report.warnings.clone();
        return emit_robot(&robot_ok(&report).with_warnings(warnings));
    }
    if ctx.quiet {
        return Ok(());
    }

    println!("{}", format!("Contents of {}", report.template).bold());
    if report.entries.is_empty() {
        println!("  {}", "(template only)".dimmed());
    }
    for entry in &report.entries {
        let marker = if entry.exists {
            "✓".green()
        } else {
            "✗".red()
        };
        println!(
            "  {marker} {:<9} {}",
            entry.kind.as_str(),
            entry.path.display()
        );
    }
    for warning in &report.warnings {
        eprintln!("{} {warning}", "WARNING:".yellow().bold());
    }
    Ok(())
}
