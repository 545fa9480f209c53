//! tplpack package - save metadata and build a signed package

use clap::Args;
use colored::Colorize;

use super::TemplateSource;
use crate::app::AppContext;
use crate::cli::output::{emit_human, emit_robot, robot_ok, HumanLayout};
use crate::error::Result;
use crate::package::{prefill_metadata, save_package, MetadataOverrides, PackageRequest};

#[derive(Args, Debug)]
pub struct PackageArgs {
    #[command(flatten)]
    pub source: TemplateSource,

    #[command(flatten)]
    pub metadata: MetadataOverrides,
}

pub fn run(ctx: &AppContext, args: &PackageArgs) -> Result<()> {
    let template = args.source.export()?;
    let author = ctx.key_store().author_info()?;
    let store = ctx.open_store()?;

    let mut metadata = prefill_metadata(&store, &author, &template)?;
    args.metadata.apply(&mut metadata);
    drop(store);

    let outcome = save_package(ctx, &PackageRequest { template, metadata })?;

    if ctx.robot_mode {
        let warnings = outcome
            .missing
            .iter()
            .map(|file| format!("missing dependent file {}", file.resolved_path.display()))
            .collect();
        return emit_robot(&robot_ok(&outcome).with_warnings(warnings));
    }
    if ctx.quiet {
        return Ok(());
    }

    let mut layout = HumanLayout::new();
    layout
        .title(&format!("Package {}", outcome.name))
        .kv("Archive", &outcome.path.display().to_string())
        .kv("Hash", &outcome.hash)
        .kv("Metadata", outcome.metadata_backend)
        .kv("Files", &outcome.files.len().to_string());
    for file in &outcome.files {
        layout.bullet(file);
    }
    if !outcome.missing.is_empty() {
        layout.blank().section("Missing");
        for file in &outcome.missing {
            layout.push_line(format!("{} {}", "!".yellow(), file.resolved_path.display()));
        }
    }
    for path in &outcome.unreadable {
        layout.push_line(format!(
            "{} {} could not be read and was packaged as a placeholder",
            "!".yellow(),
            path.display()
        ));
    }
    emit_human(layout);
    Ok(())
}
