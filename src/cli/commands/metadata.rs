//! tplpack metadata - show stored packaging metadata

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{emit_human, emit_robot, robot_ok, HumanLayout};
use crate::error::{PkgError, Result};
use crate::storage::MetadataStore;

#[derive(Args, Debug)]
pub struct MetadataArgs {
    /// Template hash
    pub hash: String,
}

pub fn run(ctx: &AppContext, args: &MetadataArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let record = store
        .get(&args.hash)?
        .ok_or_else(|| PkgError::NotFound(format!("no metadata stored for {}", args.hash)))?;

    if ctx.robot_mode {
        return emit_robot(&robot_ok(&record));
    }
    if ctx.quiet {
        return Ok(());
    }

    let mut layout = HumanLayout::new();
    layout.title(&record.name).kv("Hash", &record.hash);
    for (key, value) in [
        ("Author", &record.author),
        ("Homepage", &record.homepage),
        ("Email", &record.email),
        ("Description", &record.description),
        ("Class", &record.class),
        ("Tags", &record.tags),
        ("Version", &record.version),
        ("Copyright", &record.copyright),
        ("Installation", &record.installation),
    ] {
        if !value.is_empty() {
            layout.kv(key, value);
        }
    }
    layout.kv("Backend", store.backend());
    emit_human(layout);
    Ok(())
}
