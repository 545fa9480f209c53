//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - `run()` function to execute the command
//!
//! `genkey` and `genmanifest` are standalone tools with their own parsers.

use std::path::PathBuf;

use clap::Args;

use crate::app::AppContext;
use crate::cli::Commands;
use crate::error::Result;
use crate::template::{FileExporter, TemplateDocument, TemplateExporter, TemplateKind};

pub mod contents;
pub mod genkey;
pub mod genmanifest;
pub mod metadata;
pub mod package;
pub mod verify;

/// Dispatch a command to its handler
pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Package(args) => package::run(ctx, args),
        Commands::Contents(args) => contents::run(ctx, args),
        Commands::Verify(args) => verify::run(ctx, args),
        Commands::Metadata(args) => metadata::run(ctx, args),
    }
}

/// Which exported template a command works on.
#[derive(Args, Debug, Clone)]
pub struct TemplateSource {
    /// Exported template XML file
    pub template: PathBuf,

    /// Kind of exported item
    #[arg(long, value_enum, default_value_t = TemplateKind::HostTemplate)]
    pub kind: TemplateKind,

    /// Item name (default: file stem)
    #[arg(long = "item-name")]
    pub item_name: Option<String>,

    /// Stable template hash (default: digest of the XML)
    #[arg(long)]
    pub hash: Option<String>,
}

impl TemplateSource {
    pub fn export(&self) -> Result<TemplateDocument> {
        FileExporter::new(".")
            .with_name(self.item_name.clone())
            .with_hash(self.hash.clone())
            .export(self.kind, &self.template.to_string_lossy())
    }
}
