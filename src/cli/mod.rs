//! CLI module - Command-line interface definitions and handlers
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub mod commands;
pub mod output;

/// Install the stderr subscriber. `RUST_LOG` overrides `default_filter`.
pub fn init_tracing(default_filter: &str, json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if json {
        // JSON logging for robot mode
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init();
    }
}

/// tplpack - Build, inspect and verify signed template packages
#[derive(Parser, Debug)]
#[command(name = "tplpack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable JSON output for machine consumption
    #[arg(long, global = true)]
    pub robot: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress logs and human-readable results; errors and --robot JSON still print
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: ~/.config/tplpack/config.toml, then ./tplpack.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Save metadata for a template and build its signed package
    Package(commands::package::PackageArgs),

    /// List the files a template depends on
    Contents(commands::contents::ContentsArgs),

    /// Verify the signatures of a built package
    Verify(commands::verify::VerifyArgs),

    /// Show the stored packaging metadata for a template hash
    Metadata(commands::metadata::MetadataArgs),
}
