//! tplpack - signed template packages.
//!
//! Discovers the files an exported template depends on, bundles them into a
//! signed, compressed package and verifies packages produced that way. The
//! `genkey` and `genmanifest` tools manage author keys and directory
//! manifests over the same on-disk formats.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod keys;
pub mod manifest;
pub mod package;
pub mod resolve;
pub mod storage;
pub mod template;

pub use error::{PkgError, Result};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
