//! genmanifest - index directories of published packages

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser};
use tracing::warn;

use crate::error::{PkgError, Result};
use crate::manifest::{scan_directory, write_manifest};

/// Generates a Package Author's manifest from directories of packages.
#[derive(Parser, Debug)]
#[command(name = "genmanifest", version, about, long_about = None)]
#[command(disable_version_flag = true)]
pub struct GenmanifestArgs {
    /// Writable directory containing packages (repeatable)
    #[arg(long, value_name = "PATH")]
    pub directory: Vec<PathBuf>,

    /// List the manifest instead of writing it
    #[arg(long)]
    pub list: bool,

    /// Write package.manifest into each directory
    #[arg(long, conflicts_with = "list")]
    pub generate: bool,

    /// Print debug output
    #[arg(long)]
    pub debug: bool,

    /// Print version
    #[arg(short = 'v', short_alias = 'V', long, action = ArgAction::Version)]
    pub version: Option<bool>,
}

impl GenmanifestArgs {
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        !self.list && !self.generate
    }
}

/// Process every directory. Directories that cannot be used are reported
/// and skipped; only a missing `--directory` is an error.
pub fn run(args: &GenmanifestArgs) -> Result<usize> {
    if args.directory.is_empty() {
        return Err(PkgError::Validation(
            "The Package Directory is a mandatory option.".into(),
        ));
    }

    let mut processed = 0;
    for dir in &args.directory {
        match process_directory(dir, args.list) {
            Ok(()) => processed += 1,
            Err(err) => {
                warn!(directory = %dir.display(), error = %err, "Skipping directory");
                let message = match err {
                    PkgError::NotFound(message) | PkgError::Validation(message) => message,
                    other => other.to_string(),
                };
                println!("FATAL: {message}. Skipping!");
            }
        }
    }
    Ok(processed)
}

fn process_directory(dir: &Path, list: bool) -> Result<()> {
    let manifest = scan_directory(dir)?;
    if list {
        print!("{}", manifest.listing()?);
    } else {
        let path = write_manifest(dir, &manifest)?;
        println!("Manifest package.manifest written to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        GenmanifestArgs::command().debug_assert();
    }

    #[test]
    fn repeatable_directory() {
        let args = GenmanifestArgs::try_parse_from([
            "genmanifest",
            "--list",
            "--directory=/a",
            "--directory=/b",
        ])
        .unwrap();
        assert_eq!(args.directory, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert!(!args.is_noop());
    }

    #[test]
    fn missing_directory_is_validation_error() {
        let args = GenmanifestArgs::try_parse_from(["genmanifest", "--list"]).unwrap();
        assert!(matches!(run(&args), Err(PkgError::Validation(_))));
    }

    #[test]
    fn unusable_directories_are_skipped() {
        let temp = tempfile::TempDir::new().unwrap();
        let args = GenmanifestArgs::try_parse_from([
            "genmanifest".into(),
            "--generate".into(),
            format!("--directory={}", temp.path().join("missing").display()),
            format!("--directory={}", temp.path().display()),
        ])
        .unwrap();

        assert_eq!(run(&args).unwrap(), 1);
        assert!(temp.path().join("package.manifest").exists());
    }

    #[test]
    fn write_failure_skips_only_that_directory() {
        let blocked = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(blocked.path().join(crate::manifest::MANIFEST_FILE)).unwrap();
        let good = tempfile::TempDir::new().unwrap();
        let args = GenmanifestArgs::try_parse_from([
            "genmanifest".into(),
            "--generate".into(),
            format!("--directory={}", blocked.path().display()),
            format!("--directory={}", good.path().display()),
        ])
        .unwrap();

        assert_eq!(run(&args).unwrap(), 1);
        assert!(good.path().join("package.manifest").is_file());
        assert!(blocked.path().join("package.manifest").is_dir());
    }
}
