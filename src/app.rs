//! Per-invocation application context.

use crate::cli::Cli;
use crate::config::Config;
use crate::error::Result;
use crate::keys::KeyStore;
use crate::resolve::{DependencyCollector, PathResolver};
use crate::storage::MetadataRepository;

/// Everything a command needs, built once from the command line.
#[derive(Debug)]
pub struct AppContext {
    pub config: Config,
    pub robot_mode: bool,
    /// Human-readable results are suppressed; robot JSON and errors are not.
    pub quiet: bool,
}

impl AppContext {
    #[must_use]
    pub const fn new(config: Config, robot_mode: bool) -> Self {
        Self {
            config,
            robot_mode,
            quiet: false,
        }
    }

    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let root = std::env::current_dir()?;
        let config = Config::load(cli.config.as_deref(), &root)?;
        Ok(Self {
            config,
            robot_mode: cli.robot,
            quiet: cli.quiet,
        })
    }

    #[must_use]
    pub fn key_store(&self) -> KeyStore {
        KeyStore::new(self.config.key_dir())
    }

    /// Open the metadata repository. Done on demand so read-only commands
    /// never create the key directory.
    pub fn open_store(&self) -> Result<MetadataRepository> {
        MetadataRepository::open(&self.config)
    }

    #[must_use]
    pub fn collector(&self) -> DependencyCollector {
        DependencyCollector::new(PathResolver::new(
            self.config.base_path(),
            &self.config.resolver,
        ))
    }
}
