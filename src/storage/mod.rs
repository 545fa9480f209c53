//! Packaging metadata persistence
//!
//! SQLite is the primary backend; a JSON settings blob takes over when the
//! database cannot be opened or written.

pub mod blob;
pub mod migrations;
pub mod sqlite;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use blob::BlobStore;
pub use sqlite::SqliteStore;

use crate::config::{Config, StoreBackend};
use crate::error::{PkgError, Result};

/// Metadata remembered per template so repackaging starts from the last
/// values used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageMetadata {
    pub hash: String,
    pub name: String,
    pub author: String,
    pub homepage: String,
    pub email: String,
    pub description: String,
    pub class: String,
    pub tags: String,
    pub installation: String,
    pub version: String,
    pub copyright: String,
}

/// A place metadata records can be kept, keyed by template hash.
pub trait MetadataStore {
    /// Short backend name for logs and reports.
    fn backend(&self) -> &'static str;
    fn get(&self, hash: &str) -> Result<Option<PackageMetadata>>;
    /// Upsert: a second put for the same hash replaces the first.
    fn put(&self, hash: &str, metadata: &PackageMetadata) -> Result<()>;
}

/// Primary SQLite store with the settings blob behind it.
#[derive(Debug)]
pub struct MetadataRepository {
    primary: Option<SqliteStore>,
    fallback: BlobStore,
}

impl MetadataRepository {
    #[must_use]
    pub const fn new(primary: Option<SqliteStore>, fallback: BlobStore) -> Self {
        Self { primary, fallback }
    }

    /// Open the backend the configuration asks for. `auto` probes SQLite and
    /// settles on the blob when the database cannot be opened.
    pub fn open(config: &Config) -> Result<Self> {
        let fallback = BlobStore::new(config.settings_path());
        let primary = match config.store.backend {
            StoreBackend::Blob => None,
            StoreBackend::Sqlite => Some(SqliteStore::open(config.database_path())?),
            StoreBackend::Auto => match SqliteStore::open(config.database_path()) {
                Ok(store) => Some(store),
                Err(err) => {
                    warn!(
                        error = %err,
                        database = %config.database_path().display(),
                        "SQLite unavailable, using settings blob"
                    );
                    None
                }
            },
        };
        Ok(Self::new(primary, fallback))
    }

    #[must_use]
    pub const fn fallback(&self) -> &BlobStore {
        &self.fallback
    }
}

impl MetadataStore for MetadataRepository {
    fn backend(&self) -> &'static str {
        self.primary
            .as_ref()
            .map_or_else(|| self.fallback.backend(), MetadataStore::backend)
    }

    /// The blob only holds records newer than SQLite's copy, so it is read
    /// first.
    fn get(&self, hash: &str) -> Result<Option<PackageMetadata>> {
        let Some(primary) = &self.primary else {
            return self.fallback.get(hash);
        };
        match self.fallback.get(hash) {
            Ok(Some(record)) => return Ok(Some(record)),
            Ok(None) => {}
            Err(err) => warn!(hash, error = %err, "Settings blob unreadable, using SQLite"),
        }
        debug!(hash, "No settings blob record, reading SQLite");
        primary.get(hash)
    }

    fn put(&self, hash: &str, metadata: &PackageMetadata) -> Result<()> {
        let Some(primary) = &self.primary else {
            return self.fallback.put(hash, metadata).map_err(save_failed);
        };

        match primary.put(hash, metadata) {
            Ok(()) => {
                // An older fallback copy would shadow the new row.
                self.fallback.remove(hash).map_err(save_failed)?;
                Ok(())
            }
            Err(err) => {
                warn!(hash, error = %err, "SQLite write failed, using settings blob");
                self.fallback.put(hash, metadata).map_err(save_failed)?;
                if let Err(err) = primary.delete(hash) {
                    debug!(hash, error = %err, "Stale SQLite row left behind");
                }
                Ok(())
            }
        }
    }
}

fn save_failed(err: PkgError) -> PkgError {
    PkgError::Storage(format!("unable to save package metadata: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn meta(description: &str) -> PackageMetadata {
        PackageMetadata {
            name: "Host".into(),
            description: description.into(),
            ..Default::default()
        }
    }

    fn config_in(dir: &std::path::Path, backend: StoreBackend) -> Config {
        let mut config = Config::default();
        config.paths.base_path = Some(dir.to_path_buf());
        config.store.backend = backend;
        config
    }

    #[test]
    fn auto_prefers_sqlite() {
        let temp = TempDir::new().unwrap();
        let repo = MetadataRepository::open(&config_in(temp.path(), StoreBackend::Auto)).unwrap();
        assert_eq!(repo.backend(), "sqlite");

        repo.put("h", &meta("one")).unwrap();
        repo.put("h", &meta("two")).unwrap();
        assert_eq!(repo.get("h").unwrap().unwrap().description, "two");
        assert!(!repo.fallback().path().exists());
    }

    #[test]
    fn auto_falls_back_when_database_cannot_open() {
        let temp = TempDir::new().unwrap();
        let mut config = config_in(temp.path(), StoreBackend::Auto);
        // A directory where the database file should be.
        let blocked = temp.path().join("blocked.db");
        std::fs::create_dir_all(&blocked).unwrap();
        config.store.database = Some(blocked);

        let repo = MetadataRepository::open(&config).unwrap();
        assert_eq!(repo.backend(), "blob");
        repo.put("h", &meta("stored")).unwrap();
        assert_eq!(repo.get("h").unwrap().unwrap().description, "stored");
    }

    #[test]
    fn explicit_sqlite_surfaces_open_errors() {
        let temp = TempDir::new().unwrap();
        let mut config = config_in(temp.path(), StoreBackend::Sqlite);
        let blocked = temp.path().join("blocked.db");
        std::fs::create_dir_all(&blocked).unwrap();
        config.store.database = Some(blocked);

        assert!(MetadataRepository::open(&config).is_err());
    }

    #[test]
    fn legacy_blob_record_is_read_through_sqlite() {
        let temp = TempDir::new().unwrap();
        let config = config_in(temp.path(), StoreBackend::Auto);
        BlobStore::new(config.settings_path())
            .put("legacy", &meta("from blob"))
            .unwrap();

        let repo = MetadataRepository::open(&config).unwrap();
        assert_eq!(repo.get("legacy").unwrap().unwrap().description, "from blob");
    }

    #[test]
    fn fallback_write_is_what_get_returns() {
        let temp = TempDir::new().unwrap();
        let repo = MetadataRepository::open(&config_in(temp.path(), StoreBackend::Auto)).unwrap();
        repo.put("h", &meta("one")).unwrap();

        repo.primary.as_ref().unwrap().set_read_only().unwrap();
        repo.put("h", &meta("two")).unwrap();
        assert!(repo.fallback().path().exists());
        assert_eq!(repo.get("h").unwrap().unwrap().description, "two");
    }

    #[test]
    fn sqlite_write_clears_older_fallback_copy() {
        let temp = TempDir::new().unwrap();
        let config = config_in(temp.path(), StoreBackend::Auto);
        BlobStore::new(config.settings_path())
            .put("h", &meta("old"))
            .unwrap();

        let repo = MetadataRepository::open(&config).unwrap();
        repo.put("h", &meta("new")).unwrap();
        assert!(repo.fallback().get("h").unwrap().is_none());
        assert_eq!(repo.get("h").unwrap().unwrap().description, "new");
    }

    #[test]
    fn fallback_failure_is_a_storage_error() {
        let temp = TempDir::new().unwrap();
        // Settings path under a regular file cannot be created.
        let file = temp.path().join("file");
        std::fs::write(&file, "x").unwrap();
        let repo = MetadataRepository::new(None, BlobStore::new(file.join("settings.json")));

        assert!(matches!(repo.put("h", &meta("x")), Err(PkgError::Storage(_))));
    }
}
