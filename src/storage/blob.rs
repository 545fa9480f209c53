//! Settings-blob metadata backend.
//!
//! Records live in a flat JSON settings file under `package_export_<hash>`
//! keys; each value is the metadata serialized as a JSON string.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::{MetadataStore, PackageMetadata};
use crate::error::{PkgError, Result};

const KEY_PREFIX: &str = "package_export_";

#[derive(Debug, Clone)]
pub struct BlobStore {
    path: PathBuf,
}

impl BlobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn key(hash: &str) -> String {
        format!("{KEY_PREFIX}{hash}")
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    /// Drop the record for `hash`. Returns whether one was present.
    pub fn remove(&self, hash: &str) -> Result<bool> {
        let mut settings = self.load()?;
        if settings.remove(&Self::key(hash)).is_none() {
            return Ok(false);
        }
        self.save(&settings)?;
        Ok(true)
    }

    fn save(&self, settings: &BTreeMap<String, String>) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let mut file = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut file, settings)?;
        file.write_all(b"\n")?;
        file.persist(&self.path)
            .map_err(|err| PkgError::Io(err.error))?;
        Ok(())
    }
}

impl MetadataStore for BlobStore {
    fn backend(&self) -> &'static str {
        "blob"
    }

    fn get(&self, hash: &str) -> Result<Option<PackageMetadata>> {
        let settings = self.load()?;
        let Some(value) = settings.get(&Self::key(hash)) else {
            return Ok(None);
        };
        let mut metadata: PackageMetadata = serde_json::from_str(value)?;
        metadata.hash = hash.to_string();
        Ok(Some(metadata))
    }

    fn put(&self, hash: &str, metadata: &PackageMetadata) -> Result<()> {
        let mut settings = self.load()?;
        settings.insert(Self::key(hash), serde_json::to_string(metadata)?);
        self.save(&settings)
    }
}
