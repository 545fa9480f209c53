//! Directory manifests for published packages.
//!
//! A manifest indexes every `*.xml.gz` package in a directory along with the
//! distinct public keys that signed them.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{PkgError, Result};
use crate::package::{read_archive, PackageDocument};

pub const MANIFEST_FILE: &str = "package.manifest";

const RULE: &str = "-----------------------------------------------------------";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub kind: String,
    pub name: String,
    /// File name within the scanned directory.
    pub filename: String,
    /// Package info without the name.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyEntry {
    /// PEM text.
    pub publickey: String,
    pub publickeyname: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryManifest {
    pub manifest: Vec<ManifestEntry>,
    pub keys: Vec<PublicKeyEntry>,
}

impl DirectoryManifest {
    fn add(&mut self, filename: String, doc: PackageDocument) -> Result<()> {
        let key = public_key_entry(&doc);
        let mut metadata = match serde_json::to_value(&doc.info)? {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        metadata.remove("name");

        self.manifest.push(ManifestEntry {
            kind: "Package".into(),
            name: doc.info.name,
            filename,
            metadata,
        });

        if let Some(key) = key {
            if !self.keys.contains(&key) {
                self.keys.push(key);
            }
        }
        Ok(())
    }

    /// The `--list` rendering: manifest and keys between rules.
    pub fn listing(&self) -> Result<String> {
        let mut out = format!("{RULE}\nOutputting Directory Manifest\n{RULE}\n");
        out.push_str(&serde_json::to_string_pretty(&self.manifest)?);
        out.push_str(&format!("\n{RULE}\nOutputting Public Key Information\n{RULE}\n"));
        if self.keys.is_empty() {
            out.push_str("WARNING: Your packages contained no public keys.  Consider repackaging\n");
        } else {
            out.push_str(&serde_json::to_string_pretty(&self.keys)?);
            out.push('\n');
        }
        out.push_str(RULE);
        out.push('\n');
        Ok(out)
    }
}

fn public_key_entry(doc: &PackageDocument) -> Option<PublicKeyEntry> {
    if doc.public_key.is_empty() && doc.public_key_name.is_empty() {
        return None;
    }
    let publickey = STANDARD
        .decode(&doc.public_key)
        .map(|pem| String::from_utf8_lossy(&pem).into_owned())
        .unwrap_or_default();
    Some(PublicKeyEntry {
        publickey,
        publickeyname: doc.public_key_name.clone(),
    })
}

/// Check that `dir` can hold a manifest.
pub fn check_directory(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(PkgError::NotFound(format!(
            "The Package Directory '{}' must be exist and must contain packages",
            dir.display()
        )));
    }
    tempfile::tempfile_in(dir).map_err(|_| {
        PkgError::Validation(format!(
            "The Package Directory '{}' must be writable",
            dir.display()
        ))
    })?;
    Ok(())
}

/// Index the packages in `dir`. Unreadable or malformed packages are logged
/// and left out.
pub fn scan_directory(dir: &Path) -> Result<DirectoryManifest> {
    check_directory(dir)?;

    let pattern = format!(
        "{}/*.xml.gz",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let mut paths: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|err| PkgError::Validation(format!("bad directory pattern: {err}")))?
        .filter_map(std::result::Result::ok)
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let mut manifest = DirectoryManifest::default();
    debug!("Processing files");
    for path in paths {
        debug!(file = %path.display(), "Processing file");
        let doc = match read_archive(&path).and_then(|text| PackageDocument::parse(&text)) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(file = %path.display(), error = %err, "Skipping unreadable package");
                continue;
            }
        };
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        manifest.add(filename, doc)?;
    }
    Ok(manifest)
}

/// Write `package.manifest` into `dir`.
pub fn write_manifest(dir: &Path, manifest: &DirectoryManifest) -> Result<PathBuf> {
    let target = dir.join(MANIFEST_FILE);
    let mut file = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut file, manifest)?;
    file.write_all(b"\n")?;
    file.persist(&target).map_err(|err| PkgError::Io(err.error))?;
    Ok(target)
}

/// Read a manifest previously written by [`write_manifest`].
pub fn load_manifest(dir: &Path) -> Result<DirectoryManifest> {
    let raw = fs::read_to_string(dir.join(MANIFEST_FILE))?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::document::compress_into;
    use crate::package::{PackageFile, PackageInfo};

    fn package(dir: &Path, file: &str, name: &str, author: &str) {
        let doc = PackageDocument {
            info: PackageInfo {
                name: name.into(),
                author: author.into(),
                tags: "linux".into(),
                ..Default::default()
            },
            files: vec![PackageFile {
                name: "t.xml".into(),
                data: "PGNhY3RpLz4=".into(),
                ..Default::default()
            }],
            public_key_name: author.into(),
            public_key: STANDARD.encode(format!(
                "-----BEGIN PUBLIC KEY-----\n{author}\n-----END PUBLIC KEY-----\n"
            )),
            ..Default::default()
        };
        let out = fs::File::create(dir.join(file)).unwrap();
        compress_into(out, &doc.render()).unwrap();
    }

    #[test]
    fn indexes_packages_and_dedups_keys() {
        let temp = tempfile::TempDir::new().unwrap();
        package(temp.path(), "a.xml.gz", "Alpha", "Jane");
        package(temp.path(), "b.xml.gz", "Beta", "Jane");
        package(temp.path(), "c.xml.gz", "Gamma", "Bob");
        fs::write(temp.path().join("notes.txt"), "ignored").unwrap();

        let manifest = scan_directory(temp.path()).unwrap();
        let names: Vec<_> = manifest.manifest.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["a.xml.gz", "b.xml.gz", "c.xml.gz"]);
        assert_eq!(manifest.keys.len(), 2);

        let alpha = &manifest.manifest[0];
        assert_eq!(alpha.kind, "Package");
        assert_eq!(alpha.name, "Alpha");
        assert!(!alpha.metadata.contains_key("name"));
        assert_eq!(alpha.metadata["tags"], "linux");
        assert!(manifest.keys[0].publickey.starts_with("-----BEGIN PUBLIC KEY-----"));
    }

    #[test]
    fn directory_names_with_glob_characters() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("pkgs [v1] *");
        fs::create_dir(&dir).unwrap();
        package(&dir, "a.xml.gz", "Alpha", "Jane");

        let manifest = scan_directory(&dir).unwrap();
        assert_eq!(manifest.manifest.len(), 1);
        assert_eq!(manifest.manifest[0].filename, "a.xml.gz");
    }

    #[test]
    fn malformed_packages_are_skipped() {
        let temp = tempfile::TempDir::new().unwrap();
        package(temp.path(), "good.xml.gz", "Good", "Jane");
        fs::write(temp.path().join("bad.xml.gz"), "not gzip").unwrap();

        let manifest = scan_directory(temp.path()).unwrap();
        assert_eq!(manifest.manifest.len(), 1);
        assert_eq!(manifest.manifest[0].filename, "good.xml.gz");
    }

    #[test]
    fn missing_directory_is_not_found() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = scan_directory(&temp.path().join("nope")).unwrap_err();
        assert!(matches!(err, PkgError::NotFound(_)));
    }

    #[test]
    fn write_then_load() {
        let temp = tempfile::TempDir::new().unwrap();
        package(temp.path(), "a.xml.gz", "Alpha", "Jane");
        let manifest = scan_directory(temp.path()).unwrap();

        let path = write_manifest(temp.path(), &manifest).unwrap();
        assert_eq!(path, temp.path().join(MANIFEST_FILE));
        assert_eq!(load_manifest(temp.path()).unwrap(), manifest);
    }

    #[test]
    fn listing_warns_without_keys() {
        let listing = DirectoryManifest::default().listing().unwrap();
        assert!(listing.contains("Outputting Directory Manifest"));
        assert!(listing.contains("contained no public keys"));
    }
}
