use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::document::{clean_up_name, compress_into, PackageDocument, PackageFile, PackageInfo};
use crate::error::{PkgError, Result};
use crate::keys::{self, PackageSigner};
use crate::resolve::{DependentFile, FileKind};
use crate::storage::PackageMetadata;
use crate::template::TemplateDocument;

/// Stand-in data for a file that disappeared after resolution.
pub const NOT_FOUND_PLACEHOLDER: &[u8] = b"Not Found";

/// A package written to disk.
#[derive(Debug, Clone, Serialize)]
pub struct BuiltPackage {
    pub path: PathBuf,
    pub directories: Vec<String>,
    /// Names of the file records, template last.
    pub files: Vec<String>,
    /// Files packaged with placeholder data because they could not be read.
    pub unreadable: Vec<PathBuf>,
}

/// Assembles, signs and self-verifies package documents.
#[derive(Debug)]
pub struct PackageBuilder<'a> {
    signer: &'a PackageSigner,
    base_path: PathBuf,
    temp_dir: PathBuf,
    output_dir: PathBuf,
}

impl<'a> PackageBuilder<'a> {
    pub fn new(
        signer: &'a PackageSigner,
        base_path: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            signer,
            base_path: base_path.into(),
            temp_dir: temp_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Build `<clean item name>.xml.gz` in the output directory.
    ///
    /// Nothing is written to the output directory unless the document
    /// signature verifies against the embedded public key.
    pub fn build(
        &self,
        template: &TemplateDocument,
        metadata: &PackageMetadata,
        files: &[DependentFile],
    ) -> Result<BuiltPackage> {
        fs::create_dir_all(&self.temp_dir)?;
        let workspace = tempfile::Builder::new()
            .prefix("tplpack-")
            .tempdir_in(&self.temp_dir)?;

        let template_path = workspace
            .path()
            .join(format!("{}.xml", file_stem(&metadata.name, "template")));
        fs::write(&template_path, &template.xml)?;

        let directories = self.directories(files);
        debug!(count = directories.len(), "Directories extracted");

        let mut doc = PackageDocument {
            info: PackageInfo::from(metadata),
            directories: directories.clone(),
            files: Vec::new(),
            public_key_name: self.signer.owner().to_string(),
            public_key: STANDARD.encode(self.signer.public_pem()),
            signature: String::new(),
        };

        let mut unreadable = Vec::new();
        let mut seen = HashSet::new();
        let template_file = DependentFile::template(template_path);
        for file in files.iter().chain(std::iter::once(&template_file)) {
            if !seen.insert(file.resolved_path.clone()) {
                continue;
            }
            debug!(file = %file.resolved_path.display(), "Adding file");

            let data = match fs::read(&file.resolved_path) {
                Ok(data) => data,
                Err(err) => {
                    warn!(file = %file.resolved_path.display(), error = %err, "Dependent file unreadable, packaging placeholder");
                    unreadable.push(file.resolved_path.clone());
                    NOT_FOUND_PLACEHOLDER.to_vec()
                }
            };

            let is_template = file.kind == FileKind::Template;
            doc.files.push(PackageFile {
                name: if is_template {
                    file_name(&file.resolved_path)
                } else {
                    self.relative(&file.resolved_path)
                },
                original_path: Some(file.original_path.clone()).filter(|p| !p.is_empty()),
                file_type: is_template.then(|| FileKind::Template.as_str().to_string()),
                signature: STANDARD.encode(self.signer.sign(&data)?),
                data: STANDARD.encode(&data),
            });
        }

        let signing_text = doc.signing_text();
        let signature = self.signer.sign(signing_text.as_bytes())?;
        self.self_verify(&doc, signing_text.as_bytes(), &signature)?;
        doc.signature = STANDARD.encode(&signature);
        debug!("Document signature verified");

        let path = self.write(&doc, &template.name)?;
        info!(package = %path.display(), files = doc.files.len(), "Package created");

        Ok(BuiltPackage {
            path,
            directories,
            files: doc.files.iter().map(|file| file.name.clone()).collect(),
            unreadable,
        })
    }

    /// Check the signature against the key embedded in the document.
    fn self_verify(&self, doc: &PackageDocument, text: &[u8], signature: &[u8]) -> Result<()> {
        let pem = STANDARD
            .decode(&doc.public_key)
            .map_err(|err| PkgError::SignatureFailure(format!("embedded public key: {err}")))?;
        let public = keys::public_key_from_pem(&String::from_utf8_lossy(&pem))
            .map_err(|err| PkgError::SignatureFailure(err.to_string()))?;

        if signature.is_empty() || !keys::verify(&public, text, signature) {
            return Err(PkgError::SignatureFailure(
                "document signature does not verify against the embedded public key".into(),
            ));
        }
        Ok(())
    }

    fn write(&self, doc: &PackageDocument, item_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let target = self
            .output_dir
            .join(format!("{}.xml.gz", file_stem(item_name, "package")));

        let staging = NamedTempFile::new_in(&self.output_dir)?;
        let staging = compress_into(staging, &doc.render())?;
        staging
            .persist(&target)
            .map_err(|err| PkgError::Io(err.error))?;
        Ok(target)
    }

    /// Distinct parent directories, relative to the base path, in the order
    /// first seen.
    fn directories(&self, files: &[DependentFile]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut directories = Vec::new();
        for file in files {
            let Some(parent) = file.resolved_path.parent() else {
                continue;
            };
            let relative = self.relative(parent);
            if seen.insert(relative.clone()) {
                directories.push(relative);
            }
        }
        directories
    }

    fn relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.base_path) {
            Ok(relative) if relative.as_os_str().is_empty() => ".".to_string(),
            Ok(relative) => relative.to_string_lossy().replace('\\', "/"),
            Err(_) => path.to_string_lossy().into_owned(),
        }
    }
}

fn file_stem(name: &str, fallback: &str) -> String {
    let cleaned = clean_up_name(name);
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
