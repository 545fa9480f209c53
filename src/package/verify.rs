//! Consumer-side verification of built packages.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::RsaPublicKey;
use serde::Serialize;
use tracing::debug;

use super::document::{blank_signature, read_archive, PackageDocument};
use crate::error::{PkgError, Result};
use crate::keys;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCheck {
    pub name: String,
    pub valid: bool,
}

/// Outcome of checking a package against its embedded public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub name: String,
    pub author: String,
    pub document_valid: bool,
    pub files: Vec<FileCheck>,
}

impl VerificationReport {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.document_valid && self.files.iter().all(|file| file.valid)
    }

    pub fn invalid_files(&self) -> impl Iterator<Item = &FileCheck> {
        self.files.iter().filter(|file| !file.valid)
    }
}

pub fn verify_archive(path: &Path) -> Result<VerificationReport> {
    debug!(package = %path.display(), "Verifying package");
    verify_document(&read_archive(path)?)
}

/// Verify the whole-document signature and every detached file signature.
///
/// Structural problems (unparseable text, undecodable key) are errors; bad
/// signatures are reported, not raised.
pub fn verify_document(text: &str) -> Result<VerificationReport> {
    let doc = PackageDocument::parse(text)?;
    let public = embedded_key(&doc)?;

    let document_valid = match STANDARD.decode(&doc.signature) {
        Ok(signature) if !signature.is_empty() => {
            keys::verify(&public, blank_signature(text)?.as_bytes(), &signature)
        }
        _ => false,
    };

    let files = doc
        .files
        .iter()
        .map(|file| {
            let valid = match (STANDARD.decode(&file.data), STANDARD.decode(&file.signature)) {
                (Ok(data), Ok(signature)) => keys::verify(&public, &data, &signature),
                _ => false,
            };
            FileCheck {
                name: file.name.clone(),
                valid,
            }
        })
        .collect();

    Ok(VerificationReport {
        name: doc.info.name,
        author: doc.public_key_name,
        document_valid,
        files,
    })
}

fn embedded_key(doc: &PackageDocument) -> Result<RsaPublicKey> {
    let pem = STANDARD
        .decode(&doc.public_key)
        .map_err(|err| PkgError::InvalidPackage(format!("public key is not base64: {err}")))?;
    let pem = String::from_utf8(pem)
        .map_err(|_| PkgError::InvalidPackage("public key is not PEM text".into()))?;
    keys::public_key_from_pem(&pem)
        .map_err(|err| PkgError::InvalidPackage(format!("embedded public key: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{test_key, PackageSigner};
    use crate::package::builder::PackageBuilder;
    use crate::storage::PackageMetadata;
    use crate::template::{TemplateDocument, TemplateKind};
    use tempfile::TempDir;

    fn built(temp: &TempDir) -> String {
        let key = test_key();
        let signer = PackageSigner::new("Jane", key.clone(), key.to_public_key()).unwrap();
        let script = temp.path().join("scripts/query.sh");
        std::fs::create_dir_all(script.parent().unwrap()).unwrap();
        std::fs::write(&script, "#!/bin/sh\necho 1\n").unwrap();

        let template = TemplateDocument {
            kind: TemplateKind::DataQuery,
            name: "Disk Query".into(),
            hash: "abc".into(),
            xml: "<cacti/>".into(),
        };
        let meta = PackageMetadata {
            name: "Disk Query".into(),
            author: "Jane".into(),
            ..Default::default()
        };
        let files = vec![crate::resolve::DependentFile {
            original_path: "<path_cacti>/scripts/query.sh".into(),
            resolved_path: script,
            kind: crate::resolve::FileKind::Script,
            exists: true,
        }];
        let builder = PackageBuilder::new(&signer, temp.path(), temp.path().join("tmp"), temp.path().join("out"));
        let package = builder.build(&template, &meta, &files).unwrap();
        read_archive(&package.path).unwrap()
    }

    #[test]
    fn built_package_verifies() {
        let temp = TempDir::new().unwrap();
        let report = verify_document(&built(&temp)).unwrap();
        assert!(report.is_valid());
        assert_eq!(report.name, "Disk Query");
        assert_eq!(report.author, "Jane");
        assert_eq!(report.files.len(), 2);
    }

    #[test]
    fn tampered_info_breaks_document_signature() {
        let temp = TempDir::new().unwrap();
        let text = built(&temp).replace("<author>Jane</author>", "<author>Mallory</author>");
        let report = verify_document(&text).unwrap();
        assert!(!report.document_valid);
        assert!(report.files.iter().all(|file| file.valid));
    }

    #[test]
    fn tampered_file_data_breaks_file_signature() {
        let temp = TempDir::new().unwrap();
        let text = built(&temp);
        let doc = PackageDocument::parse(&text).unwrap();
        let original = &doc.files[0].data;
        let forged = STANDARD.encode(b"#!/bin/sh\nrm -rf /tmp/x\n");
        let report = verify_document(&text.replacen(original.as_str(), &forged, 1)).unwrap();

        assert!(!report.is_valid());
        let bad: Vec<_> = report.invalid_files().map(|file| file.name.as_str()).collect();
        assert_eq!(bad, vec!["scripts/query.sh"]);
    }

    #[test]
    fn garbage_key_is_invalid_package() {
        let temp = TempDir::new().unwrap();
        let text = built(&temp);
        let doc = PackageDocument::parse(&text).unwrap();
        let broken = text.replace(&doc.public_key, "bm90IGEga2V5");
        assert!(matches!(verify_document(&broken), Err(PkgError::InvalidPackage(_))));
    }
}
