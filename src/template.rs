//! Exported template documents and the exporter seam.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{PkgError, Result};

/// The three kinds of exportable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    #[value(name = "host_template", alias = "host")]
    HostTemplate,
    #[value(name = "graph_template", alias = "graph")]
    GraphTemplate,
    #[value(name = "data_query", alias = "query")]
    DataQuery,
}

impl TemplateKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HostTemplate => "host_template",
            Self::GraphTemplate => "graph_template",
            Self::DataQuery => "data_query",
        }
    }

    /// Description used when a template is packaged for the first time.
    #[must_use]
    pub fn default_description(&self, name: &str) -> String {
        match self {
            Self::HostTemplate => format!("{name} Device Package"),
            Self::GraphTemplate => format!("{name} Graph Template Package"),
            Self::DataQuery => format!("{name} Data Query Package"),
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateKind {
    type Err = PkgError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "host_template" | "host" | "device" => Ok(Self::HostTemplate),
            "graph_template" | "graph" => Ok(Self::GraphTemplate),
            "data_query" | "query" => Ok(Self::DataQuery),
            other => Err(PkgError::Validation(format!(
                "unknown template kind {other} (expected host_template|graph_template|data_query)"
            ))),
        }
    }
}

/// An exported template: identity of the item plus its XML text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDocument {
    pub kind: TemplateKind,
    /// Display name of the exported item.
    pub name: String,
    /// Stable identifier maintained by the exporter.
    pub hash: String,
    pub xml: String,
}

/// Produces template documents. The relational schema behind a real export
/// lives outside this crate; implementors bridge to it.
pub trait TemplateExporter {
    fn export(&self, kind: TemplateKind, id: &str) -> Result<TemplateDocument>;
}

/// Exporter over XML files already written to disk.
///
/// `id` is a path relative to the root (or absolute). The item name defaults
/// to the file stem and the hash to the first 32 hex digits of the SHA-256
/// of the content, unless overridden.
#[derive(Debug, Clone)]
pub struct FileExporter {
    root: PathBuf,
    name: Option<String>,
    hash: Option<String>,
}

impl FileExporter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            name: None,
            hash: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    #[must_use]
    pub fn with_hash(mut self, hash: Option<String>) -> Self {
        self.hash = hash;
        self
    }

    fn locate(&self, id: &str) -> PathBuf {
        let path = Path::new(id);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl TemplateExporter for FileExporter {
    fn export(&self, kind: TemplateKind, id: &str) -> Result<TemplateDocument> {
        let path = self.locate(id);
        let xml = std::fs::read_to_string(&path)
            .map_err(|err| PkgError::Template(format!("read {}: {err}", path.display())))?;

        let name = match &self.name {
            Some(name) => name.clone(),
            None => path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(|stem| stem.trim_end_matches(".xml").to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
        };
        let hash = self.hash.clone().unwrap_or_else(|| content_hash(&xml));

        Ok(TemplateDocument {
            kind,
            name,
            hash,
            xml,
        })
    }
}

/// 32 hex character digest of the template text.
#[must_use]
pub fn content_hash(xml: &str) -> String {
    let digest = Sha256::digest(xml.as_bytes());
    hex::encode(digest)[..32].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn kind_parses_aliases() {
        assert_eq!("host".parse::<TemplateKind>().unwrap(), TemplateKind::HostTemplate);
        assert_eq!(
            "graph_template".parse::<TemplateKind>().unwrap(),
            TemplateKind::GraphTemplate
        );
        assert!("plugin".parse::<TemplateKind>().is_err());
    }

    #[test]
    fn default_descriptions_follow_kind() {
        assert_eq!(
            TemplateKind::HostTemplate.default_description("Cisco Router"),
            "Cisco Router Device Package"
        );
        assert_eq!(
            TemplateKind::DataQuery.default_description("Interfaces"),
            "Interfaces Data Query Package"
        );
    }

    #[test]
    fn file_exporter_derives_name_and_hash() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("Linux Host.xml"), "<xml></xml>").unwrap();

        let doc = FileExporter::new(temp.path())
            .export(TemplateKind::HostTemplate, "Linux Host.xml")
            .unwrap();
        assert_eq!(doc.name, "Linux Host");
        assert_eq!(doc.hash.len(), 32);
        assert_eq!(doc.hash, content_hash("<xml></xml>"));
    }

    #[test]
    fn file_exporter_honours_overrides() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("t.xml");
        std::fs::write(&path, "<xml/>").unwrap();

        let doc = FileExporter::new("/unused")
            .with_name(Some("Disk Usage".into()))
            .with_hash(Some("abc".into()))
            .export(TemplateKind::GraphTemplate, path.to_str().unwrap())
            .unwrap();
        assert_eq!(doc.name, "Disk Usage");
        assert_eq!(doc.hash, "abc");
    }

    #[test]
    fn file_exporter_missing_file() {
        let err = FileExporter::new("/nonexistent")
            .export(TemplateKind::DataQuery, "nope.xml")
            .unwrap_err();
        assert!(matches!(err, PkgError::Template(_)));
    }
}
