//! The package document: rendering, parsing and gzip framing.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::LazyLock;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{PkgError, Result};
use crate::storage::PackageMetadata;

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s.]+").expect("static regex"));
static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_]").expect("static regex"));
static REPEATED_UNDERSCORES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{2,}").expect("static regex"));

const SIGNATURE_OPEN: &str = "<signature>";
const SIGNATURE_CLOSE: &str = "</signature>";
const BLANK_TRAILER: &str = "   <signature></signature>\n</xml>";

/// Filesystem-safe form of an item name: whitespace and dots become `_`,
/// anything else outside `[A-Za-z0-9_]` is dropped.
#[must_use]
pub fn clean_up_name(name: &str) -> String {
    let spaced = SEPARATORS.replace_all(name, "_");
    let stripped = DISALLOWED.replace_all(&spaced, "");
    REPEATED_UNDERSCORES.replace_all(&stripped, "_").into_owned()
}

/// The `<info>` block. Empty fields other than `name` are not emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub homepage: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub class: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tags: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub installation: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub copyright: String,
}

impl PackageInfo {
    fn fields(&self) -> [(&'static str, &str); 9] {
        [
            ("author", self.author.as_str()),
            ("homepage", self.homepage.as_str()),
            ("email", self.email.as_str()),
            ("description", self.description.as_str()),
            ("class", self.class.as_str()),
            ("tags", self.tags.as_str()),
            ("installation", self.installation.as_str()),
            ("version", self.version.as_str()),
            ("copyright", self.copyright.as_str()),
        ]
    }

    fn field_mut(&mut self, field: &str) -> Option<&mut String> {
        Some(match field {
            "name" => &mut self.name,
            "author" => &mut self.author,
            "homepage" => &mut self.homepage,
            "email" => &mut self.email,
            "description" => &mut self.description,
            "class" => &mut self.class,
            "tags" => &mut self.tags,
            "installation" => &mut self.installation,
            "version" => &mut self.version,
            "copyright" => &mut self.copyright,
            _ => return None,
        })
    }
}

impl From<&PackageMetadata> for PackageInfo {
    fn from(meta: &PackageMetadata) -> Self {
        Self {
            name: meta.name.clone(),
            author: meta.author.clone(),
            homepage: meta.homepage.clone(),
            email: meta.email.clone(),
            description: meta.description.clone(),
            class: meta.class.clone(),
            tags: meta.tags.clone(),
            installation: meta.installation.clone(),
            version: meta.version.clone(),
            copyright: meta.copyright.clone(),
        }
    }
}

/// One `<file>` record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageFile {
    pub name: String,
    pub original_path: Option<String>,
    pub file_type: Option<String>,
    /// Base64 of the file bytes.
    pub data: String,
    /// Base64 of the detached signature over the raw bytes.
    pub signature: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageDocument {
    pub info: PackageInfo,
    pub directories: Vec<String>,
    pub files: Vec<PackageFile>,
    pub public_key_name: String,
    /// Base64 of the PEM public key.
    pub public_key: String,
    /// Base64 whole-document signature.
    pub signature: String,
}

impl PackageDocument {
    /// Everything up to and including `<publickey>`.
    #[must_use]
    pub fn render_body(&self) -> String {
        let mut xml = String::from("<xml>\n   <info>\n");
        xml.push_str(&format!("     <name>{}</name>\n", escape(self.info.name.as_str())));
        for (field, value) in self.info.fields() {
            if !value.is_empty() {
                xml.push_str(&format!("     <{field}>{}</{field}>\n", escape(value)));
            }
        }
        xml.push_str("   </info>\n   <directories>\n");
        for directory in &self.directories {
            xml.push_str(&format!(
                "       <directory>{}</directory>\n",
                escape(directory.as_str())
            ));
        }
        xml.push_str("   </directories>\n   <files>\n");
        for file in &self.files {
            xml.push_str("       <file>\n");
            xml.push_str(&format!(
                "           <name>{}</name>\n",
                escape(file.name.as_str())
            ));
            if let Some(opath) = file.original_path.as_deref().filter(|p| !p.is_empty()) {
                xml.push_str(&format!("           <opath>{}</opath>\n", escape(opath)));
            }
            if let Some(kind) = file.file_type.as_deref() {
                xml.push_str(&format!("           <type>{}</type>\n", escape(kind)));
            }
            xml.push_str(&format!("           <data>{}</data>\n", file.data));
            xml.push_str(&format!(
                "           <filesignature>{}</filesignature>\n",
                file.signature
            ));
            xml.push_str("       </file>\n");
        }
        xml.push_str("   </files>\n");
        xml.push_str(&format!(
            "   <publickeyname>{}</publickeyname>\n",
            escape(self.public_key_name.as_str())
        ));
        xml.push_str(&format!("   <publickey>{}</publickey>\n", self.public_key));
        xml
    }

    /// The exact text the document signature covers.
    #[must_use]
    pub fn signing_text(&self) -> String {
        self.render_body() + BLANK_TRAILER
    }

    /// Full document with the signature embedded.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "{}   {SIGNATURE_OPEN}{}{SIGNATURE_CLOSE}\n</xml>",
            self.render_body(),
            self.signature
        )
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut doc = Self::default();
        let mut stack: Vec<String> = Vec::new();
        let mut current: Option<PackageFile> = None;
        let mut saw_root = false;

        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Start(start) => {
                    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                    if stack.is_empty() {
                        if name != "xml" {
                            return Err(PkgError::InvalidPackage(format!(
                                "unexpected root element <{name}>"
                            )));
                        }
                        saw_root = true;
                    }
                    if name == "file" && stack.len() == 2 && stack[1] == "files" {
                        current = Some(PackageFile::default());
                    }
                    stack.push(name);
                }
                Event::End(_) => {
                    if let Some(name) = stack.pop() {
                        if name == "file" && stack.len() == 2 {
                            if let Some(file) = current.take() {
                                doc.files.push(file);
                            }
                        }
                    }
                }
                Event::Text(text) => {
                    let value = text.unescape().map_err(xml_error)?.into_owned();
                    doc.assign(&stack, current.as_mut(), value);
                }
                Event::CData(data) => {
                    let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    doc.assign(&stack, current.as_mut(), value);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !saw_root {
            return Err(PkgError::InvalidPackage("missing <xml> root element".into()));
        }
        if doc.info.name.is_empty() {
            return Err(PkgError::InvalidPackage("package has no <name>".into()));
        }
        Ok(doc)
    }

    fn assign(&mut self, stack: &[String], file: Option<&mut PackageFile>, value: String) {
        let path: Vec<&str> = stack.iter().map(String::as_str).collect();
        match path.as_slice() {
            ["xml", "info", field] => {
                if let Some(slot) = self.info.field_mut(field) {
                    *slot = value;
                }
            }
            ["xml", "directories", "directory"] => self.directories.push(value),
            ["xml", "files", "file", field] => {
                if let Some(file) = file {
                    match *field {
                        "name" => file.name = value,
                        "opath" => file.original_path = Some(value),
                        "type" => file.file_type = Some(value),
                        "data" => file.data = value,
                        "filesignature" => file.signature = value,
                        _ => {}
                    }
                }
            }
            ["xml", "publickeyname"] => self.public_key_name = value,
            ["xml", "publickey"] => self.public_key = value,
            ["xml", "signature"] => self.signature = value,
            _ => {}
        }
    }
}

fn xml_error(err: impl std::fmt::Display) -> PkgError {
    PkgError::Xml(err.to_string())
}

/// Text covered by the signature of an already rendered document: the last
/// `<signature>` element emptied.
pub fn blank_signature(text: &str) -> Result<String> {
    let open = text
        .rfind(SIGNATURE_OPEN)
        .ok_or_else(|| PkgError::InvalidPackage("document has no <signature> element".into()))?;
    let close = text[open..]
        .find(SIGNATURE_CLOSE)
        .map(|offset| open + offset)
        .ok_or_else(|| PkgError::InvalidPackage("unterminated <signature> element".into()))?;
    Ok(format!(
        "{}{}",
        &text[..open + SIGNATURE_OPEN.len()],
        &text[close..]
    ))
}

/// Gzip `text` into `writer`.
pub fn compress_into<W: Write>(writer: W, text: &str) -> Result<W> {
    let mut encoder = GzEncoder::new(writer, Compression::default());
    encoder.write_all(text.as_bytes())?;
    Ok(encoder.finish()?)
}

/// Read and decompress a `.xml.gz` package.
pub fn read_archive(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut decoder = GzDecoder::new(file);
    let mut text = String::new();
    decoder.read_to_string(&mut text).map_err(|err| {
        PkgError::InvalidPackage(format!("decompress {}: {err}", path.display()))
    })?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PackageDocument {
        PackageDocument {
            info: PackageInfo {
                name: "Cisco & Friends".into(),
                author: "Jane".into(),
                description: "Device package".into(),
                ..Default::default()
            },
            directories: vec!["scripts".into()],
            files: vec![
                PackageFile {
                    name: "scripts/ping.pl".into(),
                    original_path: Some("<path_cacti>/scripts/ping.pl".into()),
                    file_type: None,
                    data: "cGluZw==".into(),
                    signature: "c2ln".into(),
                },
                PackageFile {
                    name: "Cisco_Friends.xml".into(),
                    original_path: None,
                    file_type: Some("template".into()),
                    data: "PHhtbC8+".into(),
                    signature: "c2ln".into(),
                },
            ],
            public_key_name: "Jane".into(),
            public_key: "UEVN".into(),
            signature: "U0lH".into(),
        }
    }

    #[test]
    fn clean_up_name_matches_packaging_rules() {
        assert_eq!(clean_up_name("Cisco Router v1.2"), "Cisco_Router_v1_2");
        assert_eq!(clean_up_name("Net-SNMP  (Linux) Host"), "NetSNMP_Linux_Host");
        assert_eq!(clean_up_name("a . b"), "a_b");
        assert_eq!(clean_up_name("ünïcode"), "ncode");
    }

    #[test]
    fn render_layout() {
        let text = sample().render();
        assert!(text.starts_with("<xml>\n   <info>\n     <name>Cisco &amp; Friends</name>\n     <author>Jane</author>\n"));
        assert!(!text.contains("<homepage>"));
        assert!(text.contains("       <directory>scripts</directory>\n"));
        assert!(text.contains("           <opath>&lt;path_cacti&gt;/scripts/ping.pl</opath>\n"));
        assert!(text.contains("           <type>template</type>\n"));
        assert!(text.ends_with("   <publickey>UEVN</publickey>\n   <signature>U0lH</signature>\n</xml>"));
    }

    #[test]
    fn parse_recovers_rendered_document() {
        let doc = sample();
        assert_eq!(PackageDocument::parse(&doc.render()).unwrap(), doc);
    }

    #[test]
    fn blank_signature_matches_signing_text() {
        let doc = sample();
        assert_eq!(blank_signature(&doc.render()).unwrap(), doc.signing_text());
    }

    #[test]
    fn parse_rejects_foreign_documents() {
        assert!(PackageDocument::parse("<html><body/></html>").is_err());
        assert!(PackageDocument::parse("<xml><info></info></xml>").is_err());
        assert!(PackageDocument::parse("not xml at all").is_err());
    }

    #[test]
    fn archive_round_trip() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("p.xml.gz");
        let file = File::create(&path).unwrap();
        compress_into(file, "<xml>text</xml>").unwrap();
        assert_eq!(read_archive(&path).unwrap(), "<xml>text</xml>");
    }

    #[test]
    fn plain_file_is_not_an_archive() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("p.xml.gz");
        std::fs::write(&path, "plain").unwrap();
        assert!(matches!(read_archive(&path), Err(PkgError::InvalidPackage(_))));
    }
}
