//! Dependency discovery for exported templates.
//!
//! [`PathResolver`] classifies the path-like tokens of a text block and
//! [`DependencyCollector`] walks a template (and every XML file it pulls in)
//! to build the set of files a package must carry.

mod collector;
mod paths;

use std::path::PathBuf;

use serde::Serialize;

pub use collector::{Collection, DependencyCollector};
pub use paths::{PathResolver, Resolution};

/// How a dependent file travels inside a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// The exported template itself.
    Template,
    Script,
    Resource,
    Xml,
}

impl FileKind {
    /// Classify a resolved path that is not the template itself.
    #[must_use]
    pub fn classify(resolved: &str) -> Self {
        if resolved.contains(".xml") {
            Self::Xml
        } else if resolved.contains("/resource/") {
            Self::Resource
        } else {
            Self::Script
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Template => "template",
            Self::Script => "script",
            Self::Resource => "resource",
            Self::Xml => "xml",
        }
    }
}

/// A file referenced by a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependentFile {
    /// Token as written in the template, before placeholder substitution.
    pub original_path: String,
    pub resolved_path: PathBuf,
    pub kind: FileKind,
    pub exists: bool,
}

impl DependentFile {
    /// The exported template, written to `path` for the build.
    #[must_use]
    pub fn template(path: PathBuf) -> Self {
        Self {
            original_path: String::new(),
            resolved_path: path,
            kind: FileKind::Template,
            exists: true,
        }
    }

    #[must_use]
    pub fn is_xml(&self) -> bool {
        self.resolved_path.to_string_lossy().contains(".xml")
    }
}

/// Decode the character entities the template exporter emits.
///
/// Handles the five predefined XML entities plus decimal and hex numeric
/// references. Unknown entities are left untouched.
#[must_use]
pub fn decode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        let decoded = tail.find(';').and_then(|end| {
            let entity = &tail[1..end];
            decode_entity(entity).map(|ch| (ch, end + 1))
        });

        match decoded {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let number = entity.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}
