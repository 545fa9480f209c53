use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;

use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::Serialize;
use tracing::{debug, warn};

use super::{decode_entities, DependentFile, PathResolver, Resolution};
use crate::template::TemplateDocument;

/// Exported input strings are not always padded.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Every file a template depends on.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Collection {
    /// Found files, deduplicated by resolved path, in discovery order.
    pub files: Vec<DependentFile>,
    /// Referenced files that do not exist.
    pub missing: Vec<DependentFile>,
    /// User-facing messages raised while collecting.
    pub warnings: Vec<String>,
}

/// Walks a template and the XML files it references.
#[derive(Debug, Clone)]
pub struct DependencyCollector {
    resolver: PathResolver,
}

impl DependencyCollector {
    #[must_use]
    pub const fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// Collect the dependent files of `document`.
    ///
    /// Each found `.xml` file is scanned once; the visited set stops self
    /// and chained references. With `report_missing`, every missing path
    /// produces a warning.
    pub fn collect(&self, document: &TemplateDocument, report_missing: bool) -> Collection {
        let mut collection = Collection::default();
        let mut seen_files: HashSet<PathBuf> = HashSet::new();
        let mut seen_missing: HashSet<PathBuf> = HashSet::new();
        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut worklist: VecDeque<(String, String)> = VecDeque::new();

        worklist.push_back((document.name.clone(), document.xml.clone()));

        while let Some((source, text)) = worklist.pop_front() {
            let resolution = self.scan(&text);

            for file in resolution.found {
                if !seen_files.insert(file.resolved_path.clone()) {
                    continue;
                }

                if file.is_xml() && visited.insert(file.resolved_path.clone()) {
                    match std::fs::read_to_string(&file.resolved_path) {
                        Ok(nested) => {
                            debug!(file = %file.resolved_path.display(), "Scanning nested XML");
                            worklist.push_back((file.resolved_path.display().to_string(), nested));
                        }
                        Err(err) => {
                            warn!(
                                file = %file.resolved_path.display(),
                                error = %err,
                                "Unable to read nested XML"
                            );
                        }
                    }
                }

                collection.files.push(file);
            }

            for file in resolution.missing {
                if !seen_missing.insert(file.resolved_path.clone()) {
                    continue;
                }

                if report_missing {
                    let message = format!(
                        "A critical template file '{}' is missing. Please locate this file before packaging",
                        file.resolved_path.display()
                    );
                    warn!(file = %file.resolved_path.display(), source = %source, "Missing dependent file");
                    collection.warnings.push(message);
                } else {
                    debug!(file = %file.resolved_path.display(), "Missing dependent file");
                }

                collection.missing.push(file);
            }
        }

        collection
    }

    /// Resolve the path markers of one document, line by line.
    fn scan(&self, text: &str) -> Resolution {
        let mut resolution = Resolution::default();

        for line in text.lines() {
            let Some(fragment) = extract_marker(line) else {
                continue;
            };
            let found = self.resolver.resolve(fragment.trim());
            resolution.found.extend(found.found);
            resolution.missing.extend(found.missing);
        }

        resolution
    }
}

/// Pull the path-bearing text out of a marker line.
fn extract_marker(line: &str) -> Option<String> {
    if line.contains("<xml_path>") {
        return Some(strip_tags(line, "xml_path"));
    }
    if line.contains("<script_path>") {
        return Some(strip_tags(line, "script_path"));
    }
    if line.contains("<input_string>") {
        let encoded = strip_tags(line, "input_string");
        return decode_input_string(encoded.trim());
    }
    None
}

fn strip_tags(line: &str, tag: &str) -> String {
    line.replace(&format!("<{tag}>"), "")
        .replace(&format!("</{tag}>"), "")
}

/// Base64 then entity decode a data input command line, spacing out
/// adjacent tags and empty quotes so tokens split cleanly.
fn decode_input_string(encoded: &str) -> Option<String> {
    let bytes = match LENIENT_BASE64.decode(encoded) {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(error = %err, "Skipping undecodable input string");
            return None;
        }
    };

    let decoded = decode_entities(&String::from_utf8_lossy(&bytes));
    Some(
        decoded
            .replace("><", "> <")
            .replace(">\"\"<", ">\" \"<")
            .replace(">''<", ">' '<"),
    )
}
