use std::path::PathBuf;

use tracing::trace;

use super::{decode_entities, DependentFile, FileKind};
use crate::config::ResolverConfig;

const BASE_PLACEHOLDERS: [&str; 2] = ["<path_cacti>", "|path_cacti|"];
const PHP_BINARY_PLACEHOLDER: &str = "|path_php_binary|";

/// Outcome of scanning one block of text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub found: Vec<DependentFile>,
    pub missing: Vec<DependentFile>,
}

/// Finds filesystem paths in free text.
#[derive(Debug, Clone)]
pub struct PathResolver {
    base_path: PathBuf,
    excluded_dirs: Vec<String>,
    excluded_names: Vec<String>,
}

impl PathResolver {
    pub fn new(base_path: impl Into<PathBuf>, config: &ResolverConfig) -> Self {
        Self {
            base_path: base_path.into(),
            excluded_dirs: config.excluded_dirs.clone(),
            excluded_names: config.excluded_names.clone(),
        }
    }

    /// Classify every whitespace separated token of `text`.
    ///
    /// Tokens matching the blocklist are dropped whether or not they exist.
    /// Existing files are found; absent tokens containing a path separator
    /// are missing; everything else is ignored.
    #[must_use]
    pub fn resolve(&self, text: &str) -> Resolution {
        let decoded = decode_entities(text);
        let base = self.base_path.to_string_lossy();
        let mut resolution = Resolution::default();

        for token in decoded.split_whitespace() {
            let mut candidate = token.to_string();
            for placeholder in BASE_PLACEHOLDERS {
                candidate = candidate.replace(placeholder, &base);
            }
            candidate = candidate.replace(PHP_BINARY_PLACEHOLDER, "");

            if candidate.trim().is_empty() {
                continue;
            }

            if self.is_excluded(&candidate) {
                trace!(token = %candidate, "Excluded system path");
                continue;
            }

            let path = PathBuf::from(&candidate);
            if path.is_file() {
                resolution.found.push(DependentFile {
                    original_path: token.to_string(),
                    kind: FileKind::classify(&candidate),
                    resolved_path: path,
                    exists: true,
                });
            } else if !path.exists() && (candidate.contains('/') || candidate.contains('\\')) {
                resolution.missing.push(DependentFile {
                    original_path: token.to_string(),
                    kind: FileKind::classify(&candidate),
                    resolved_path: path,
                    exists: false,
                });
            }
        }

        resolution
    }

    fn is_excluded(&self, candidate: &str) -> bool {
        if self
            .excluded_dirs
            .iter()
            .any(|dir| candidate.contains(dir.as_str()))
        {
            return true;
        }

        let name = candidate
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(candidate);
        self.excluded_names.iter().any(|excluded| excluded == name)
    }
}
