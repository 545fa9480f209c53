//! The save and contents actions.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use tracing::{debug, info};

use super::builder::PackageBuilder;
use crate::app::AppContext;
use crate::error::{PkgError, Result};
use crate::keys::AuthorInfo;
use crate::resolve::{DependentFile, FileKind};
use crate::storage::{MetadataStore, PackageMetadata};
use crate::template::TemplateDocument;

/// Starting metadata for a template: the stored record when there is one,
/// else defaults derived from the item. Author fields left blank are taken
/// from `package.info`.
pub fn prefill_metadata(
    store: &dyn MetadataStore,
    author: &AuthorInfo,
    template: &TemplateDocument,
) -> Result<PackageMetadata> {
    let mut metadata = match store.get(&template.hash)? {
        Some(stored) => {
            debug!(hash = %template.hash, backend = store.backend(), "Prefilling from stored metadata");
            stored
        }
        None => PackageMetadata {
            name: template.name.clone(),
            description: template.kind.default_description(&template.name),
            ..Default::default()
        },
    };

    for (slot, value) in [
        (&mut metadata.author, &author.author),
        (&mut metadata.homepage, &author.homepage),
        (&mut metadata.email, &author.email),
    ] {
        if slot.is_empty() {
            slot.clone_from(value);
        }
    }
    metadata.hash.clone_from(&template.hash);
    Ok(metadata)
}

/// Field values supplied by the user on top of the prefilled metadata.
#[derive(Args, Debug, Clone, Default)]
pub struct MetadataOverrides {
    /// Package name
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub author: Option<String>,

    #[arg(long)]
    pub homepage: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Package class (e.g. linux, windows, unix)
    #[arg(long)]
    pub class: Option<String>,

    /// Comma separated tags
    #[arg(long)]
    pub tags: Option<String>,

    /// Installation instructions
    #[arg(long)]
    pub installation: Option<String>,

    #[arg(long = "package-version")]
    pub version: Option<String>,

    #[arg(long)]
    pub copyright: Option<String>,
}

impl MetadataOverrides {
    pub fn apply(&self, metadata: &mut PackageMetadata) {
        let pairs = [
            (&mut metadata.name, &self.name),
            (&mut metadata.author, &self.author),
            (&mut metadata.homepage, &self.homepage),
            (&mut metadata.email, &self.email),
            (&mut metadata.description, &self.description),
            (&mut metadata.class, &self.class),
            (&mut metadata.tags, &self.tags),
            (&mut metadata.installation, &self.installation),
            (&mut metadata.version, &self.version),
            (&mut metadata.copyright, &self.copyright),
        ];
        for (slot, value) in pairs {
            if let Some(value) = value {
                slot.clone_from(value);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PackageRequest {
    pub template: TemplateDocument,
    pub metadata: PackageMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageOutcome {
    pub path: PathBuf,
    pub name: String,
    pub hash: String,
    pub files: Vec<String>,
    pub directories: Vec<String>,
    /// Referenced files that could not be located.
    pub missing: Vec<DependentFile>,
    pub unreadable: Vec<PathBuf>,
    pub metadata_backend: &'static str,
}

/// Save metadata for the template, then build its package.
///
/// Key material is checked first; metadata is persisted before dependency
/// collection so a failed build still remembers what was entered.
pub fn save_package(ctx: &AppContext, request: &PackageRequest) -> Result<PackageOutcome> {
    let template = &request.template;
    let keys = ctx.key_store();
    let author = keys.author_info()?;

    let mut metadata = request.metadata.clone();
    if metadata.name.trim().is_empty() {
        return Err(PkgError::Validation("package name must not be empty".into()));
    }
    if metadata.author.is_empty() {
        metadata.author.clone_from(&author.author);
    }
    metadata.hash.clone_from(&template.hash);

    let signer = keys.signer(&metadata.author)?;

    let store = ctx.open_store()?;
    store.put(&template.hash, &metadata)?;
    debug!(hash = %template.hash, backend = store.backend(), "Package metadata saved");

    let collection = ctx.collector().collect(template, false);
    info!(
        template = %template.name,
        files = collection.files.len(),
        missing = collection.missing.len(),
        "Dependencies collected"
    );

    let builder = PackageBuilder::new(
        &signer,
        ctx.config.base_path(),
        ctx.config.temp_dir(),
        ctx.config.output_dir(),
    );
    let built = builder.build(template, &metadata, &collection.files)?;

    Ok(PackageOutcome {
        path: built.path,
        name: metadata.name,
        hash: template.hash.clone(),
        files: built.files,
        directories: built.directories,
        missing: collection.missing,
        unreadable: built.unreadable,
        metadata_backend: store.backend(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentsEntry {
    pub path: PathBuf,
    pub original_path: String,
    pub kind: FileKind,
    pub exists: bool,
}

/// Every file a template would carry, missing ones included.
#[derive(Debug, Clone, Serialize)]
pub struct ContentsReport {
    pub template: String,
    pub entries: Vec<ContentsEntry>,
    pub warnings: Vec<String>,
}

impl ContentsReport {
    #[must_use]
    pub fn missing_count(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.exists).count()
    }
}

pub fn package_contents(ctx: &AppContext, template: &TemplateDocument) -> ContentsReport {
    let collection = ctx.collector().collect(template, true);
    let entries = collection
        .files
        .iter()
        .chain(&collection.missing)
        .map(|file| ContentsEntry {
            path: file.resolved_path.clone(),
            original_path: file.original_path.clone(),
            kind: file.kind,
            exists: file.exists,
        })
        .collect();

    ContentsReport {
        template: template.name.clone(),
        entries,
        warnings: collection.warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::keys::{KeySource, KeyRequest};
    use crate::package::verify::verify_archive;
    use crate::storage::SqliteStore;
    use crate::template::TemplateKind;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use std::fs;
    use tempfile::TempDir;

    fn template(xml: &str) -> TemplateDocument {
        TemplateDocument {
            kind: TemplateKind::HostTemplate,
            name: "Linux Host".into(),
            hash: "0123456789abcdef0123456789abcdef".into(),
            xml: xml.into(),
        }
    }

    fn author() -> AuthorInfo {
        AuthorInfo {
            author: "Jane".into(),
            homepage: "https://example.org".into(),
            email: "jane@example.org".into(),
        }
    }

    fn context(temp: &TempDir) -> AppContext {
        let mut config = Config::default();
        config.paths.base_path = Some(temp.path().join("app"));
        config.paths.temp_dir = Some(temp.path().join("tmp"));
        config.paths.output_dir = Some(temp.path().join("out"));
        AppContext::new(config, false)
    }

    fn install_keys(ctx: &AppContext) {
        ctx.key_store()
            .install(&KeyRequest::new(author(), KeySource::Generate { bits: 1024 }))
            .unwrap();
    }

    #[test]
    fn prefill_defaults_for_new_template() {
        let store = SqliteStore::open_in_memory().unwrap();
        let meta = prefill_metadata(&store, &author(), &template("")).unwrap();

        assert_eq!(meta.name, "Linux Host");
        assert_eq!(meta.description, "Linux Host Device Package");
        assert_eq!(meta.author, "Jane");
        assert_eq!(meta.email, "jane@example.org");
        assert!(meta.tags.is_empty());
    }

    #[test]
    fn prefill_prefers_stored_record() {
        let store = SqliteStore::open_in_memory().unwrap();
        let tpl = template("");
        let stored = PackageMetadata {
            name: "Custom".into(),
            author: "Bob".into(),
            tags: "linux".into(),
            ..Default::default()
        };
        store.put(&tpl.hash, &stored).unwrap();

        let meta = prefill_metadata(&store, &author(), &tpl).unwrap();
        assert_eq!(meta.name, "Custom");
        assert_eq!(meta.author, "Bob");
        assert_eq!(meta.homepage, "https://example.org");
        assert_eq!(meta.tags, "linux");
    }

    #[test]
    fn overrides_only_touch_given_fields() {
        let mut meta = PackageMetadata {
            name: "A".into(),
            tags: "x".into(),
            ..Default::default()
        };
        MetadataOverrides {
            tags: Some("y,z".into()),
            version: Some("1.2".into()),
            ..Default::default()
        }
        .apply(&mut meta);

        assert_eq!(meta.name, "A");
        assert_eq!(meta.tags, "y,z");
        assert_eq!(meta.version, "1.2");
    }

    #[test]
    fn save_requires_keys() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        let request = PackageRequest {
            template: template("<cacti/>"),
            metadata: PackageMetadata {
                name: "Linux Host".into(),
                ..Default::default()
            },
        };
        assert!(matches!(save_package(&ctx, &request), Err(PkgError::KeyMissing(_))));
    }

    #[test]
    fn save_builds_verifiable_package_and_remembers_metadata() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        install_keys(&ctx);

        let scripts = temp.path().join("app/scripts");
        fs::create_dir_all(&scripts).unwrap();
        fs::write(scripts.join("linux_memory.pl"), "print 1;\n").unwrap();
        let command = STANDARD.encode("perl &lt;path_cacti&gt;/scripts/linux_memory.pl MemFree: /gone/x.pl");
        let tpl = template(&format!("<cacti>\n<input_string>{command}</input_string>\n</cacti>\n"));

        let mut metadata = prefill_metadata(&ctx.open_store().unwrap(), &author(), &tpl).unwrap();
        metadata.tags = "linux".into();
        let request = PackageRequest {
            template: tpl.clone(),
            metadata,
        };

        let outcome = save_package(&ctx, &request).unwrap();
        assert_eq!(outcome.path, temp.path().join("out/Linux_Host.xml.gz"));
        assert_eq!(outcome.files, vec!["scripts/linux_memory.pl", "Linux_Host.xml"]);
        assert_eq!(outcome.directories, vec!["scripts"]);
        assert_eq!(outcome.missing.len(), 1);
        assert!(verify_archive(&outcome.path).unwrap().is_valid());

        let stored = ctx.open_store().unwrap().get(&tpl.hash).unwrap().unwrap();
        assert_eq!(stored.tags, "linux");
    }

    #[test]
    fn empty_name_is_rejected() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        install_keys(&ctx);
        let request = PackageRequest {
            template: template("<cacti/>"),
            metadata: PackageMetadata::default(),
        };
        assert!(matches!(save_package(&ctx, &request), Err(PkgError::Validation(_))));
    }

    #[test]
    fn contents_lists_missing_files_with_warnings() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        let report = package_contents(
            &ctx,
            &template("<script_path>|path_cacti|/scripts/absent.php</script_path>\n"),
        );

        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.missing_count(), 1);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("absent.php"));
    }
}
